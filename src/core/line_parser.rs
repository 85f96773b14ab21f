/*!
 * SnapMirror audit log line parsing
 *
 * Lines look like
 *
 * ```text
 * Wed Jul  8 18:27:44 CEST 2020 ManualUpdate[job_1]: Operation-Uuid=OP1 action=Start destination=vs1:vol1
 * ```
 *
 * The command is the token directly before the first `[`, everything ahead
 * of it is the timestamp, and the text after `]:` is a list of `key=value`
 * pairs.
 */

/// Attributes of a log line, in order of appearance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Attributes<'a> {
    /// Value for `key`; the last occurrence wins
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .rev()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// One recognized log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent<'a> {
    /// The complete raw line
    pub line: &'a str,
    pub timestamp: &'a str,
    pub command: &'a str,
    pub attributes: Attributes<'a>,
}

/// Split a raw line into timestamp, command and attributes
///
/// Returns `None` for any line that does not have the audit log shape.
pub fn parse_line(line: &str) -> Option<LogEvent<'_>> {
    let bracket = line.find('[')?;
    let command_start = line[..bracket]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(idx, c)| idx + c.len_utf8())?;
    if command_start >= bracket {
        return None;
    }
    let command = &line[command_start..bracket];
    let timestamp = line[..command_start].trim();
    if timestamp.is_empty() {
        return None;
    }

    let close = bracket + line[bracket..].find("]:")?;
    let tail_start = close + line[close..].find(char::is_whitespace)?;
    let attributes = parse_attributes(&line[tail_start..]);
    if attributes.is_empty() {
        return None;
    }

    Some(LogEvent {
        line,
        timestamp,
        command,
        attributes,
    })
}

/// Parse `key=value` pairs separated by spaces
///
/// A whitespace separated token opens a new pair when it contains `=` after
/// at least one character; the key ends at the first `=` so values may hold
/// further `=` signs. Tokens without `=` extend the current value, which
/// keeps its inner spacing. Text before the first key is dropped.
pub fn parse_attributes(text: &str) -> Attributes<'_> {
    let mut pairs = Vec::new();
    let mut current: Option<(&str, usize, usize)> = None;

    for (start, token) in tokens(text) {
        let end = start + token.len();
        match token.find('=') {
            Some(eq) if eq > 0 => {
                if let Some((key, from, to)) = current.take() {
                    pairs.push((key, &text[from..to]));
                }
                current = Some((&token[..eq], start + eq + 1, end));
            }
            _ => {
                if let Some((_, _, to)) = current.as_mut() {
                    *to = end;
                }
            }
        }
    }
    if let Some((key, from, to)) = current {
        pairs.push((key, &text[from..to]));
    }

    Attributes { pairs }
}

/// Whitespace separated tokens with their byte offsets
fn tokens(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    std::iter::from_fn(move || {
        let rest = &text[offset..];
        let skipped = rest.len() - rest.trim_start().len();
        let start = offset + skipped;
        if start >= text.len() {
            return None;
        }
        let token_len = text[start..]
            .find(char::is_whitespace)
            .unwrap_or(text.len() - start);
        offset = start + token_len;
        Some((start, &text[start..start + token_len]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_LINE: &str = "Wed Jul  8 18:27:44 CEST 2020 ManualUpdate[job_1]: Operation-Uuid=OP1 action=Start destination=vs1:vol1";

    #[test]
    fn test_parse_start_line() {
        let event = parse_line(START_LINE).unwrap();
        assert_eq!(event.timestamp, "Wed Jul  8 18:27:44 CEST 2020");
        assert_eq!(event.command, "ManualUpdate");
        assert_eq!(event.attributes.get("Operation-Uuid"), Some("OP1"));
        assert_eq!(event.attributes.get("action"), Some("Start"));
        assert_eq!(event.attributes.get("destination"), Some("vs1:vol1"));
        assert_eq!(event.attributes.len(), 3);
    }

    #[test]
    fn test_values_with_spaces_and_equals() {
        let attrs = parse_attributes(
            " status=Failure message=Transfer  aborted: reason=quota code=a=b",
        );
        assert_eq!(attrs.get("status"), Some("Failure"));
        assert_eq!(attrs.get("message"), Some("Transfer  aborted:"));
        assert_eq!(attrs.get("reason"), Some("quota"));
        assert_eq!(attrs.get("code"), Some("a=b"));
    }

    #[test]
    fn test_last_pair_runs_to_end_of_line() {
        let attrs = parse_attributes("action=Info: resync slot reserved   ");
        assert_eq!(attrs.get("action"), Some("Info: resync slot reserved"));
    }

    #[test]
    fn test_empty_value_and_leading_text() {
        let attrs = parse_attributes("noise =x message= bytes_transferred=10");
        let pairs: Vec<_> = attrs.iter().collect();
        assert_eq!(pairs, vec![("message", ""), ("bytes_transferred", "10")]);
    }

    #[test]
    fn test_repeated_key_last_wins() {
        let attrs = parse_attributes("status=Success status=Failure");
        assert_eq!(attrs.get("status"), Some("Failure"));
    }

    #[test]
    fn test_unrecognized_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("no brackets here key=value").is_none());
        // nothing ahead of the command
        assert!(parse_line("ManualUpdate[x]: action=Start").is_none());
        // no `]:` marker
        assert!(parse_line("Wed Jul 8 18:27:44 2020 ManualUpdate[x] action=Start").is_none());
        // no attributes
        assert!(parse_line("Wed Jul 8 18:27:44 2020 ManualUpdate[x]: plain text").is_none());
        assert!(parse_line("Wed Jul 8 18:27:44 2020 ManualUpdate[x]:").is_none());
        // bracket glued to the previous token with nothing in between
        assert!(parse_line("Wed Jul 8 18:27:44 2020 [x]: action=Start").is_none());
    }

    #[test]
    fn test_multibyte_whitespace_before_command() {
        let event = parse_line(
            "Wed Jul 8 18:27:44 CEST 2020\u{00a0}ManualUpdate[x]: Operation-Uuid=OP1 action=Start destination=vs1:vol1",
        )
        .unwrap();
        assert_eq!(event.command, "ManualUpdate");
        assert_eq!(event.timestamp, "Wed Jul 8 18:27:44 CEST 2020");
        assert_eq!(event.attributes.get("destination"), Some("vs1:vol1"));

        let event = parse_line("Wed Jul 8 18:27:44 2020\u{3000}ManualUpdate[x]: action=Start").unwrap();
        assert_eq!(event.command, "ManualUpdate");
    }

    #[test]
    fn test_bracket_tail_is_skipped() {
        let event =
            parse_line("Mon Nov 2 01:00:00 2020 ScheduledUpdate[sched:5min]: action=End").unwrap();
        assert_eq!(event.command, "ScheduledUpdate");
        assert_eq!(event.attributes.get("action"), Some("End"));
    }
}
