/*!
 * mirror-speeds CLI - Command Line Interface
 */

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use mirror_speeds::{
    config::{DebugTarget, OutputMode, ReportConfig},
    error::{ErrorCategory, ReportError, Result, EXIT_SUCCESS},
    logging, OutputWriter, ReportAssembler, RunContext, RunSummary,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "mirror-speeds")]
#[command(version, about = "Report SnapMirror transfer speeds from ONTAP audit logs", long_about = None)]
struct Cli {
    /// SnapMirror audit log files
    #[arg(value_name = "LOG_FILE", required = true)]
    log_files: Vec<PathBuf>,

    /// Debug output on stderr
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Debug output on stdout
    #[arg(short = 'l', long = "logdebug")]
    logdebug: bool,

    /// Skip entries that did not succeed
    #[arg(short = 'n', long = "nofail")]
    nofail: bool,

    /// Audit-mlog file to cross-reference requests from (repeatable)
    #[arg(short = 'x', long = "audit-mlog", visible_alias = "xml", value_name = "FILE")]
    audit_mlog: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the report as JSON Lines
    #[arg(long)]
    json: bool,

    /// Append a run summary
    #[arg(long)]
    summary: bool,
}

impl Cli {
    /// Apply command line flags on top of the file configuration
    fn apply(&self, mut config: ReportConfig) -> ReportConfig {
        if self.logdebug {
            config.debug = Some(DebugTarget::Stdout);
        } else if self.debug {
            config.debug = Some(DebugTarget::Stderr);
        }
        config.skip_failures |= self.nofail;
        config.summary |= self.summary;
        if self.json {
            config.output = OutputMode::Json;
        }
        config.audit_log_paths.extend(self.audit_mlog.iter().cloned());
        config
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.category() == ErrorCategory::Configuration {
                eprintln!("{}", Cli::command().render_usage());
            }
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(e) => return Err(usage_error(&e)),
    };

    let base_config = match cli.config {
        Some(ref path) => ReportConfig::from_file(path)?,
        None => ReportConfig::default(),
    };
    let config = cli.apply(base_config);
    logging::init_logging(&config)?;
    debug!("Effective configuration: {:?}", config);

    // Every named log must exist before anything is parsed
    if let Some(missing) = cli.log_files.iter().find(|path| !path.exists()) {
        return Err(ReportError::LogFileNotFound(missing.clone()));
    }

    let mut ctx = RunContext::new(config);
    for path in ctx.config.audit_log_paths.clone() {
        ctx.load_audit_log(&path)?;
    }
    for path in &cli.log_files {
        ctx.ingest_log_file(path)?;
    }
    ctx.resolve_cross_references();

    let writer = OutputWriter::new(ctx.config.output);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writer.write_report(&ReportAssembler::from_context(&ctx), &mut out)?;
    if ctx.config.summary {
        writer.write_summary(&RunSummary::from_registry(&ctx.registry), &mut out)?;
    }
    out.flush()?;

    Ok(())
}

/// Map a clap parse failure onto the tool's error type
fn usage_error(err: &clap::Error) -> ReportError {
    if err.kind() == ErrorKind::UnknownArgument {
        if let Some(ContextValue::String(arg)) = err.get(ContextKind::InvalidArg) {
            return ReportError::UnknownOption(arg.clone());
        }
    }
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or_default();
    let detail = first_line.strip_prefix("error: ").unwrap_or(first_line);
    ReportError::Config(detail.to_string())
}
