use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use fixture_harness::app::catalog::Catalog;
use fixture_harness::app::runner::{RunConfig, Runner};
use fixture_harness::cli::{self, OutputFormat};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.execute() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("fxh error: {err:?}");
            ExitCode::from(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fxh", version, about = "Run fixture-backed test suites")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<ExitCode> {
        let catalog = Catalog::builtin();
        match self.command {
            Command::Run(args) => run_command(&catalog, args),
            Command::List(args) => {
                let runner = Runner::new(args.config());
                cli::display_listing(&runner.collect(&catalog));
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the selected tests and print a report.
    Run(RunArgs),
    /// List the selected test ids without running them.
    List(SelectArgs),
}

#[derive(Args, Debug, Clone)]
struct SelectArgs {
    /// Suite path (or directory prefix) to collect from.
    path: Option<String>,
    /// Only tests whose id contains PATTERN.
    #[arg(short = 'k', value_name = "PATTERN")]
    filter: Option<String>,
}

impl SelectArgs {
    fn config(self) -> RunConfig {
        RunConfig {
            path: self.path,
            filter: self.filter,
            ..RunConfig::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    select: SelectArgs,
    /// Stop after the first failed or errored test.
    #[arg(short = 'x', long = "exitfirst")]
    fail_fast: bool,
    /// Per-test timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,
    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Also write the JSON report to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn run_command(catalog: &Catalog, args: RunArgs) -> Result<ExitCode> {
    let config = RunConfig {
        fail_fast: args.fail_fast,
        timeout_ms: timeout_ms(args.timeout)?,
        ..args.select.config()
    };
    let report = Runner::new(config).run(catalog);

    cli::display_report(&report, args.format)?;
    if let Some(path) = &args.report {
        cli::write_report(&report, path)?;
    }
    Ok(ExitCode::from(report.exit_code()))
}

fn timeout_ms(secs: Option<f64>) -> Result<Option<u64>> {
    secs.map(|secs| {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--timeout must be a positive number of seconds, got {secs}");
        }
        Ok((secs * 1000.0).ceil() as u64)
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_rounds_up_to_whole_milliseconds() {
        assert_eq!(timeout_ms(Some(0.0004)).unwrap(), Some(1));
        assert_eq!(timeout_ms(Some(1.5)).unwrap(), Some(1500));
        assert_eq!(timeout_ms(None).unwrap(), None);
        assert!(timeout_ms(Some(0.0)).is_err());
        assert!(timeout_ms(Some(f64::NAN)).is_err());
    }
}
