use crate::app::catalog::Collected;
use crate::app::report::RunReport;
use crate::domain::case::{Failure, Outcome, Phase, TestResult};
use anyhow::{Context as _, Result};
use clap::ValueEnum;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print the run report to stdout.
pub fn display_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print_text_report(report),
    }
    Ok(())
}

/// Write the JSON report to `path`.
pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

/// Print collected test ids, one per line.
pub fn display_listing(items: &[Collected]) {
    let mut errors = 0;
    for item in items {
        match item {
            Collected::Case(case) => println!("{}", case.id()),
            Collected::Error { id, error } => {
                errors += 1;
                println!("{id} (collection error: {error})");
            }
        }
    }
    println!();
    println!("{} test(s) collected, {} error(s)", items.len() - errors, errors);
}

fn print_text_report(report: &RunReport) {
    for result in &report.results {
        println!("{} {}", result.id, status_label(result));
    }

    if report.failures().next().is_some() || !report.session_errors.is_empty() {
        println!("\n{}", "=".repeat(80));
        println!("Failures:");
        for (i, result) in report.failures().enumerate() {
            println!("{}. {}", i + 1, result.id);
            if let Some(failure) = &result.failure {
                print_failure(failure);
            }
            for failure in &result.teardown_errors {
                print_failure(failure);
            }
            println!();
        }
        for failure in &report.session_errors {
            println!("session:");
            print_failure(failure);
        }
    }

    println!("{}", "=".repeat(80));
    println!(
        "{} passed, {} failed, {} errored, {} teardown error(s) in {:.2}s",
        report.passed,
        report.failed,
        report.errored,
        report.teardown_errors,
        report.duration_ms as f64 / 1000.0
    );
    if report.total == 0 {
        println!("no tests ran: nothing matched the path and -k filter");
    }
}

fn print_failure(failure: &Failure) {
    println!("   [{}] {}: {}", phase_label(failure.phase), failure.kind, failure.message);
}

fn status_label(result: &TestResult) -> &'static str {
    match result.outcome {
        Outcome::Passed if result.teardown_errors.is_empty() => "PASSED",
        Outcome::Passed => "PASSED (teardown error)",
        Outcome::Failed => "FAILED",
        Outcome::Errored => "ERROR",
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Collect => "collect",
        Phase::Setup => "setup",
        Phase::Call => "call",
        Phase::Teardown => "teardown",
    }
}
