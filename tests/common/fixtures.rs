//! Fixture and suite builders for integration tests.
#![allow(dead_code)]

use super::mock::EventLog;
use anyhow::anyhow;
use fixture_harness::app::catalog::{Catalog, Suite};
use fixture_harness::app::report::RunReport;
use fixture_harness::app::runner::{RunConfig, Runner};
use fixture_harness::domain::case::TestResult;
use fixture_harness::domain::fixture::FixtureProvider;

/// Fixture whose value is its own name; logs `setup:<name>` and `teardown:<name>`.
pub fn logged_fixture(name: &str, log: &EventLog) -> FixtureProvider {
    let (setup_log, teardown_log) = (log.clone(), log.clone());
    let fixture = name.to_string();
    FixtureProvider::new(name, move |_| {
        setup_log.push(format!("setup:{fixture}"));
        Ok(fixture.clone())
    })
    .with_teardown(move |value: &mut String| {
        teardown_log.push(format!("teardown:{value}"));
        Ok(())
    })
}

/// Fixture whose setup always fails.
pub fn failing_setup(name: &str, log: &EventLog) -> FixtureProvider {
    let log = log.clone();
    let fixture = name.to_string();
    FixtureProvider::new(name, move |_| -> anyhow::Result<String> {
        log.push(format!("setup:{fixture}"));
        Err(anyhow!("boom in {fixture}"))
    })
}

/// Fixture whose teardown always fails, after logging.
pub fn failing_teardown(name: &str, log: &EventLog) -> FixtureProvider {
    let log = log.clone();
    FixtureProvider::new(name, |req| Ok(req.fixture_name().to_string())).with_teardown(
        move |value: &mut String| {
            log.push(format!("teardown:{value}"));
            Err(anyhow!("could not release {value}"))
        },
    )
}

pub fn run(suite: Suite) -> RunReport {
    run_with(suite, RunConfig::default())
}

pub fn run_with(suite: Suite, config: RunConfig) -> RunReport {
    Runner::new(config).run(&Catalog::new().with_suite(suite))
}

/// Result whose id ends with `suffix`.
pub fn result<'r>(report: &'r RunReport, suffix: &str) -> &'r TestResult {
    report
        .results
        .iter()
        .find(|r| r.id.ends_with(suffix))
        .unwrap_or_else(|| panic!("no result ending with {suffix}"))
}
