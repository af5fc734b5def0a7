//! Bundled suites, one per example directory.

mod api;
mod fixtures_setup;
mod fixtures_teardown;
mod mocking;
mod parametrized;
mod simple_functions;

use crate::app::catalog::Catalog;

pub fn all() -> Catalog {
    Catalog::new()
        .with_suite(simple_functions::suite())
        .with_suite(fixtures_setup::suite())
        .with_suite(fixtures_teardown::suite())
        .with_suite(parametrized::suite())
        .with_suite(mocking::function_suite())
        .with_suite(mocking::database_suite())
        .with_suite(mocking::classes_suite())
        .with_suite(api::suite())
}
