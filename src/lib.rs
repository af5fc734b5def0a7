//! fixture-harness library: fixture lifecycle, call-recording mocks,
//! parametrized expansion and a sequential test runner.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod demos;
pub mod domain;
pub mod suites;
