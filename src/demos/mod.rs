//! Small collaborators the bundled suites test against.

pub mod api;
pub mod arith;
pub mod database;
pub mod prime;
pub mod service;
pub mod users;
pub mod weather;
