pub mod assertion;
pub mod case;
pub mod context;
pub mod error;
pub mod fixture;
pub mod parametrize;
pub mod patch;
pub mod recorder;
pub mod resolver;
