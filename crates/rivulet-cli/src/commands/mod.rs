//! CLI command implementations.

pub mod common;
pub mod nodes;
pub mod run;
pub mod validate;
