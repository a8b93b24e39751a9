//! Tooling
//!
//! Command-line front end for the client.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
