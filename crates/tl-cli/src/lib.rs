//! Time entry CLI library.
//!
//! This crate provides the `tl` command-line interface: configuration,
//! command parsing and the command implementations.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
