//! CLI subcommand implementations.

pub mod add;
pub mod credentials;
pub mod delete;
pub mod list;
pub mod project;
pub mod stats;
pub mod update;
pub mod util;
