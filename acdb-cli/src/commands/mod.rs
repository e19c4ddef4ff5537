//! CLI subcommand implementations.

pub mod common;
pub mod config;
pub mod search;
pub mod sync;
pub mod tiles;
pub mod url;
