//! Command-line interface
//!
//! The node takes flags only; there are no subcommands.

pub mod commands;

pub use commands::Opt;
