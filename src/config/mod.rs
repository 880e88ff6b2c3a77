//! Configuration management
//!
//! Network address, consensus parameters and the timing of the background
//! loops, layered from defaults, a TOML file, the environment and the CLI.

pub mod settings;

pub use settings::Config;
