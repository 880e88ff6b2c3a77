//! Fixtures for unit tests
//!
//! Low-difficulty parameters, quick mining helpers and fork builders used by
//! the `#[cfg(test)]` modules across the crate.

pub mod test_utils;

pub use test_utils::*;
