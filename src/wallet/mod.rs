//! Key management
//!
//! The node keeps one wallet for mining rewards and for the simulated
//! transaction generator.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::Wallet;
