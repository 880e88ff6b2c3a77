//! In-memory chain state
//!
//! The UTXO set derived from the canonical chain and the pool of pending
//! transactions validated against it.

pub mod memory_pool;
pub mod utxo_set;

pub use memory_pool::TransactionPool;
pub use utxo_set::UTXOSet;
