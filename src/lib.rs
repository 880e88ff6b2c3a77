//! # UTXO Chain - A Small Proof-of-Work Ledger Node
//!
//! A node that keeps a UTXO ledger secured by proof of work, mines blocks on
//! top of the heaviest branch it knows, and gossips with its peers over HTTP.
//! When I come back to this code, here's what I need to remember:
//!
//! ## What It Does
//! - **Ledger**: every block ever accepted is kept; the head is the tip of the
//!   highest branch and only moves to a strictly higher block
//! - **UTXO Model**: outputs are owned by ECDSA P-256 public keys; each input
//!   signs a digest binding every outpoint, output and the message
//! - **Merkle Commitment**: each block commits to its transactions, with
//!   membership proofs for light verification
//! - **Pool**: pending transactions ordered by fee, revalidated whenever the
//!   head moves
//! - **Network**: plain HTTP + JSON, with peer discovery by exchanging lists
//!
//! ## How The Code Is Organized
//! - `core/`: transactions, blocks, Merkle trees, proof of work, validation,
//!   the ledger and the miner
//! - `storage/`: the UTXO set and the transaction pool
//! - `node/`: shared state, the request facade and the background loops
//! - `network/`: peer addresses, gossip and the HTTP server
//! - `wallet/`: key pairs and signing
//! - `config/` and `cli/`: settings and flags
//! - `utils/`: hashing, signatures and canonical encoding
//!
//! ## Where To Start Reading
//! 1. `core/blockchain.rs` for how a block is applied and the head chosen
//! 2. `core/validation.rs` for the transaction and block rules
//! 3. `node/tasks.rs` for how mining runs without holding the state lock
//! 4. `network/server.rs` for the routes

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod node;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::Opt;
pub use config::Config;
pub use crate::core::{
    ApplyOutcome, Block, ConsensusParams, Hashable, Ledger, MerkleProof, MerkleTree, Miner,
    OutPoint, ProofOfWork, TXInput, TXOutput, Transaction, Validator,
};
pub use error::{BlockchainError, ErrorClass, Result};
pub use network::{build_router, serve, Node, Nodes, PeerGossip};
pub use node::{NodeService, NodeState, NodeStatus, NodeTasks, SharedState, StopSignal};
pub use storage::{TransactionPool, UTXOSet};
pub use utils::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, new_key_pair, sha256_digest,
};
pub use wallet::Wallet;
