//! Core blockchain functionality
//!
//! This module contains the fundamental ledger components including
//! blocks, transactions, the Merkle commitment, proof-of-work, validation,
//! fork choice and block production.

pub mod block;
pub mod blockchain;
pub mod hashable;
pub mod merkle;
pub mod miner;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;
pub mod validation;

pub use block::Block;
pub use blockchain::{ApplyOutcome, Ledger};
pub use hashable::Hashable;
pub use merkle::{MerkleNode, MerkleProof, MerkleTree, ProofElement};
pub use miner::{Miner, DEFAULT_NONCE_BATCH};
pub use monetary::{
    ConsensusParams, DEFAULT_DIFFICULTY_BITS, INITIAL_BLOCK_REWARD, SATOSHIS_PER_COIN,
};
pub use proof_of_work::ProofOfWork;
pub use transaction::{OutPoint, TXInput, TXOutput, Transaction};
pub use validation::Validator;
