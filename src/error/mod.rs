//! Error handling for the node
//!
//! Every fallible operation in the crate returns [`Result`]. The variants are
//! grouped the way callers need to react to them: malformed input, semantic
//! rejections, internal defects and transient peer failures.

use std::fmt;

/// Result type alias for ledger and node operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// How the request boundary should surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request could not be decoded or is structurally wrong
    Malformed,
    /// The request was understood but the core refused it
    Rejected,
    /// Something that must never happen happened
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Bad encoding or missing fields
    Serialization(String),
    /// Structurally invalid request parameters
    InvalidRequest(String),
    /// Transaction failed a validation rule
    InvalidTransaction(String),
    /// A signature did not verify under the owning key
    InvalidSignature(String),
    /// An output is spent twice
    DoubleSpend(String),
    /// An input references an output that is not spendable
    UnknownOutput(String),
    /// Transaction is already pending
    DuplicateTransaction(String),
    /// Transaction is already part of the chain
    AlreadyConfirmed(String),
    /// Block failed a validation rule
    InvalidBlock(String),
    /// Block references a parent the ledger does not know
    UnknownParent(String),
    /// Block hash does not satisfy the work predicate
    InvalidProofOfWork(String),
    /// Stored Merkle root differs from the recomputed one
    MerkleRootMismatch { expected: String, actual: String },
    /// Internal impossibility (broken ancestry, poisoned lock)
    Defect(String),
    /// Peer communication errors
    Network(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

impl BlockchainError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BlockchainError::Serialization(_) | BlockchainError::InvalidRequest(_) => {
                ErrorClass::Malformed
            }
            BlockchainError::InvalidTransaction(_)
            | BlockchainError::InvalidSignature(_)
            | BlockchainError::DoubleSpend(_)
            | BlockchainError::UnknownOutput(_)
            | BlockchainError::DuplicateTransaction(_)
            | BlockchainError::AlreadyConfirmed(_)
            | BlockchainError::InvalidBlock(_)
            | BlockchainError::UnknownParent(_)
            | BlockchainError::InvalidProofOfWork(_)
            | BlockchainError::MerkleRootMismatch { .. } => ErrorClass::Rejected,
            BlockchainError::Defect(_)
            | BlockchainError::Network(_)
            | BlockchainError::Crypto(_)
            | BlockchainError::Config(_)
            | BlockchainError::Io(_) => ErrorClass::Internal,
        }
    }

    /// True when the core refused the input on semantic grounds
    pub fn is_rejection(&self) -> bool {
        self.class() == ErrorClass::Rejected
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            BlockchainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            BlockchainError::InvalidSignature(msg) => write!(f, "Invalid signature: {msg}"),
            BlockchainError::DoubleSpend(msg) => write!(f, "Double spend: {msg}"),
            BlockchainError::UnknownOutput(msg) => write!(f, "Unknown output: {msg}"),
            BlockchainError::DuplicateTransaction(hash) => {
                write!(f, "Transaction {hash} is already pending")
            }
            BlockchainError::AlreadyConfirmed(hash) => {
                write!(f, "Transaction {hash} is already confirmed")
            }
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::UnknownParent(hash) => write!(f, "Unknown parent block: {hash}"),
            BlockchainError::InvalidProofOfWork(hash) => {
                write!(f, "Block {hash} does not satisfy the proof-of-work target")
            }
            BlockchainError::MerkleRootMismatch { expected, actual } => {
                write!(f, "Merkle root mismatch: block stores {actual}, transactions give {expected}")
            }
            BlockchainError::Defect(msg) => write!(f, "Internal defect: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for BlockchainError {
    fn from(err: reqwest::Error) -> Self {
        BlockchainError::Network(err.to_string())
    }
}
