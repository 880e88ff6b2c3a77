use crate::core::{Hashable, MerkleProof, MerkleTree, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use data_encoding::HEXLOWER;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// Every node starts from this exact block: empty parent, empty root, nonce 0
static GENESIS_BLOCK: Lazy<Block> = Lazy::new(|| {
    let mut block = Block {
        previous_hash: String::new(),
        merkle_root: String::new(),
        transactions: vec![],
        nonce: 0,
        hash: String::new(),
    };
    block.refresh_hash();
    block
});

/// A block of the ledger
///
/// The hash field is a cache. It is recomputed from the parent hash, the
/// Merkle root and the nonce whenever a block enters the ledger, so a value
/// supplied by a peer is never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    previous_hash: String,
    merkle_root: String,
    transactions: Vec<Transaction>,
    nonce: u64,
    #[serde(default)]
    hash: String,
}

impl Block {
    /// Assemble a block over `transactions`, computing the Merkle root and hash
    pub fn new(previous_hash: &str, transactions: Vec<Transaction>, nonce: u64) -> Result<Block> {
        let merkle_root = Self::calculate_merkle_root(&transactions)?;
        Ok(Self::from_parts(previous_hash, &merkle_root, transactions, nonce))
    }

    /// Assemble a block from raw fields without checking them
    pub fn from_parts(
        previous_hash: &str,
        merkle_root: &str,
        transactions: Vec<Transaction>,
        nonce: u64,
    ) -> Block {
        let mut block = Block {
            previous_hash: previous_hash.to_string(),
            merkle_root: merkle_root.to_string(),
            transactions,
            nonce,
            hash: String::new(),
        };
        block.refresh_hash();
        block
    }

    pub fn genesis() -> Block {
        GENESIS_BLOCK.clone()
    }

    /// True for anything claiming to be a genesis block
    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_empty()
    }

    pub fn compute_hash(&self) -> String {
        HEXLOWER.encode(&self.content_hash())
    }

    /// Overwrite the cached hash with the recomputed one
    pub fn refresh_hash(&mut self) -> &str {
        self.hash = self.compute_hash();
        self.hash.as_str()
    }

    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<String> {
        MerkleTree::root_for(transactions)
    }

    pub fn merkle_tree(&self) -> Result<MerkleTree> {
        MerkleTree::build(&self.transactions)
    }

    /// Compare the stored root with the root of the carried transactions
    pub fn verify_merkle_root(&self) -> Result<()> {
        let expected = Self::calculate_merkle_root(&self.transactions)?;
        if expected != self.merkle_root {
            return Err(BlockchainError::MerkleRootMismatch {
                expected,
                actual: self.merkle_root.clone(),
            });
        }
        Ok(())
    }

    /// Proof that `transaction` is committed to by this block's Merkle root
    pub fn membership_proof(&self, transaction: &Transaction) -> Result<Option<MerkleProof>> {
        Ok(self.merkle_tree()?.membership_proof(transaction))
    }

    /// Check a proof against the stored root; only the header is needed
    pub fn verify_membership(&self, proof: &MerkleProof) -> bool {
        proof.verify_hex(&self.merkle_root)
    }

    /// The trailing coinbase, if the block carries one
    pub fn get_coinbase(&self) -> Option<&Transaction> {
        self.transactions.last().filter(|tx| tx.is_coinbase())
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_merkle_root(&self) -> &str {
        self.merkle_root.as_str()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }
}

impl Hashable for Block {
    fn content_hash(&self) -> Vec<u8> {
        ProofOfWork::hash(&self.previous_hash, &self.merkle_root, self.nonce)
    }
}
