use crate::core::Block;
use crate::utils::sha256_digest;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

/// Work predicate for a fixed difficulty
///
/// A block hash read as a big-endian unsigned integer must be strictly
/// below `2^(256 - difficulty_bits)`.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    target: BigInt,
    difficulty_bits: u32,
}

impl ProofOfWork {
    pub fn new(difficulty_bits: u32) -> ProofOfWork {
        let difficulty_bits = difficulty_bits.min(255);
        let mut target = BigInt::from(1);
        target.shl_assign(256 - difficulty_bits);
        ProofOfWork {
            target,
            difficulty_bits,
        }
    }

    pub fn get_difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    /// Bytes the block hash commits to: parent hash, Merkle root, nonce
    pub fn prepare_data(previous_hash: &str, merkle_root: &str, nonce: u64) -> Vec<u8> {
        let mut data_bytes = Vec::with_capacity(previous_hash.len() + merkle_root.len() + 8);
        data_bytes.extend(previous_hash.as_bytes());
        data_bytes.extend(merkle_root.as_bytes());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    pub fn hash(previous_hash: &str, merkle_root: &str, nonce: u64) -> Vec<u8> {
        sha256_digest(&Self::prepare_data(previous_hash, merkle_root, nonce))
    }

    pub fn meets_target(&self, hash: &[u8]) -> bool {
        let hash_int = BigInt::from_bytes_be(Sign::Plus, hash);
        hash_int < self.target
    }

    /// Same predicate on a hex hash as stored in a block
    pub fn meets_target_hex(&self, hash: &str) -> bool {
        match data_encoding::HEXLOWER_PERMISSIVE.decode(hash.as_bytes()) {
            Ok(bytes) if bytes.len() == 32 => self.meets_target(&bytes),
            _ => false,
        }
    }

    /// Recompute the block hash from its fields and test it
    pub fn validate(&self, block: &Block) -> bool {
        let hash = Self::hash(
            block.get_previous_hash(),
            block.get_merkle_root(),
            block.get_nonce(),
        );
        self.meets_target(&hash)
    }

    /// Try `batch` consecutive nonces starting at `start_nonce`, wrapping at
    /// `u64::MAX`. Returns the first nonce that meets the target.
    pub fn search(
        &self,
        previous_hash: &str,
        merkle_root: &str,
        start_nonce: u64,
        batch: u64,
    ) -> Option<(u64, Vec<u8>)> {
        let mut data = Self::prepare_data(previous_hash, merkle_root, 0);
        let nonce_offset = data.len() - 8;
        for step in 0..batch {
            let nonce = start_nonce.wrapping_add(step);
            data[nonce_offset..].copy_from_slice(&nonce.to_be_bytes());
            let hash = sha256_digest(&data);
            if self.meets_target(&hash) {
                return Some((nonce, hash));
            }
        }
        None
    }
}
