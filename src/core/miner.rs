use crate::core::{Block, ConsensusParams, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::wallet::Wallet;
use log::debug;

/// Default number of nonces tried per mining attempt
pub const DEFAULT_NONCE_BATCH: u64 = 2_000;

/// Builds candidate blocks and searches for a nonce
///
/// One attempt is a bounded search of `nonce_batch` nonces from a random
/// start, so a caller can check in between attempts whether the head moved.
pub struct Miner {
    wallet: Wallet,
    params: ConsensusParams,
    nonce_batch: u64,
}

impl Miner {
    pub fn new(wallet: Wallet, params: ConsensusParams, nonce_batch: u64) -> Miner {
        Miner {
            wallet,
            params,
            nonce_batch: nonce_batch.max(1),
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Coinbase paying the block reward plus `collected_fees` to this miner
    pub fn coinbase(&self, collected_fees: u64) -> Result<Transaction> {
        let value = self
            .params
            .block_reward
            .checked_add(collected_fees)
            .ok_or_else(|| BlockchainError::InvalidBlock("coinbase value overflow".to_string()))?;
        Transaction::new_coinbase(self.wallet.get_public_key(), value)
    }

    /// Selected pool transactions followed by the coinbase
    pub fn candidate_transactions(
        &self,
        mut selected: Vec<Transaction>,
        collected_fees: u64,
    ) -> Result<Vec<Transaction>> {
        selected.push(self.coinbase(collected_fees)?);
        Ok(selected)
    }

    /// One bounded nonce search over `transactions` on top of `previous_hash`.
    /// The flag tells whether the returned block satisfies the work target.
    pub fn attempt_block(
        &self,
        transactions: &[Transaction],
        previous_hash: &str,
    ) -> Result<(Block, bool)> {
        let merkle_root = Block::calculate_merkle_root(transactions)?;
        let pow = ProofOfWork::new(self.params.difficulty_bits);
        let start_nonce = rand::random::<u64>();
        match pow.search(previous_hash, &merkle_root, start_nonce, self.nonce_batch) {
            Some((nonce, _)) => {
                let block =
                    Block::from_parts(previous_hash, &merkle_root, transactions.to_vec(), nonce);
                debug!("Found nonce {nonce} for block {}", block.get_hash());
                Ok((block, true))
            }
            None => {
                let last_tried = start_nonce.wrapping_add(self.nonce_batch - 1);
                let block =
                    Block::from_parts(previous_hash, &merkle_root, transactions.to_vec(), last_tried);
                Ok((block, false))
            }
        }
    }

    /// Repeat attempts until one succeeds or `max_attempts` run out
    pub fn mine(
        &self,
        transactions: &[Transaction],
        previous_hash: &str,
        max_attempts: usize,
    ) -> Result<Option<Block>> {
        for _ in 0..max_attempts {
            let (block, found) = self.attempt_block(transactions, previous_hash)?;
            if found {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }
}
