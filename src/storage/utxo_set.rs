use crate::core::{Block, OutPoint, TXOutput};
use crate::error::{BlockchainError, Result};
use std::collections::{HashMap, HashSet};

/// Unspent outputs of one chain of blocks, keyed by outpoint
///
/// Every successful mutation bumps `generation`, which lets the transaction
/// pool tell when its cached validation results have gone stale. The hashes
/// of every transaction applied so far are kept in `confirmed`, so a replayed
/// transaction can never recreate outputs that were already spent.
#[derive(Debug, Clone, Default)]
pub struct UTXOSet {
    outputs: HashMap<OutPoint, TXOutput>,
    confirmed: HashSet<String>,
    generation: u64,
}

impl UTXOSet {
    pub fn new() -> UTXOSet {
        UTXOSet::default()
    }

    /// Replay `blocks` in order, starting from an empty set
    pub fn rebuild<'a, I>(blocks: I) -> Result<UTXOSet>
    where
        I: IntoIterator<Item = &'a Block>,
    {
        let mut utxo_set = UTXOSet::new();
        for block in blocks {
            utxo_set.apply_block(block).map_err(|e| {
                BlockchainError::Defect(format!(
                    "Stored block {} does not replay: {e}",
                    block.get_hash()
                ))
            })?;
        }
        Ok(utxo_set)
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TXOutput> {
        self.outputs.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.outputs.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// True if a transaction with this hash is already on the chain
    pub fn is_confirmed(&self, tx_hash: &str) -> bool {
        self.confirmed.contains(tx_hash)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TXOutput)> {
        self.outputs.iter()
    }

    /// Outputs owned by `public_key`, ordered by outpoint
    pub fn find_owned(&self, public_key: &[u8]) -> Vec<(OutPoint, TXOutput)> {
        let mut owned: Vec<(OutPoint, TXOutput)> = self
            .outputs
            .iter()
            .filter(|(_, output)| output.is_owned_by(public_key))
            .map(|(outpoint, output)| (outpoint.clone(), output.clone()))
            .collect();
        owned.sort_by(|a, b| a.0.cmp(&b.0));
        owned
    }

    pub fn balance(&self, public_key: &[u8]) -> u64 {
        self.outputs
            .values()
            .filter(|output| output.is_owned_by(public_key))
            .fold(0u64, |total, output| total.saturating_add(output.get_value()))
    }

    /// Remove every output the block spends and add every output it creates.
    ///
    /// All spends and creations are checked against the current set before
    /// anything is touched, so a failing block leaves the set unchanged.
    pub fn apply_block(&mut self, block: &Block) -> Result<()> {
        let mut spent = HashSet::new();
        let mut hashes = HashSet::new();
        for tx in block.get_transactions() {
            let hash = tx.hash();
            if self.confirmed.contains(&hash) || !hashes.insert(hash.clone()) {
                return Err(BlockchainError::AlreadyConfirmed(hash));
            }
            for (outpoint, _) in tx.created_outpoints() {
                if self.outputs.contains_key(&outpoint) {
                    return Err(BlockchainError::AlreadyConfirmed(outpoint.to_string()));
                }
            }
            for outpoint in tx.spent_outpoints() {
                if !self.outputs.contains_key(outpoint) {
                    return Err(BlockchainError::UnknownOutput(outpoint.to_string()));
                }
                if !spent.insert(outpoint) {
                    return Err(BlockchainError::DoubleSpend(format!(
                        "{outpoint} is spent twice in block {}",
                        block.get_hash()
                    )));
                }
            }
        }

        for tx in block.get_transactions() {
            for outpoint in tx.spent_outpoints() {
                self.outputs.remove(outpoint);
            }
            for (outpoint, output) in tx.created_outpoints() {
                self.outputs.insert(outpoint, output);
            }
        }
        self.confirmed.extend(hashes);
        self.generation += 1;
        Ok(())
    }

    /// Swap in a set built elsewhere (after a reorganization)
    pub fn replace(&mut self, other: UTXOSet) {
        self.outputs = other.outputs;
        self.confirmed = other.confirmed;
        self.generation = self.generation.max(other.generation) + 1;
    }
}
