// The block table and fork choice. Every block that ever validated is kept,
// keyed by hash; the head is the tip of the longest chain seen so far.

use crate::core::{Block, ConsensusParams, Validator};
use crate::error::{BlockchainError, Result};
use crate::storage::{TransactionPool, UTXOSet};
use log::info;
use std::collections::HashMap;

/// What happened to a block handed to [`Ledger::apply_block`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The block was stored earlier; nothing changed
    AlreadyKnown,
    /// Stored on a side branch that is not longer than the head
    StoredFork { height: usize },
    /// Extended the canonical chain by one block
    Extended { height: usize },
    /// Made a side branch canonical; the UTXO set was rebuilt
    Reorganized { height: usize },
}

impl ApplyOutcome {
    pub fn head_changed(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Extended { .. } | ApplyOutcome::Reorganized { .. }
        )
    }

    /// True if the block was not stored before this call
    pub fn is_new(&self) -> bool {
        !matches!(self, ApplyOutcome::AlreadyKnown)
    }
}

pub struct Ledger {
    blocks: HashMap<String, Block>,
    // height of every stored block, filled in on insert
    heights: HashMap<String, usize>,
    genesis_hash: String,
    head_hash: String,
    params: ConsensusParams,
}

impl Ledger {
    /// A ledger holding only the genesis block
    pub fn new(params: ConsensusParams) -> Ledger {
        let genesis = Block::genesis();
        let genesis_hash = genesis.get_hash().to_string();
        let mut blocks = HashMap::new();
        blocks.insert(genesis_hash.clone(), genesis);
        let mut heights = HashMap::new();
        heights.insert(genesis_hash.clone(), 0);
        Ledger {
            blocks,
            heights,
            head_hash: genesis_hash.clone(),
            genesis_hash,
            params,
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn genesis_hash(&self) -> &str {
        self.genesis_hash.as_str()
    }

    pub fn head_hash(&self) -> &str {
        self.head_hash.as_str()
    }

    pub fn genesis(&self) -> Result<&Block> {
        self.stored(&self.genesis_hash)
    }

    pub fn head(&self) -> Result<&Block> {
        self.stored(&self.head_hash)
    }

    fn stored(&self, hash: &str) -> Result<&Block> {
        self.blocks
            .get(hash)
            .ok_or_else(|| BlockchainError::Defect(format!("block {hash} missing from ledger")))
    }

    pub fn block(&self, hash: &str) -> Option<&Block> {
        self.blocks.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.blocks.contains_key(hash)
    }

    /// Number of stored blocks, side branches included
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every stored block, ordered by height then hash
    pub fn blocks(&self) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self.blocks.values().collect();
        let height_of = |block: &Block| {
            self.heights
                .get(block.get_hash())
                .copied()
                .unwrap_or(usize::MAX)
        };
        blocks.sort_by(|a, b| {
            height_of(a)
                .cmp(&height_of(b))
                .then_with(|| a.get_hash().cmp(b.get_hash()))
        });
        blocks
    }

    /// Distance from genesis, following parent links. `block` need not be
    /// stored yet, but its ancestry must be.
    pub fn height(&self, block: &Block) -> Result<usize> {
        if block.is_genesis() {
            return Ok(0);
        }
        let mut hops = 1;
        let mut parent_hash = block.get_previous_hash();
        loop {
            if let Some(height) = self.heights.get(parent_hash) {
                return Ok(height + hops);
            }
            let parent = self.blocks.get(parent_hash).ok_or_else(|| {
                BlockchainError::Defect(format!(
                    "ancestry of {} breaks at {parent_hash}",
                    block.get_hash()
                ))
            })?;
            if parent.is_genesis() {
                return Ok(hops);
            }
            hops += 1;
            if hops > self.blocks.len() {
                return Err(BlockchainError::Defect(format!(
                    "ancestry of {} does not reach genesis",
                    block.get_hash()
                )));
            }
            parent_hash = parent.get_previous_hash();
        }
    }

    pub fn head_height(&self) -> Result<usize> {
        self.height(self.head()?)
    }

    /// Blocks from genesis up to and including `hash`
    pub fn chain_to(&self, hash: &str) -> Result<Vec<&Block>> {
        let mut chain = vec![];
        let mut current = self.stored(hash)?;
        loop {
            chain.push(current);
            if current.is_genesis() {
                break;
            }
            if chain.len() > self.blocks.len() {
                return Err(BlockchainError::Defect(format!(
                    "ancestry of {hash} does not reach genesis"
                )));
            }
            current = self.stored(current.get_previous_hash())?;
        }
        chain.reverse();
        Ok(chain)
    }

    pub fn canonical_chain(&self) -> Result<Vec<&Block>> {
        self.chain_to(&self.head_hash)
    }

    /// Up to `count` blocks walking back from `hash`, newest first
    pub fn chain_from(&self, hash: &str, count: usize) -> Vec<&Block> {
        let mut chain = Vec::with_capacity(count.min(self.blocks.len()));
        let mut next = self.blocks.get(hash);
        while let Some(block) = next {
            if chain.len() == count {
                break;
            }
            chain.push(block);
            next = if block.is_genesis() {
                None
            } else {
                self.blocks.get(block.get_previous_hash())
            };
        }
        chain
    }

    /// UTXO set as of the stored block `hash`, rebuilt from genesis
    pub fn utxo_at(&self, hash: &str) -> Result<UTXOSet> {
        UTXOSet::rebuild(self.chain_to(hash)?)
    }

    /// Validate `block` and store it, moving the head if its chain is now
    /// strictly the longest.
    ///
    /// Rejections leave the ledger, `utxo_set` and `pool` untouched. When the
    /// head moves, the block's transactions leave the pool and the rest of
    /// the pool is revalidated.
    pub fn apply_block(
        &mut self,
        mut block: Block,
        utxo_set: &mut UTXOSet,
        pool: &mut TransactionPool,
    ) -> Result<ApplyOutcome> {
        let hash = block.refresh_hash().to_string();
        if self.blocks.contains_key(&hash) {
            return Ok(ApplyOutcome::AlreadyKnown);
        }
        if !block.is_genesis() && !self.contains(block.get_previous_hash()) {
            return Err(BlockchainError::UnknownParent(
                block.get_previous_hash().to_string(),
            ));
        }

        // the live set is the parent's set only when extending the head
        let extends_head = block.get_previous_hash() == self.head_hash;
        let snapshot = if extends_head || block.is_genesis() {
            None
        } else {
            Some(self.utxo_at(block.get_previous_hash())?)
        };
        Validator::validate_block(&block, self, snapshot.as_ref().unwrap_or(&*utxo_set))?;

        let height = self.height(&block)?;
        let head_height = self.head_height()?;
        if height <= head_height {
            info!("Stored side-branch block {hash} at height {height} (head at {head_height})");
            self.insert(hash, height, block);
            return Ok(ApplyOutcome::StoredFork { height });
        }

        let outcome = match snapshot {
            None => {
                utxo_set.apply_block(&block)?;
                ApplyOutcome::Extended { height }
            }
            Some(mut rebuilt) => {
                rebuilt.apply_block(&block)?;
                utxo_set.replace(rebuilt);
                info!("Reorganized to block {hash} at height {height}");
                ApplyOutcome::Reorganized { height }
            }
        };

        pool.remove_all(block.get_transactions());
        self.insert(hash.clone(), height, block);
        self.head_hash = hash;
        let dropped = pool.refresh(utxo_set);
        if dropped > 0 {
            info!("Dropped {dropped} pending transactions invalidated by the new head");
        }
        Ok(outcome)
    }

    fn insert(&mut self, hash: String, height: usize, block: Block) {
        self.heights.insert(hash.clone(), height);
        self.blocks.insert(hash, block);
    }
}
