use crate::core::{ApplyOutcome, Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::PeerGossip;
use crate::node::{NodeStatus, SharedState};
use log::{info, warn};
use std::sync::Arc;

/// Everything the outside world may ask of a node
///
/// The HTTP server, the background loops and the tests all go through this
/// facade. Each mutating call is a single write-lock critical section; gossip
/// happens after the lock is released.
#[derive(Clone)]
pub struct NodeService {
    state: SharedState,
    gossip: Arc<PeerGossip>,
}

impl NodeService {
    pub fn new(state: SharedState, gossip: Arc<PeerGossip>) -> NodeService {
        NodeService { state, gossip }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn gossip(&self) -> &Arc<PeerGossip> {
        &self.gossip
    }

    /// Every stored block, side branches included
    pub fn list_blocks(&self) -> Result<Vec<Block>> {
        let state = self.state.read()?;
        Ok(state.ledger.blocks().into_iter().cloned().collect())
    }

    pub fn genesis_block(&self) -> Result<Block> {
        Ok(self.state.read()?.ledger.genesis()?.clone())
    }

    pub fn head_hash(&self) -> Result<String> {
        Ok(self.state.read()?.ledger.head_hash().to_string())
    }

    pub fn block(&self, hash: &str) -> Result<Option<Block>> {
        Ok(self.state.read()?.ledger.block(hash).cloned())
    }

    /// Up to `count` blocks walking back from `hash`. An unknown hash yields
    /// an empty list.
    pub fn blocks_from(&self, hash: &str, count: usize) -> Result<Vec<Block>> {
        if count == 0 {
            return Err(BlockchainError::InvalidRequest(
                "Incorrect number of blocks requested: 0".to_string(),
            ));
        }
        let state = self.state.read()?;
        Ok(state
            .ledger
            .chain_from(hash, count)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Validate and apply a block from a client or peer. Every block new to
    /// us is passed on, side branches included, so peers further away know
    /// the parent once a child overtakes the head.
    pub fn submit_block(&self, block: Block) -> Result<ApplyOutcome> {
        let hash = block.compute_hash();
        let outcome = {
            let mut state = self.state.write()?;
            state.apply_block(block.clone())
        };
        match outcome {
            Ok(outcome) => {
                if outcome.is_new() {
                    info!("Accepted block {hash}: {outcome:?}");
                    self.gossip.spawn_broadcast_block(block);
                }
                Ok(outcome)
            }
            Err(e) => {
                if e.is_rejection() {
                    warn!("Rejected block {hash}: {e}");
                }
                Err(e)
            }
        }
    }

    /// Apply a block this node mined, unless the head already reached its
    /// height while the nonce search ran. Returns None when discarded.
    pub fn publish_mined_block(&self, block: Block, parent_height: usize) -> Result<Option<ApplyOutcome>> {
        let outcome = {
            let mut state = self.state.write()?;
            let head_height = state.ledger.head_height()?;
            if head_height > parent_height {
                info!(
                    "Discarding mined block {}: head already at height {head_height}",
                    block.get_hash()
                );
                return Ok(None);
            }
            state.apply_block(block.clone())?
        };
        info!("Mined block {} at {outcome:?}", block.get_hash());
        if outcome.is_new() {
            self.gossip.spawn_broadcast_block(block);
        }
        Ok(Some(outcome))
    }

    pub fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.state.read()?.pool.transactions())
    }

    /// Validate and pool a transaction, then pass it on. Returns its hash.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<String> {
        let hash = tx.hash();
        let admitted = {
            let mut state = self.state.write()?;
            state.add_transaction(tx.clone())
        };
        match admitted {
            Ok(fee) => {
                info!("Pooled transaction {hash} paying fee {fee}");
                self.gossip.spawn_broadcast_transaction(tx);
                Ok(hash)
            }
            Err(e) => {
                if e.is_rejection() {
                    warn!("Rejected transaction {hash}: {e}");
                }
                Err(e)
            }
        }
    }

    pub fn peers(&self) -> Vec<String> {
        self.gossip.nodes().addresses()
    }

    pub fn add_peer(&self, url: &str) -> Result<bool> {
        self.gossip.add_peer(url)
    }

    pub fn status(&self) -> Result<NodeStatus> {
        self.state.read()?.status(self.gossip.peer_count())
    }

    /// Plain-text status served by `/ping`
    pub fn status_line(&self) -> Result<String> {
        Ok(format!("Current state:\n{}\n", self.status()?))
    }
}
