use crate::core::{ApplyOutcome, Block, ConsensusParams, Ledger, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::{TransactionPool, UTXOSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ledger, UTXO set and pool. They only ever change together.
pub struct NodeState {
    pub ledger: Ledger,
    pub utxo_set: UTXOSet,
    pub pool: TransactionPool,
}

/// What the miner needs to build a candidate, copied out under the lock
#[derive(Debug, Clone)]
pub struct MiningSnapshot {
    pub parent_hash: String,
    pub parent_height: usize,
    pub transactions: Vec<Transaction>,
    pub collected_fees: u64,
}

/// Summary reported by `/status` and the periodic status log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub num_peers: usize,
    pub block_height: usize,
    pub current_head: String,
    pub num_pending_tx: usize,
    pub num_utxo: usize,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Peers: {}, height: {}, head: {}, pending transactions: {}, unspent outputs: {}",
            self.num_peers, self.block_height, self.current_head, self.num_pending_tx, self.num_utxo
        )
    }
}

impl NodeState {
    pub fn new(params: ConsensusParams) -> NodeState {
        NodeState {
            ledger: Ledger::new(params),
            utxo_set: UTXOSet::new(),
            pool: TransactionPool::new(),
        }
    }

    pub fn apply_block(&mut self, block: Block) -> Result<ApplyOutcome> {
        self.ledger
            .apply_block(block, &mut self.utxo_set, &mut self.pool)
    }

    /// Validate against the live UTXO set and admit to the pool; returns the fee
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<u64> {
        self.pool.add(tx, &self.utxo_set)
    }

    /// The pool is revalidated whenever the head moves, so its contents are
    /// valid against the head without further checks.
    pub fn mining_snapshot(&self, max_transactions: usize) -> Result<MiningSnapshot> {
        let transactions = self.pool.select_for_block(max_transactions);
        let collected_fees = self.pool.total_fees(&transactions);
        Ok(MiningSnapshot {
            parent_hash: self.ledger.head_hash().to_string(),
            parent_height: self.ledger.head_height()?,
            transactions,
            collected_fees,
        })
    }

    pub fn status(&self, num_peers: usize) -> Result<NodeStatus> {
        Ok(NodeStatus {
            num_peers,
            block_height: self.ledger.head_height()?,
            current_head: self.ledger.head_hash().to_string(),
            num_pending_tx: self.pool.len(),
            num_utxo: self.utxo_set.len(),
        })
    }
}

/// Handle to the node state shared by the HTTP handlers and background tasks
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<RwLock<NodeState>>,
}

impl SharedState {
    pub fn new(params: ConsensusParams) -> SharedState {
        SharedState::from_state(NodeState::new(params))
    }

    pub fn from_state(state: NodeState) -> SharedState {
        SharedState {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, NodeState>> {
        self.inner
            .read()
            .map_err(|_| BlockchainError::Defect("node state lock poisoned".to_string()))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, NodeState>> {
        self.inner
            .write()
            .map_err(|_| BlockchainError::Defect("node state lock poisoned".to_string()))
    }
}
