//! Test utilities for ledger and node testing

use crate::core::{
    Block, ConsensusParams, Ledger, Miner, OutPoint, ProofOfWork, TXOutput, Transaction,
};
use crate::error::Result;
use crate::node::NodeState;
use crate::wallet::Wallet;
use tempfile::TempDir;

/// Easy work target and a small reward so tests stay fast and readable
pub fn test_params() -> ConsensusParams {
    ConsensusParams {
        difficulty_bits: 4,
        block_reward: 50,
    }
}

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| crate::error::BlockchainError::Io(e.to_string()))
}

/// Assemble a block over `transactions` and search until it meets the target
pub fn mine_block(previous_hash: &str, transactions: Vec<Transaction>, difficulty_bits: u32) -> Block {
    let merkle_root = Block::calculate_merkle_root(&transactions).unwrap();
    let (nonce, _) = ProofOfWork::new(difficulty_bits)
        .search(previous_hash, &merkle_root, 0, u64::MAX)
        .unwrap();
    Block::from_parts(previous_hash, &merkle_root, transactions, nonce)
}

pub fn test_miner(params: ConsensusParams) -> Miner {
    Miner::new(Wallet::new().unwrap(), params, 10_000)
}

/// Mine the pool's best transactions plus a coinbase on top of the head
pub fn mine_on_head(state: &mut NodeState, miner: &Miner, max_transactions: usize) -> Block {
    let snapshot = state.mining_snapshot(max_transactions).unwrap();
    let transactions = miner
        .candidate_transactions(snapshot.transactions, snapshot.collected_fees)
        .unwrap();
    let block = miner
        .mine(&transactions, &snapshot.parent_hash, usize::MAX)
        .unwrap()
        .unwrap();
    state.apply_block(block.clone()).unwrap();
    block
}

/// Spend one output of `input_value` owned by `wallet`, paying `fee`
pub fn create_test_spend(
    wallet: &Wallet,
    outpoint: &OutPoint,
    input_value: u64,
    fee: u64,
    recipient: &[u8],
) -> Transaction {
    Transaction::new_signed(
        vec![outpoint.clone()],
        vec![TXOutput::new(recipient, input_value - fee).unwrap()],
        "test spend",
        wallet,
    )
    .unwrap()
}

/// Check linkage, work and Merkle roots along the canonical chain
pub fn validate_chain_integrity(ledger: &Ledger) -> Result<bool> {
    let pow = ProofOfWork::new(ledger.params().difficulty_bits);
    let mut previous_hash = String::new();
    for block in ledger.canonical_chain()? {
        if block.get_previous_hash() != previous_hash {
            return Ok(false);
        }
        if !block.is_genesis() {
            if !pow.validate(block) {
                return Ok(false);
            }
            block.verify_merkle_root()?;
        }
        previous_hash = block.get_hash().to_string();
    }
    Ok(true)
}

/// `length` coinbase-only blocks chained on top of `fork_base`
pub fn create_fork_scenario(
    fork_base: &str,
    length: usize,
    owner: &[u8],
    params: ConsensusParams,
) -> Result<Vec<Block>> {
    let mut blocks = Vec::with_capacity(length);
    let mut previous_hash = fork_base.to_string();
    for _ in 0..length {
        let coinbase = Transaction::new_coinbase(owner, params.block_reward)?;
        let block = mine_block(&previous_hash, vec![coinbase], params.difficulty_bits);
        previous_hash = block.get_hash().to_string();
        blocks.push(block);
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mine_block_meets_target() {
        let params = test_params();
        let coinbase = Transaction::new_coinbase(b"miner", 1).unwrap();
        let block = mine_block("parent", vec![coinbase], params.difficulty_bits);
        assert!(ProofOfWork::new(params.difficulty_bits).validate(&block));
    }

    #[test]
    fn test_mined_chain_is_intact() {
        let params = test_params();
        let mut state = NodeState::new(params);
        let miner = test_miner(params);
        mine_on_head(&mut state, &miner, 10);
        mine_on_head(&mut state, &miner, 10);
        assert_eq!(state.ledger.head_height().unwrap(), 2);
        assert!(validate_chain_integrity(&state.ledger).unwrap());
    }

    #[test]
    fn test_fork_scenario_links_up() {
        let params = test_params();
        let ledger = Ledger::new(params);
        let fork = create_fork_scenario(ledger.genesis_hash(), 3, b"miner", params).unwrap();
        assert_eq!(fork.len(), 3);
        assert_eq!(fork[0].get_previous_hash(), ledger.genesis_hash());
        assert_eq!(fork[2].get_previous_hash(), fork[1].get_hash());
    }

    #[test]
    fn test_temp_dir_exists() {
        let dir = create_temp_dir().unwrap();
        assert!(dir.path().exists());
    }
}
