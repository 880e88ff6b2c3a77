//! Monetary units and the consensus parameters every node must agree on
//!
//! Values are counted in base units; one coin is 100,000,000 base units,
//! the same split Bitcoin uses for satoshis.

/// Number of base units in one coin
pub const SATOSHIS_PER_COIN: u64 = 100_000_000;

/// Block reward in base units (50 coins). There is no halving schedule.
pub const INITIAL_BLOCK_REWARD: u64 = 50 * SATOSHIS_PER_COIN;

/// Leading zero bits the block hash must carry by default
pub const DEFAULT_DIFFICULTY_BITS: u32 = 16;

/// Rules shared by the ledger, the validator and the miner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusParams {
    /// Number of leading zero bits required of a block hash
    pub difficulty_bits: u32,
    /// Value a coinbase may mint on top of the fees it collects
    pub block_reward: u64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams {
            difficulty_bits: DEFAULT_DIFFICULTY_BITS,
            block_reward: INITIAL_BLOCK_REWARD,
        }
    }
}
