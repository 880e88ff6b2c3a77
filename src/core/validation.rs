// Consensus rules for transactions and blocks. Nothing here mutates state:
// callers validate first and apply afterwards.

use crate::core::{Block, Ledger, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::UTXOSet;
use std::collections::HashSet;

pub struct Validator;

impl Validator {
    /// Check a standalone (non-coinbase) transaction against `utxo_set`.
    /// Returns the fee it pays.
    pub fn validate_transaction(tx: &Transaction, utxo_set: &UTXOSet) -> Result<u64> {
        Self::validate_outputs(tx)?;
        if tx.get_inputs().is_empty() {
            let reason = if tx.is_coinbase() {
                "coinbase transactions are only valid as the last entry of a block"
            } else {
                "transaction has no inputs"
            };
            return Err(BlockchainError::InvalidTransaction(reason.to_string()));
        }
        let tx_hash = tx.hash();
        if utxo_set.is_confirmed(&tx_hash) {
            return Err(BlockchainError::AlreadyConfirmed(tx_hash));
        }

        let mut seen = HashSet::new();
        for outpoint in tx.spent_outpoints() {
            if !seen.insert(outpoint) {
                return Err(BlockchainError::DoubleSpend(format!(
                    "{outpoint} is referenced twice by one transaction"
                )));
            }
        }

        let digest = tx.signing_digest()?;
        let mut input_value = 0u64;
        for (index, outpoint) in tx.spent_outpoints().enumerate() {
            let output = utxo_set
                .get(outpoint)
                .ok_or_else(|| BlockchainError::UnknownOutput(outpoint.to_string()))?;
            if !tx.verify_input(index, output.get_owner(), &digest) {
                return Err(BlockchainError::InvalidSignature(format!(
                    "input {index} spending {outpoint}"
                )));
            }
            input_value = input_value.checked_add(output.get_value()).ok_or_else(|| {
                BlockchainError::InvalidTransaction("Input value overflow".to_string())
            })?;
        }

        let output_value = tx.get_output_value()?;
        input_value.checked_sub(output_value).ok_or_else(|| {
            BlockchainError::InvalidTransaction(format!(
                "outputs ({output_value}) exceed inputs ({input_value})"
            ))
        })
    }

    fn validate_outputs(tx: &Transaction) -> Result<()> {
        if tx.get_outputs().is_empty() {
            return Err(BlockchainError::InvalidTransaction(
                "transaction has no outputs".to_string(),
            ));
        }
        if tx.get_outputs().iter().any(|output| output.get_value() == 0) {
            return Err(BlockchainError::InvalidTransaction(
                "output value must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Check `block` as a child of a block the ledger already holds.
    /// `parent_utxo` is the UTXO set as of that parent. Returns total fees.
    pub fn validate_block(block: &Block, ledger: &Ledger, parent_utxo: &UTXOSet) -> Result<u64> {
        let hash = block.compute_hash();
        if block.is_genesis() {
            if hash == ledger.genesis_hash() {
                return Ok(0);
            }
            return Err(BlockchainError::InvalidBlock(
                "only the fixed genesis block may have an empty parent".to_string(),
            ));
        }

        if !ledger.contains(block.get_previous_hash()) {
            return Err(BlockchainError::UnknownParent(
                block.get_previous_hash().to_string(),
            ));
        }

        let pow = ProofOfWork::new(ledger.params().difficulty_bits);
        if !pow.meets_target_hex(&hash) {
            return Err(BlockchainError::InvalidProofOfWork(hash));
        }

        let transactions = block.get_transactions();
        let Some((last, body)) = transactions.split_last() else {
            return Err(BlockchainError::InvalidBlock(
                "block carries no transactions".to_string(),
            ));
        };
        block.verify_merkle_root()?;

        if body.iter().any(Transaction::is_coinbase) {
            return Err(BlockchainError::InvalidBlock(
                "coinbase must be the last transaction".to_string(),
            ));
        }
        // a replayed transaction would recreate outputs that may already be spent
        let mut hashes = HashSet::new();
        for tx in transactions {
            let tx_hash = tx.hash();
            if parent_utxo.is_confirmed(&tx_hash) || !hashes.insert(tx_hash.clone()) {
                return Err(BlockchainError::AlreadyConfirmed(tx_hash));
            }
        }

        let (spends, coinbase) = if last.is_coinbase() {
            (body, Some(last))
        } else {
            (transactions, None)
        };

        let mut spent = HashSet::new();
        let mut fees = 0u64;
        for tx in spends {
            for outpoint in tx.spent_outpoints() {
                if !spent.insert(outpoint) {
                    return Err(BlockchainError::DoubleSpend(format!(
                        "{outpoint} is spent twice in block {hash}"
                    )));
                }
            }
            let fee = Self::validate_transaction(tx, parent_utxo)?;
            fees = fees.checked_add(fee).ok_or_else(|| {
                BlockchainError::InvalidBlock("fee total overflow".to_string())
            })?;
        }

        if let Some(coinbase) = coinbase {
            Self::validate_outputs(coinbase)?;
            let allowed = ledger.params().block_reward.saturating_add(fees);
            let minted = coinbase.get_output_value()?;
            if minted > allowed {
                return Err(BlockchainError::InvalidBlock(format!(
                    "coinbase mints {minted}, at most {allowed} allowed"
                )));
            }
        }
        Ok(fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConsensusParams, OutPoint, TXOutput};
    use crate::testnet::{mine_block, test_params};
    use crate::wallet::Wallet;

    fn funded(wallet: &Wallet, value: u64) -> (UTXOSet, OutPoint) {
        let coinbase = Transaction::new_coinbase(wallet.get_public_key(), value).unwrap();
        let outpoint = OutPoint::new(coinbase.hash(), 0);
        let mut utxo_set = UTXOSet::new();
        utxo_set
            .apply_block(&Block::new("parent", vec![coinbase], 0).unwrap())
            .unwrap();
        (utxo_set, outpoint)
    }

    #[test]
    fn test_valid_spend_reports_fee() {
        let wallet = Wallet::new().unwrap();
        let (utxo_set, outpoint) = funded(&wallet, 100);
        let tx = Transaction::new_signed(
            vec![outpoint],
            vec![TXOutput::new(b"bob", 60).unwrap(), TXOutput::new(b"carol", 30).unwrap()],
            "",
            &wallet,
        )
        .unwrap();
        assert_eq!(Validator::validate_transaction(&tx, &utxo_set).unwrap(), 10);
    }

    #[test]
    fn test_overspend_is_rejected() {
        let wallet = Wallet::new().unwrap();
        let (utxo_set, outpoint) = funded(&wallet, 100);
        let tx = Transaction::new_signed(
            vec![outpoint],
            vec![TXOutput::new(b"bob", 101).unwrap()],
            "",
            &wallet,
        )
        .unwrap();
        assert!(matches!(
            Validator::validate_transaction(&tx, &utxo_set),
            Err(BlockchainError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_wrong_signer_is_rejected() {
        let wallet = Wallet::new().unwrap();
        let thief = Wallet::new().unwrap();
        let (utxo_set, outpoint) = funded(&wallet, 100);
        let tx = Transaction::new_signed(
            vec![outpoint],
            vec![TXOutput::new(thief.get_public_key(), 100).unwrap()],
            "",
            &thief,
        )
        .unwrap();
        assert!(matches!(
            Validator::validate_transaction(&tx, &utxo_set),
            Err(BlockchainError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_unknown_output_is_rejected() {
        let wallet = Wallet::new().unwrap();
        let tx = Transaction::new_signed(
            vec![OutPoint::new("ee".repeat(32), 0)],
            vec![TXOutput::new(b"bob", 1).unwrap()],
            "",
            &wallet,
        )
        .unwrap();
        assert!(matches!(
            Validator::validate_transaction(&tx, &UTXOSet::new()),
            Err(BlockchainError::UnknownOutput(_))
        ));
    }

    #[test]
    fn test_repeated_input_is_rejected() {
        let wallet = Wallet::new().unwrap();
        let (utxo_set, outpoint) = funded(&wallet, 100);
        let tx = Transaction::new_signed(
            vec![outpoint.clone(), outpoint],
            vec![TXOutput::new(b"bob", 150).unwrap()],
            "",
            &wallet,
        )
        .unwrap();
        assert!(matches!(
            Validator::validate_transaction(&tx, &utxo_set),
            Err(BlockchainError::DoubleSpend(_))
        ));
    }

    #[test]
    fn test_standalone_coinbase_is_rejected() {
        let coinbase = Transaction::new_coinbase(b"miner", 50).unwrap();
        assert!(matches!(
            Validator::validate_transaction(&coinbase, &UTXOSet::new()),
            Err(BlockchainError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_block_rules() {
        let params = test_params();
        let ledger = Ledger::new(params);
        let genesis = ledger.genesis_hash().to_string();
        let utxo_set = UTXOSet::new();

        // reward only
        let coinbase = Transaction::new_coinbase(b"miner", params.block_reward).unwrap();
        let block = mine_block(&genesis, vec![coinbase], params.difficulty_bits);
        assert_eq!(Validator::validate_block(&block, &ledger, &utxo_set).unwrap(), 0);

        // too generous
        let greedy = Transaction::new_coinbase(b"miner", params.block_reward + 1).unwrap();
        let block = mine_block(&genesis, vec![greedy], params.difficulty_bits);
        assert!(matches!(
            Validator::validate_block(&block, &ledger, &utxo_set),
            Err(BlockchainError::InvalidBlock(_))
        ));

        // two coinbases
        let first = Transaction::new_coinbase(b"miner", 1).unwrap();
        let second = Transaction::new_coinbase(b"miner", 1).unwrap();
        let block = mine_block(&genesis, vec![first, second], params.difficulty_bits);
        assert!(matches!(
            Validator::validate_block(&block, &ledger, &utxo_set),
            Err(BlockchainError::InvalidBlock(_))
        ));

        // unknown parent
        let coinbase = Transaction::new_coinbase(b"miner", 1).unwrap();
        let block = mine_block(&"ab".repeat(32), vec![coinbase], params.difficulty_bits);
        assert!(matches!(
            Validator::validate_block(&block, &ledger, &utxo_set),
            Err(BlockchainError::UnknownParent(_))
        ));
    }

    #[test]
    fn test_confirmed_coinbase_cannot_be_replayed() {
        let params = test_params();
        let mut ledger = Ledger::new(params);
        let mut utxo_set = UTXOSet::new();
        let mut pool = crate::storage::TransactionPool::new();
        let coinbase = Transaction::new_coinbase(b"miner", params.block_reward).unwrap();
        let first = mine_block(ledger.genesis_hash(), vec![coinbase.clone()], params.difficulty_bits);
        ledger.apply_block(first.clone(), &mut utxo_set, &mut pool).unwrap();

        let replay = mine_block(first.get_hash(), vec![coinbase], params.difficulty_bits);
        assert!(matches!(
            Validator::validate_block(&replay, &ledger, &utxo_set),
            Err(BlockchainError::AlreadyConfirmed(_))
        ));
    }

    #[test]
    fn test_fake_genesis_is_rejected() {
        let ledger = Ledger::new(test_params());
        let coinbase = Transaction::new_coinbase(b"miner", 1).unwrap();
        let fake = Block::new("", vec![coinbase], 0).unwrap();
        assert!(matches!(
            Validator::validate_block(&fake, &ledger, &UTXOSet::new()),
            Err(BlockchainError::InvalidBlock(_))
        ));
        assert!(Validator::validate_block(&Block::genesis(), &ledger, &UTXOSet::new()).is_ok());
    }

    #[test]
    fn test_insufficient_work_is_rejected() {
        let params = ConsensusParams {
            difficulty_bits: 40,
            ..test_params()
        };
        let ledger = Ledger::new(params);
        let coinbase = Transaction::new_coinbase(b"miner", 1).unwrap();
        let block = Block::new(ledger.genesis_hash(), vec![coinbase], 0).unwrap();
        assert!(matches!(
            Validator::validate_block(&block, &ledger, &UTXOSet::new()),
            Err(BlockchainError::InvalidProofOfWork(_))
        ));
    }

    #[test]
    fn test_merkle_mismatch_is_rejected() {
        let params = test_params();
        let ledger = Ledger::new(params);
        let coinbase = Transaction::new_coinbase(b"miner", 1).unwrap();
        let pow = ProofOfWork::new(params.difficulty_bits);
        let wrong_root = "00".repeat(32);
        let (nonce, _) = pow
            .search(ledger.genesis_hash(), &wrong_root, 0, u64::MAX)
            .unwrap();
        let block = Block::from_parts(ledger.genesis_hash(), &wrong_root, vec![coinbase], nonce);
        assert!(matches!(
            Validator::validate_block(&block, &ledger, &UTXOSet::new()),
            Err(BlockchainError::MerkleRootMismatch { .. })
        ));
    }
}
