use crate::core::{OutPoint, Transaction, Validator};
use crate::error::{BlockchainError, Result};
use crate::storage::UTXOSet;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

struct PoolEntry {
    transaction: Transaction,
    fee: u64,
    // UTXO generation the fee was last checked against
    checked_at: u64,
}

/// Pending transactions waiting for a block
///
/// Entries are kept valid against the live UTXO set: every admitted
/// transaction passed validation, and [`TransactionPool::refresh`] revalidates
/// the pool whenever the set has moved on. Ordering for block selection is
/// fee descending, then hash ascending.
#[derive(Default)]
pub struct TransactionPool {
    entries: HashMap<String, PoolEntry>,
    by_fee: BTreeSet<(Reverse<u64>, String)>,
    // outpoint -> hash of the pending transaction spending it
    spent: HashMap<OutPoint, String>,
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool::default()
    }

    /// Validate `tx` against `utxo_set` and the pool, then admit it.
    /// Returns the fee it pays.
    pub fn add(&mut self, tx: Transaction, utxo_set: &UTXOSet) -> Result<u64> {
        let hash = tx.hash();
        if self.entries.contains_key(&hash) {
            return Err(BlockchainError::DuplicateTransaction(hash));
        }

        let fee = Validator::validate_transaction(&tx, utxo_set)?;
        for outpoint in tx.spent_outpoints() {
            if let Some(other) = self.spent.get(outpoint) {
                return Err(BlockchainError::DoubleSpend(format!(
                    "{outpoint} is already spent by pending transaction {other}"
                )));
            }
        }

        self.insert(hash, tx, fee, utxo_set.generation());
        Ok(fee)
    }

    fn insert(&mut self, hash: String, transaction: Transaction, fee: u64, checked_at: u64) {
        for outpoint in transaction.spent_outpoints() {
            self.spent.insert(outpoint.clone(), hash.clone());
        }
        self.by_fee.insert((Reverse(fee), hash.clone()));
        self.entries.insert(
            hash,
            PoolEntry {
                transaction,
                fee,
                checked_at,
            },
        );
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&Transaction> {
        self.entries.get(hash).map(|entry| &entry.transaction)
    }

    pub fn fee_of(&self, hash: &str) -> Option<u64> {
        self.entries.get(hash).map(|entry| entry.fee)
    }

    /// True if a pending transaction already spends `outpoint`
    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.spent.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `max` transactions, highest fee first, ties broken by hash
    pub fn select_for_block(&self, max: usize) -> Vec<Transaction> {
        self.by_fee
            .iter()
            .take(max)
            .filter_map(|(_, hash)| self.entries.get(hash))
            .map(|entry| entry.transaction.clone())
            .collect()
    }

    /// Total fee paid by `transactions`, counting only those in the pool
    pub fn total_fees<'a, I>(&self, transactions: I) -> u64
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        transactions
            .into_iter()
            .filter_map(|tx| self.fee_of(&tx.hash()))
            .fold(0u64, |total, fee| total.saturating_add(fee))
    }

    /// Every pending transaction in selection order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.select_for_block(self.entries.len())
    }

    /// Drop a transaction. Removing an unknown hash is a no-op.
    pub fn remove(&mut self, hash: &str) -> Option<Transaction> {
        let entry = self.entries.remove(hash)?;
        self.by_fee.remove(&(Reverse(entry.fee), hash.to_string()));
        for outpoint in entry.transaction.spent_outpoints() {
            if self.spent.get(outpoint).map(String::as_str) == Some(hash) {
                self.spent.remove(outpoint);
            }
        }
        Some(entry.transaction)
    }

    pub fn remove_all(&mut self, transactions: &[Transaction]) {
        for tx in transactions {
            self.remove(&tx.hash());
        }
    }

    /// Revalidate entries checked against an older UTXO generation and drop
    /// the ones that no longer hold. Returns how many were dropped.
    pub fn refresh(&mut self, utxo_set: &UTXOSet) -> usize {
        let generation = utxo_set.generation();
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.checked_at != generation)
            .map(|(hash, _)| hash.clone())
            .collect();

        let mut dropped = 0;
        for hash in stale {
            let Some(tx) = self.remove(&hash) else {
                continue;
            };
            match Validator::validate_transaction(&tx, utxo_set) {
                Ok(fee) => self.insert(hash, tx, fee, generation),
                Err(e) => {
                    log::debug!("Dropping pending transaction {hash}: {e}");
                    dropped += 1;
                }
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Block, TXOutput};
    use crate::wallet::Wallet;

    // A UTXO set holding one output of `value` per entry, all owned by `wallet`
    fn funded(wallet: &Wallet, values: &[u64]) -> (UTXOSet, Vec<OutPoint>) {
        let mut utxo_set = UTXOSet::new();
        let mut outpoints = vec![];
        for value in values {
            let coinbase = Transaction::new_coinbase(wallet.get_public_key(), *value).unwrap();
            outpoints.push(OutPoint::new(coinbase.hash(), 0));
            let block = Block::new("parent", vec![coinbase], 0).unwrap();
            utxo_set.apply_block(&block).unwrap();
        }
        (utxo_set, outpoints)
    }

    fn spend(wallet: &Wallet, outpoint: &OutPoint, input: u64, fee: u64) -> Transaction {
        Transaction::new_signed(
            vec![outpoint.clone()],
            vec![TXOutput::new(b"recipient", input - fee).unwrap()],
            "",
            wallet,
        )
        .unwrap()
    }

    #[test]
    fn test_add_returns_fee() {
        let wallet = Wallet::new().unwrap();
        let (utxo_set, outpoints) = funded(&wallet, &[100]);
        let mut pool = TransactionPool::new();
        let tx = spend(&wallet, &outpoints[0], 100, 7);
        assert_eq!(pool.add(tx.clone(), &utxo_set).unwrap(), 7);
        assert!(pool.contains(&tx.hash()));
        assert_eq!(pool.fee_of(&tx.hash()), Some(7));
        assert!(pool.is_spent(&outpoints[0]));
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let wallet = Wallet::new().unwrap();
        let (utxo_set, outpoints) = funded(&wallet, &[100]);
        let mut pool = TransactionPool::new();
        let tx = spend(&wallet, &outpoints[0], 100, 7);
        pool.add(tx.clone(), &utxo_set).unwrap();
        assert!(matches!(
            pool.add(tx, &utxo_set),
            Err(BlockchainError::DuplicateTransaction(_))
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_conflicting_spend_is_rejected() {
        let wallet = Wallet::new().unwrap();
        let (utxo_set, outpoints) = funded(&wallet, &[100]);
        let mut pool = TransactionPool::new();
        pool.add(spend(&wallet, &outpoints[0], 100, 7), &utxo_set).unwrap();
        assert!(matches!(
            pool.add(spend(&wallet, &outpoints[0], 100, 9), &utxo_set),
            Err(BlockchainError::DoubleSpend(_))
        ));
    }

    #[test]
    fn test_select_orders_by_fee_then_hash() {
        let wallet = Wallet::new().unwrap();
        let (utxo_set, outpoints) = funded(&wallet, &[100, 100, 100, 100]);
        let mut pool = TransactionPool::new();
        let a = spend(&wallet, &outpoints[0], 100, 5);
        let b = spend(&wallet, &outpoints[1], 100, 10);
        let c = spend(&wallet, &outpoints[2], 100, 1);
        let d = spend(&wallet, &outpoints[3], 100, 5);
        for tx in [&a, &b, &c, &d] {
            pool.add(tx.clone(), &utxo_set).unwrap();
        }

        let selected = pool.select_for_block(3);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0], b);
        let (first_five, second_five) = if a.hash() < d.hash() { (&a, &d) } else { (&d, &a) };
        assert_eq!(&selected[1], first_five);
        assert_eq!(&selected[2], second_five);

        assert_eq!(pool.select_for_block(0).len(), 0);
        assert_eq!(pool.select_for_block(10).len(), 4);
        assert_eq!(pool.total_fees(&selected), 20);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let wallet = Wallet::new().unwrap();
        let (utxo_set, outpoints) = funded(&wallet, &[100]);
        let mut pool = TransactionPool::new();
        let tx = spend(&wallet, &outpoints[0], 100, 3);
        pool.add(tx.clone(), &utxo_set).unwrap();

        assert!(pool.remove(&tx.hash()).is_some());
        assert!(pool.remove(&tx.hash()).is_none());
        pool.remove_all(&[tx.clone()]);
        assert!(pool.is_empty());
        assert!(!pool.is_spent(&outpoints[0]));
        // the output can be spent again once the first spend is gone
        pool.add(spend(&wallet, &outpoints[0], 100, 4), &utxo_set).unwrap();
    }

    #[test]
    fn test_refresh_drops_spent_entries() {
        let wallet = Wallet::new().unwrap();
        let (mut utxo_set, outpoints) = funded(&wallet, &[100, 100]);
        let mut pool = TransactionPool::new();
        let kept = spend(&wallet, &outpoints[0], 100, 2);
        let doomed = spend(&wallet, &outpoints[1], 100, 2);
        pool.add(kept.clone(), &utxo_set).unwrap();
        pool.add(doomed.clone(), &utxo_set).unwrap();

        // a competing spend of the second output gets confirmed
        let competitor = spend(&wallet, &outpoints[1], 100, 50);
        let block = Block::new("parent", vec![competitor], 0).unwrap();
        utxo_set.apply_block(&block).unwrap();

        assert_eq!(pool.refresh(&utxo_set), 1);
        assert!(pool.contains(&kept.hash()));
        assert!(!pool.contains(&doomed.hash()));
        // nothing left to recheck at this generation
        assert_eq!(pool.refresh(&utxo_set), 0);
    }
}
