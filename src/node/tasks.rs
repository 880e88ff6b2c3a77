use crate::config::Config;
use crate::core::{Miner, OutPoint, TXOutput, Transaction};
use crate::error::{BlockchainError, Result};
use crate::node::NodeService;
use crate::wallet::Wallet;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shared flag that ends every background loop
///
/// Sleeping goes through [`StopSignal::wait`], so a stop request wakes the
/// loops immediately instead of after their current delay.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> StopSignal {
        StopSignal::default()
    }

    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `timeout` or until stopped. Returns true if stopped.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = cvar
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// Run `body` on a named thread until `stop` fires, sleeping `interval()`
/// between rounds. Errors from a round are logged and the loop goes on.
pub fn spawn_repeating<I, F>(
    name: &str,
    interval: I,
    stop: StopSignal,
    mut body: F,
) -> Result<JoinHandle<()>>
where
    I: Fn() -> Duration + Send + 'static,
    F: FnMut(&StopSignal) -> Result<()> + Send + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            debug!("{thread_name} started");
            while !stop.is_stopped() {
                if let Err(e) = body(&stop) {
                    warn!("{thread_name}: {e}");
                }
                if stop.wait(interval()) {
                    break;
                }
            }
            debug!("{thread_name} stopped");
        })
        .map_err(|e| BlockchainError::Io(format!("cannot spawn {name}: {e}")))
}

/// Uniform delay in `[0, max_ms)`
fn random_delay(max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// One mining round: snapshot the head and pool, search nonces without
/// holding the lock, then publish. The round is abandoned as soon as the
/// head moves under it.
pub fn mine_round(
    service: &NodeService,
    miner: &Miner,
    max_transactions: usize,
    max_delay_ms: u64,
    stop: &StopSignal,
) -> Result<()> {
    let snapshot = service.state().read()?.mining_snapshot(max_transactions)?;
    let transactions =
        miner.candidate_transactions(snapshot.transactions, snapshot.collected_fees)?;

    loop {
        let (block, found) = miner.attempt_block(&transactions, &snapshot.parent_hash)?;
        if found {
            service.publish_mined_block(block, snapshot.parent_height)?;
            return Ok(());
        }
        if service.head_hash()? != snapshot.parent_hash {
            debug!("Head moved, restarting mining on the new head");
            return Ok(());
        }
        if stop.wait(random_delay(max_delay_ms)) {
            return Ok(());
        }
    }
}

/// Spend one of `wallet`'s outputs to a throwaway key, the way a user of the
/// network would. Returns None when the wallet has nothing spendable.
pub fn random_transaction(service: &NodeService, wallet: &Wallet) -> Result<Option<Transaction>> {
    let spendable: Vec<(OutPoint, TXOutput)> = {
        let state = service.state().read()?;
        state
            .utxo_set
            .find_owned(wallet.get_public_key())
            .into_iter()
            .filter(|(outpoint, _)| !state.pool.is_spent(outpoint))
            .collect()
    };
    let mut rng = rand::thread_rng();
    let (outpoint, output) = match spendable.choose(&mut rng) {
        Some(chosen) => chosen.clone(),
        None => return Ok(None),
    };
    let value = output.get_value();
    if value < 2 {
        return Ok(None);
    }

    // at least one unit of fee and one unit to the recipient
    let fee = rng.gen_range(1..=(value / 10).max(1));
    let amount = rng.gen_range(1..=value - fee);
    let change = value - fee - amount;

    let recipient = Wallet::new()?;
    let mut outputs = vec![TXOutput::new(recipient.get_public_key(), amount)?];
    if change > 0 {
        outputs.push(TXOutput::new(wallet.get_public_key(), change)?);
    }
    let tx = Transaction::new_signed(
        vec![outpoint],
        outputs,
        &format!("payment of {amount} to {}", recipient.fingerprint()),
        wallet,
    )?;
    Ok(Some(tx))
}

fn generate_round(service: &NodeService, wallet: &Wallet) -> Result<()> {
    match random_transaction(service, wallet)? {
        Some(tx) => {
            service.submit_transaction(tx)?;
        }
        None => debug!("Nothing to spend yet"),
    }
    Ok(())
}

fn exchange_round(service: &NodeService) -> Result<()> {
    let added = service.gossip().exchange_peers()?;
    if added > 0 {
        info!("Learned {added} new peers");
    }
    Ok(())
}

/// Handles of the running background loops
pub struct NodeTasks {
    stop: StopSignal,
    handles: Vec<JoinHandle<()>>,
}

impl NodeTasks {
    /// Start the loops the configuration enables. Mining and the generator
    /// share `wallet`, so generated transactions spend mined rewards.
    pub fn start(service: NodeService, wallet: Wallet, config: &Config) -> Result<NodeTasks> {
        let stop = StopSignal::new();
        let mut handles = vec![];

        if config.mining {
            let miner = Miner::new(
                wallet.clone(),
                config.consensus_params(),
                config.nonce_batch,
            );
            let service = service.clone();
            let max_transactions = config.max_block_transactions;
            let max_delay_ms = config.mining_max_delay_ms;
            handles.push(spawn_repeating(
                "miner",
                || Duration::ZERO,
                stop.clone(),
                move |stop| mine_round(&service, &miner, max_transactions, max_delay_ms, stop),
            )?);
        }

        if config.generate_transactions {
            let service = service.clone();
            let max_delay_ms = config.tx_generation_max_delay_ms;
            handles.push(spawn_repeating(
                "tx-generator",
                move || random_delay(max_delay_ms),
                stop.clone(),
                move |_| generate_round(&service, &wallet),
            )?);
        }

        {
            let service = service.clone();
            let interval = Duration::from_millis(config.peer_exchange_interval_ms);
            handles.push(spawn_repeating(
                "peer-exchange",
                move || interval,
                stop.clone(),
                move |_| exchange_round(&service),
            )?);
        }

        let interval = Duration::from_millis(config.status_interval_ms);
        handles.push(spawn_repeating(
            "status",
            move || interval,
            stop.clone(),
            move |_| {
                info!("{}", service.status()?);
                Ok(())
            },
        )?);

        Ok(NodeTasks { stop, handles })
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Signal every loop and wait for them to finish
    pub fn stop(self) {
        self.stop.stop();
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("A background task panicked");
            }
        }
    }
}
