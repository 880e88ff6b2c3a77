use crate::core::{Block, Transaction};
use crate::error::Result;
use crate::network::{Node, Nodes};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const BLOCK_PATH: &str = "/block/";
pub const TRANSACTION_PATH: &str = "/pending_transaction";
pub const PEERS_PATH: &str = "/peers";

/// Outbound HTTP to peers
///
/// Calls are blocking, so anything triggered from a request handler or the
/// mining loop goes through the `spawn_*` helpers and runs detached. A peer
/// that fails to answer is reported as `None` and otherwise ignored.
pub struct PeerGossip {
    nodes: Nodes,
    self_address: String,
    timeout: Duration,
}

impl PeerGossip {
    pub fn new(self_address: &str, timeout: Duration) -> PeerGossip {
        let self_address = Node::parse(self_address)
            .map(|node| node.get_addr().to_string())
            .unwrap_or_else(|_| self_address.to_string());
        PeerGossip {
            nodes: Nodes::new(),
            self_address,
            timeout,
        }
    }

    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn self_address(&self) -> &str {
        self.self_address.as_str()
    }

    pub fn peer_count(&self) -> usize {
        self.nodes.len()
    }

    /// Validate and remember a peer. Returns true if it is new.
    pub fn add_peer(&self, addr: &str) -> Result<bool> {
        let node = Node::parse(addr)?;
        if node.get_addr() == self.self_address {
            return Ok(false);
        }
        let added = self.nodes.add_node(node);
        if added {
            info!("Added peer {addr}");
        }
        Ok(added)
    }

    fn client(&self) -> Result<Client> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }

    pub fn broadcast_transaction(&self, tx: &Transaction) -> Vec<Option<u16>> {
        self.post_to_all(TRANSACTION_PATH, tx)
    }

    pub fn broadcast_block(&self, block: &Block) -> Vec<Option<u16>> {
        self.post_to_all(BLOCK_PATH, block)
    }

    fn post_to_all<T: Serialize>(&self, path: &str, body: &T) -> Vec<Option<u16>> {
        let nodes = self.nodes.get_nodes();
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                warn!("Cannot build HTTP client for gossip: {e}");
                return vec![None; nodes.len()];
            }
        };
        nodes
            .iter()
            .map(|node| match client.post(node.endpoint(path)).json(body).send() {
                Ok(response) => Some(response.status().as_u16()),
                Err(e) => {
                    debug!("Peer {} unreachable: {e}", node.get_addr());
                    None
                }
            })
            .collect()
    }

    /// Broadcast on a detached thread
    pub fn spawn_broadcast_block(self: &Arc<Self>, block: Block) {
        let gossip = Arc::clone(self);
        self.spawn_detached("gossip-block", move || {
            let statuses = gossip.broadcast_block(&block);
            debug!("Block {} sent to peers: {statuses:?}", block.get_hash());
        });
    }

    /// Broadcast on a detached thread
    pub fn spawn_broadcast_transaction(self: &Arc<Self>, tx: Transaction) {
        let gossip = Arc::clone(self);
        self.spawn_detached("gossip-tx", move || {
            let statuses = gossip.broadcast_transaction(&tx);
            debug!("Transaction {} sent to peers: {statuses:?}", tx.hash());
        });
    }

    fn spawn_detached<F>(&self, name: &str, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.nodes.is_empty() {
            return;
        }
        if let Err(e) = thread::Builder::new().name(name.to_string()).spawn(work) {
            warn!("Cannot spawn {name} thread: {e}");
        }
    }

    /// Ask `node` for its peer list, announcing ourselves on the way
    pub fn fetch_peers(&self, client: &Client, node: &Node) -> Result<Vec<String>> {
        let peers = client
            .get(node.endpoint(PEERS_PATH))
            .query(&[("url", self.self_address.as_str())])
            .send()?
            .error_for_status()?
            .json::<Vec<String>>()?;
        Ok(peers)
    }

    /// Merge every peer's list into ours. Returns how many peers were new.
    pub fn exchange_peers(&self) -> Result<usize> {
        if self.nodes.is_empty() {
            return Ok(0);
        }
        let client = self.client()?;
        let mut added = 0;
        for node in self.nodes.get_nodes() {
            match self.fetch_peers(&client, &node) {
                Ok(peers) => {
                    for addr in peers {
                        match self.add_peer(&addr) {
                            Ok(true) => added += 1,
                            Ok(false) => {}
                            Err(e) => debug!("Ignoring peer {addr:?} from {}: {e}", node.get_addr()),
                        }
                    }
                }
                Err(e) => warn!("Peer exchange with {} failed: {e}", node.get_addr()),
            }
        }
        Ok(added)
    }

    /// Register the initial peer and pull its peer list once
    pub fn bootstrap(&self, initial_peer: &str) -> Result<usize> {
        self.add_peer(initial_peer)?;
        self.exchange_peers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gossip() -> PeerGossip {
        PeerGossip::new("http://localhost:8000", Duration::from_millis(200))
    }

    #[test]
    fn test_self_is_never_a_peer() {
        let gossip = gossip();
        assert!(!gossip.add_peer("http://localhost:8000/").unwrap());
        assert_eq!(gossip.peer_count(), 0);
    }

    #[test]
    fn test_invalid_peer_is_rejected() {
        let gossip = gossip();
        assert!(gossip.add_peer("ftp://elsewhere").is_err());
        assert!(gossip.add_peer("http://localhost:8001").unwrap());
        assert!(!gossip.add_peer("http://localhost:8001").unwrap());
        assert_eq!(gossip.peer_count(), 1);
    }

    #[test]
    fn test_unreachable_peer_reports_none() {
        let gossip = gossip();
        // port 9 (discard) on loopback is closed in test environments
        gossip.add_peer("http://127.0.0.1:9").unwrap();
        let tx = Transaction::new_coinbase(b"miner", 1).unwrap();
        assert_eq!(gossip.broadcast_transaction(&tx), vec![None]);
    }

    #[test]
    fn test_broadcast_without_peers_is_empty() {
        let gossip = gossip();
        let block = Block::genesis();
        assert!(gossip.broadcast_block(&block).is_empty());
        assert_eq!(gossip.exchange_peers().unwrap(), 0);
    }
}
