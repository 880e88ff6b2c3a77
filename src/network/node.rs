use crate::error::{BlockchainError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// A peer's base URL, e.g. `http://localhost:8001`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Node {
    addr: String,
}

impl Node {
    /// Accept only absolute http(s) URLs with a host. The trailing slash is
    /// dropped so the same peer is never listed twice.
    pub fn parse(addr: &str) -> Result<Node> {
        let url = Url::parse(addr.trim())
            .map_err(|e| BlockchainError::InvalidRequest(format!("peer URL {addr:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(BlockchainError::InvalidRequest(format!(
                "peer URL {addr:?} must be http or https with a host"
            )));
        }
        Ok(Node {
            addr: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }

    /// `path` appended to the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.addr)
    }
}

/// Known peers. Insertion order is kept; duplicates are ignored.
pub struct Nodes {
    inner: RwLock<Vec<Node>>,
}

impl Default for Nodes {
    fn default() -> Self {
        Self::new()
    }
}

impl Nodes {
    pub fn new() -> Nodes {
        Nodes {
            inner: RwLock::new(vec![]),
        }
    }

    /// Returns true if the node was not known before
    pub fn add_node(&self, node: Node) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.contains(&node) {
            return false;
        }
        inner.push(node);
        true
    }

    pub fn get_nodes(&self) -> Vec<Node> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.get_nodes()
            .into_iter()
            .map(|node| node.addr)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
