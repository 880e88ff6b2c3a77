use crate::core::Hashable;
use crate::error::{BlockchainError, Result};
use crate::utils::{hex_bytes, sha256_digest};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

// Internal nodes are domain separated from leaves so that an internal hash
// can never be passed off as a leaf digest.
const INTERNAL_NODE_PREFIX: u8 = 0x01;

/// Merkle commitment over an ordered list of [`Hashable`] items
///
/// Leaves carry each item's own content digest. An internal node hashes its
/// two children; a node left without a partner on its level is promoted to
/// the next level unchanged.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    root: MerkleNode,
    leaf_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNode {
    hash: Vec<u8>,
    left: Option<Box<MerkleNode>>,
    right: Option<Box<MerkleNode>>,
}

/// Sibling hashes from a leaf up to the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Digest of the item being proven
    #[serde(with = "hex_bytes")]
    pub leaf_hash: Vec<u8>,
    /// Path from the leaf upwards
    pub path: Vec<ProofElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofElement {
    /// Sibling hash
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    /// Direction: true if sibling is on the right, false if on the left
    pub is_right: bool,
}

impl MerkleNode {
    fn leaf(hash: Vec<u8>) -> MerkleNode {
        MerkleNode {
            hash,
            left: None,
            right: None,
        }
    }

    fn internal(left: MerkleNode, right: MerkleNode) -> MerkleNode {
        MerkleNode {
            hash: hash_pair(&left.hash, &right.hash),
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    fn is_valid(&self) -> bool {
        match (&self.left, &self.right) {
            (None, None) => true,
            (Some(left), Some(right)) => {
                self.content_hash() == self.hash && left.is_valid() && right.is_valid()
            }
            // every internal node has exactly two children
            _ => false,
        }
    }

    // Depth first search for `target`, pushing siblings on the way back up
    fn collect_proof(&self, target: &[u8], path: &mut Vec<ProofElement>) -> bool {
        let (left, right) = match (&self.left, &self.right) {
            (Some(left), Some(right)) => (left, right),
            _ => return self.hash == target,
        };
        if left.collect_proof(target, path) {
            path.push(ProofElement {
                hash: right.hash.clone(),
                is_right: true,
            });
            return true;
        }
        if right.collect_proof(target, path) {
            path.push(ProofElement {
                hash: left.hash.clone(),
                is_right: false,
            });
            return true;
        }
        false
    }
}

impl Hashable for MerkleNode {
    /// A leaf commits to itself; an internal node is recomputed from its children
    fn content_hash(&self) -> Vec<u8> {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => hash_pair(&left.hash, &right.hash),
            _ => self.hash.clone(),
        }
    }
}

impl MerkleTree {
    /// Build the tree over `items` in order
    pub fn build<T: Hashable>(items: &[T]) -> Result<MerkleTree> {
        let hashes: Vec<Vec<u8>> = items.iter().map(Hashable::content_hash).collect();
        Self::from_hashes(&hashes)
    }

    /// Build the tree from leaf digests that were already computed
    pub fn from_hashes(hashes: &[Vec<u8>]) -> Result<MerkleTree> {
        if hashes.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Cannot build a Merkle tree over an empty list".to_string(),
            ));
        }

        let mut level: Vec<MerkleNode> = hashes.iter().cloned().map(MerkleNode::leaf).collect();
        while level.len() > 1 {
            let mut next_level = Vec::with_capacity(level.len().div_ceil(2));
            let mut nodes = level.into_iter();
            while let Some(left) = nodes.next() {
                match nodes.next() {
                    Some(right) => next_level.push(MerkleNode::internal(left, right)),
                    // odd one out moves up as is
                    None => next_level.push(left),
                }
            }
            level = next_level;
        }

        let root = level.pop().ok_or_else(|| {
            BlockchainError::Defect("Merkle construction produced no root".to_string())
        })?;
        Ok(MerkleTree {
            root,
            leaf_count: hashes.len(),
        })
    }

    /// Hex root of `items` without keeping the tree around
    pub fn root_for<T: Hashable>(items: &[T]) -> Result<String> {
        Ok(Self::build(items)?.root_hash())
    }

    pub fn root(&self) -> &MerkleNode {
        &self.root
    }

    pub fn root_bytes(&self) -> &[u8] {
        self.root.hash.as_slice()
    }

    /// Lowercase hex of the root digest
    pub fn root_hash(&self) -> String {
        HEXLOWER.encode(&self.root.hash)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Every internal node's stored hash matches the hash of its children
    pub fn is_valid(&self) -> bool {
        self.root.is_valid()
    }

    /// Path proving `item` is one of the leaves, if it is
    pub fn membership_proof<T: Hashable + ?Sized>(&self, item: &T) -> Option<MerkleProof> {
        let leaf_hash = item.content_hash();
        let mut path = Vec::new();
        if self.root.collect_proof(&leaf_hash, &mut path) {
            Some(MerkleProof { leaf_hash, path })
        } else {
            None
        }
    }

    /// True if a membership proof for `item` exists and verifies against the root
    pub fn contains<T: Hashable + ?Sized>(&self, item: &T) -> bool {
        self.membership_proof(item)
            .map(|proof| proof.verify(self.root_bytes()))
            .unwrap_or(false)
    }
}

impl MerkleProof {
    /// Fold the path from the leaf and compare with `root`
    pub fn verify(&self, root: &[u8]) -> bool {
        let mut current = self.leaf_hash.clone();
        for element in &self.path {
            current = if element.is_right {
                hash_pair(&current, &element.hash)
            } else {
                hash_pair(&element.hash, &current)
            };
        }
        current == root
    }

    /// Verify against a hex-encoded root, as stored in a block
    pub fn verify_hex(&self, root_hex: &str) -> bool {
        match data_encoding::HEXLOWER_PERMISSIVE.decode(root_hex.as_bytes()) {
            Ok(root) => self.verify(&root),
            Err(_) => false,
        }
    }
}

fn hash_pair(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut combined = Vec::with_capacity(1 + left.len() + right.len());
    combined.push(INTERNAL_NODE_PREFIX);
    combined.extend_from_slice(left);
    combined.extend_from_slice(right);
    sha256_digest(&combined)
}
