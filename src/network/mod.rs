//! Networking between nodes
//!
//! Peers talk plain HTTP with JSON bodies. `server` is the inbound side,
//! `gossip` pushes blocks and transactions out and discovers new peers.

pub mod gossip;
pub mod node;
pub mod server;

pub use gossip::{PeerGossip, BLOCK_PATH, PEERS_PATH, TRANSACTION_PATH};
pub use node::{Node, Nodes};
pub use server::{build_router, serve, ApiError};
