//! The running node
//!
//! State shared between the HTTP handlers and the background loops, the
//! facade they all go through, and the loops themselves.

pub mod service;
pub mod state;
pub mod tasks;

pub use service::NodeService;
pub use state::{MiningSnapshot, NodeState, NodeStatus, SharedState};
pub use tasks::{mine_round, random_transaction, spawn_repeating, NodeTasks, StopSignal};
