//! shardctl - Shard controller configuration core
//!
//! This crate decides which replication group owns each shard of a
//! horizontally-sharded store and records every decision as a numbered,
//! immutable configuration:
//! - Configuration snapshots and the group-shard view
//! - Deterministic, minimal-movement rebalancing
//! - Append-only configuration history
//! - The join/leave/move/query state machine and its command codec
//!
//! Ordering and replication of commands across controller replicas is left
//! to an external consensus layer; this crate only guarantees that equal
//! command sequences produce equal histories.

pub mod balancer;
pub mod command;
pub mod config;
pub mod error;
pub mod model;
pub mod settings;
pub mod store;

pub use balancer::{rebalance, Transfer};
pub use command::{Op, Reply, Status};
pub use config::{Config, ConfigId, Gid, N_SHARDS, UNASSIGNED};
pub use error::{ControllerError, Result};
pub use model::ConfigModel;
pub use settings::ControllerSettings;
pub use store::ConfigStore;
