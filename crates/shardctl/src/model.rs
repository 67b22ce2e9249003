//! Configuration state machine
//!
//! [`ConfigModel`] applies join, leave, move and query commands to the
//! configuration history. Every mutation starts from a copy of the latest
//! configuration, so committed configurations are never modified.
//!
//! The model is deterministic and single-threaded: replicas fed the same
//! command sequence build identical histories. Callers sharing a model across
//! threads must serialize access themselves.

use crate::balancer::{self, Transfer};
use crate::command::{Op, Reply};
use crate::config::{Config, Gid, N_SHARDS, UNASSIGNED};
use crate::error::{ControllerError, Result};
use crate::settings::ControllerSettings;
use crate::store::ConfigStore;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Shard controller configuration state machine
#[derive(Debug, Clone)]
pub struct ConfigModel {
    history: ConfigStore,
    settings: ControllerSettings,
}

impl ConfigModel {
    /// Create a model with default settings for replica `controller_id`
    pub fn new(controller_id: usize) -> Self {
        Self::with_settings(ControllerSettings::new(controller_id))
    }

    /// Create a model from settings
    pub fn with_settings(settings: ControllerSettings) -> Self {
        Self {
            history: ConfigStore::new(),
            settings,
        }
    }

    /// The configuration history
    pub fn history(&self) -> &ConfigStore {
        &self.history
    }

    /// Apply one command.
    ///
    /// Queries reply with the requested configuration; every other command
    /// replies with an empty configuration.
    pub fn apply(&mut self, op: Op) -> Reply {
        debug!(
            controller = self.settings.controller_id,
            op = op.kind(),
            "Applying command"
        );

        let result = match op {
            Op::Join { servers } => self.join(servers).map(|_| Config::default()),
            Op::Leave { gids } => self.leave(&gids).map(|_| Config::default()),
            Op::Move { shard, gid } => self.move_shard(shard, gid).map(|_| Config::default()),
            Op::Query { num } => Ok(self.query(num)),
        };

        match result {
            Ok(config) => Reply::ok(config),
            Err(e) => {
                warn!(controller = self.settings.controller_id, error = %e, "Command rejected");
                Reply::failed(&e)
            }
        }
    }

    /// Decode and apply one JSON command payload.
    ///
    /// Payloads that do not decode to a known command reply with
    /// `InvalidOperation` and leave the history untouched.
    pub fn apply_encoded(&mut self, payload: &[u8]) -> Reply {
        match Op::decode(payload) {
            Ok(op) => self.apply(op),
            Err(e @ ControllerError::InvalidOperation(_)) => {
                warn!(controller = self.settings.controller_id, error = %e, "Invalid command");
                Reply::failed(&e)
            }
            Err(e) => {
                warn!(controller = self.settings.controller_id, error = %e, "Malformed command payload");
                Reply::failed(&e)
            }
        }
    }

    /// Add groups, merging server lists of groups that already exist, and
    /// rebalance.
    pub fn join(&mut self, servers: BTreeMap<Gid, Vec<String>>) -> Result<()> {
        let mut config = self.history.draft();

        for (gid, list) in servers {
            if gid == UNASSIGNED {
                warn!(controller = self.settings.controller_id, "Ignoring join of reserved group 0");
                continue;
            }
            config.groups.entry(gid).or_default().extend(list);
        }

        let transfers = balancer::rebalance(&mut config);
        self.commit(config, &transfers);
        Ok(())
    }

    /// Remove groups, releasing their shards, and rebalance.
    ///
    /// Groups that are not members are skipped.
    pub fn leave(&mut self, gids: &[Gid]) -> Result<()> {
        let mut config = self.history.draft();

        for &gid in gids {
            if config.groups.remove(&gid).is_none() {
                debug!(controller = self.settings.controller_id, gid, "Leave of unknown group skipped");
                continue;
            }
            for owner in config.shards.iter_mut().filter(|owner| **owner == gid) {
                *owner = UNASSIGNED;
            }
        }

        let transfers = balancer::rebalance(&mut config);
        self.commit(config, &transfers);
        Ok(())
    }

    /// Hand `shard` to `gid` without rebalancing.
    ///
    /// The target group is only checked against the membership when
    /// `strict_move` is set.
    pub fn move_shard(&mut self, shard: usize, gid: Gid) -> Result<()> {
        if shard >= N_SHARDS {
            return Err(ControllerError::ShardOutOfRange {
                shard,
                n_shards: N_SHARDS,
            });
        }

        let mut config = self.history.draft();
        if self.settings.strict_move && gid != UNASSIGNED && !config.has_group(gid) {
            return Err(ControllerError::UnknownGroup(gid));
        }

        let from = config.shards[shard];
        config.shards[shard] = gid;
        self.commit(config, &[Transfer { shard, from, to: gid }]);
        Ok(())
    }

    /// Copy of configuration `num`, or of the latest configuration if `num`
    /// is negative or not yet recorded.
    pub fn query(&self, num: i64) -> Config {
        self.history.get(num)
    }

    /// Copy of the latest configuration
    pub fn latest(&self) -> Config {
        self.history.latest()
    }

    fn commit(&mut self, config: Config, transfers: &[Transfer]) {
        info!(
            controller = self.settings.controller_id,
            cluster = %self.settings.cluster_name,
            num = config.num,
            groups = config.groups.len(),
            moved = transfers.len(),
            counts = ?config.shard_counts(),
            "Committed configuration"
        );
        self.history.commit(config);
    }
}

impl Default for ConfigModel {
    fn default() -> Self {
        Self::new(0)
    }
}
