//! Shard rebalancing
//!
//! Redistributes shards across the member groups of a configuration so that
//! no shard is left unassigned and member shard counts differ by at most one.
//!
//! The procedure is fully deterministic: every replica applying the same
//! command sequence must reach the same assignment, so all choices are made
//! from ordered structures with ties broken by the smallest group id.
//!
//! 1. **Drain**: shards owned by [`UNASSIGNED`] (or by a group that is no
//!    longer a member) are handed out one at a time, lowest shard first, to
//!    the least loaded group.
//! 2. **Balance**: while the most and least loaded groups differ by more than
//!    one shard, the lowest shard of the most loaded group moves to the least
//!    loaded group.

use crate::config::{Config, Gid, UNASSIGNED};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A single shard handed from one group to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transfer {
    /// Shard index
    pub shard: usize,
    /// Previous owner
    pub from: Gid,
    /// New owner
    pub to: Gid,
}

/// Per-group shard ownership ordered by load.
///
/// `by_load` is keyed by `(shard count, gid)` and is the only structure
/// consulted for extremal groups; it is updated on every transfer.
struct GroupLoad {
    owned: BTreeMap<Gid, BTreeSet<usize>>,
    by_load: BTreeSet<(usize, Gid)>,
    orphans: BTreeSet<usize>,
}

impl GroupLoad {
    fn from_config(config: &Config) -> Self {
        let mut owned: BTreeMap<Gid, BTreeSet<usize>> = BTreeMap::new();
        let mut orphans = BTreeSet::new();

        for (gid, shards) in config.group_shards() {
            if config.has_group(gid) {
                owned.insert(gid, shards.into_iter().collect());
            } else {
                // Unassigned, or left behind by a manual move
                orphans.extend(shards);
            }
        }

        let by_load = owned
            .iter()
            .map(|(&gid, shards)| (shards.len(), gid))
            .collect();

        Self {
            owned,
            by_load,
            orphans,
        }
    }

    /// Least loaded group, smallest gid on ties
    fn least_loaded(&self) -> Option<(usize, Gid)> {
        self.by_load.first().copied()
    }

    /// Most loaded group, smallest gid on ties
    fn most_loaded(&self) -> Option<(usize, Gid)> {
        let &(max, _) = self.by_load.last()?;
        self.by_load.range((max, Gid::MIN)..).next().copied()
    }

    fn lowest_shard(&self, gid: Gid) -> Option<usize> {
        self.owned.get(&gid)?.first().copied()
    }

    fn give(&mut self, shard: usize, to: Gid) {
        if let Some(shards) = self.owned.get_mut(&to) {
            self.by_load.remove(&(shards.len(), to));
            shards.insert(shard);
            self.by_load.insert((shards.len(), to));
        }
    }

    fn take(&mut self, shard: usize, from: Gid) {
        if let Some(shards) = self.owned.get_mut(&from) {
            self.by_load.remove(&(shards.len(), from));
            shards.remove(&shard);
            self.by_load.insert((shards.len(), from));
        }
    }

    fn write_back(&self, config: &mut Config) {
        for (&gid, shards) in &self.owned {
            for &shard in shards {
                config.shards[shard] = gid;
            }
        }
        for &shard in &self.orphans {
            config.shards[shard] = UNASSIGNED;
        }
    }
}

/// Rebalance a configuration in place and return the transfers performed.
///
/// With no member groups every shard becomes unassigned. Otherwise, on
/// return, every shard is owned by a member group and member shard counts
/// differ by at most one.
pub fn rebalance(config: &mut Config) -> Vec<Transfer> {
    let mut transfers = Vec::new();

    if config.groups.is_empty() {
        for (shard, owner) in config.shards.iter_mut().enumerate() {
            if *owner != UNASSIGNED {
                transfers.push(Transfer {
                    shard,
                    from: *owner,
                    to: UNASSIGNED,
                });
                *owner = UNASSIGNED;
            }
        }
        return transfers;
    }

    let mut load = GroupLoad::from_config(config);

    // Drain
    while let Some(shard) = load.orphans.pop_first() {
        let Some((_, to)) = load.least_loaded() else {
            break;
        };
        load.give(shard, to);
        debug!(shard, from = config.shards[shard], to, "Assigned orphaned shard");
        transfers.push(Transfer {
            shard,
            from: config.shards[shard],
            to,
        });
    }

    // Balance
    while let (Some((max, from)), Some((min, to))) = (load.most_loaded(), load.least_loaded()) {
        if max - min <= 1 {
            break;
        }
        let Some(shard) = load.lowest_shard(from) else {
            break;
        };
        load.take(shard, from);
        load.give(shard, to);
        debug!(shard, from, to, "Moved shard to balance load");
        transfers.push(Transfer { shard, from, to });
    }

    load.write_back(config);
    transfers
}
