//! Configuration snapshots
//!
//! A [`Config`] is one numbered assignment of shards to replication groups,
//! together with the server list of every group that currently exists.
//! Config #0 has no groups and every shard owned by [`UNASSIGNED`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of shards in every configuration
pub const N_SHARDS: usize = 10;

/// Replication group identifier
pub type Gid = u64;

/// Configuration number
pub type ConfigId = u64;

/// Sentinel group meaning "no group owns this shard"
pub const UNASSIGNED: Gid = 0;

/// A configuration: an assignment of shards to groups.
///
/// `groups` is ordered by group id so that two replicas holding equal
/// configurations also iterate them identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Config number
    pub num: ConfigId,
    /// shard -> gid
    pub shards: [Gid; N_SHARDS],
    /// gid -> servers
    pub groups: BTreeMap<Gid, Vec<String>>,
}

impl Config {
    /// The initial configuration (#0)
    pub fn initial() -> Self {
        Self::default()
    }

    /// Copy this configuration under a new number
    pub fn successor(&self, num: ConfigId) -> Self {
        let mut next = self.clone();
        next.num = num;
        next
    }

    /// Check if a group is a member of this configuration
    pub fn has_group(&self, gid: Gid) -> bool {
        self.groups.contains_key(&gid)
    }

    /// Group-shard view: every member group and the unassigned sentinel
    /// mapped to the shards it owns.
    ///
    /// Owners that are not members (left behind by a manual move) appear
    /// under their own id.
    pub fn group_shards(&self) -> BTreeMap<Gid, Vec<usize>> {
        let mut view: BTreeMap<Gid, Vec<usize>> = BTreeMap::new();
        view.insert(UNASSIGNED, Vec::new());
        for &gid in self.groups.keys() {
            view.insert(gid, Vec::new());
        }
        for (shard, &gid) in self.shards.iter().enumerate() {
            view.entry(gid).or_default().push(shard);
        }
        view
    }

    /// Number of shards owned by the unassigned sentinel
    pub fn unassigned_count(&self) -> usize {
        self.shards.iter().filter(|&&gid| gid == UNASSIGNED).count()
    }

    /// Check the balance and drain invariants.
    ///
    /// With no groups every shard must be unassigned. Otherwise every shard
    /// must be owned by a member group and member shard counts may differ by
    /// at most one.
    pub fn is_balanced(&self) -> bool {
        if self.groups.is_empty() {
            return self.unassigned_count() == N_SHARDS;
        }
        if self.shards.iter().any(|gid| !self.groups.contains_key(gid)) {
            return false;
        }

        let counts = self.shard_counts();
        let max = counts.values().copied().max().unwrap_or(0);
        let min = counts.values().copied().min().unwrap_or(0);
        max - min <= 1
    }

    /// Shard counts per member group, in gid order
    pub fn shard_counts(&self) -> BTreeMap<Gid, usize> {
        let mut counts: BTreeMap<Gid, usize> = self.groups.keys().map(|&gid| (gid, 0)).collect();
        for gid in &self.shards {
            if let Some(count) = counts.get_mut(gid) {
                *count += 1;
            }
        }
        counts
    }
}
