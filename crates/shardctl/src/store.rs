//! Configuration history
//!
//! Append-only, numbered sequence of [`Config`] snapshots. Entries are never
//! handed out by reference: every read returns an owned copy so that callers
//! cannot observe or cause later mutation of a committed configuration.

use crate::config::{Config, ConfigId};

/// Append-only configuration history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    configs: Vec<Config>,
}

impl ConfigStore {
    /// Create a history holding only the initial configuration
    pub fn new() -> Self {
        Self {
            configs: vec![Config::initial()],
        }
    }

    /// Number of configurations recorded
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Always false: the initial configuration is never removed
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Number the next appended configuration will carry
    pub fn next_num(&self) -> ConfigId {
        self.configs.len() as ConfigId
    }

    /// Copy of the latest configuration
    pub fn latest(&self) -> Config {
        self.latest_ref().clone()
    }

    /// Copy of configuration `num`, or of the latest one if `num` is
    /// negative or past the end of the history.
    pub fn get(&self, num: i64) -> Config {
        usize::try_from(num)
            .ok()
            .and_then(|idx| self.configs.get(idx))
            .unwrap_or_else(|| self.latest_ref())
            .clone()
    }

    /// Start the next configuration as a copy of the latest one
    pub fn draft(&self) -> Config {
        self.latest_ref().successor(self.next_num())
    }

    /// Append a configuration under [`next_num`](Self::next_num) and return
    /// the number it was recorded as.
    ///
    /// Whatever number the configuration carries is overwritten, so a
    /// configuration's `num` always equals its position in the history.
    pub fn commit(&mut self, mut config: Config) -> ConfigId {
        let num = self.next_num();
        config.num = num;
        self.configs.push(config);
        num
    }

    /// Copies of every configuration, oldest first
    pub fn snapshot(&self) -> Vec<Config> {
        self.configs.clone()
    }

    fn latest_ref(&self) -> &Config {
        // The initial configuration is pushed in `new` and never removed.
        &self.configs[self.configs.len() - 1]
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
