//! Node runtime configuration for **Obscura** core.
//!
//! Unlike a PoW difficulty target, difficulty here is entirely derived
//! from chain length ([`crate::block::next_difficulty`]); there is
//! nothing to tune. [`Config`] instead centralises the knobs the node
//! actually needs at startup: where the relay lives, which channel to
//! subscribe to, and the mining batch thresholds. Built via the fluent
//! [`ConfigBuilder`], mirroring the reference crate's builder pattern.
//!
//! ```
//! use obscura_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.min_batch_size, 2);
//! ```

use serde::{Deserialize, Serialize};

/// Runtime configuration for a single node process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Relay server hostname or IP.
    pub relay_host: String,

    /// Relay server TCP port.
    pub relay_port: u16,

    /// Pub/sub channel this node subscribes to and publishes on.
    pub channel: String,

    /// Minimum number of pending pairs before the mining worker will
    /// attempt `gen_block` (spec.md §6: fixed at 2).
    pub min_batch_size: usize,

    /// Per-block transaction cap passed to `gen_block` by the mining
    /// worker (spec.md §6: fixed at 10 by default). Lowering it is mostly
    /// useful for tests that want smaller blocks without waiting on a
    /// larger batch.
    pub block_max_txns: usize,

    /// Bounded capacity of the ingress-to-miner transaction-pair queue.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_host: "127.0.0.1".into(),
            relay_port: 9000,
            channel: "obscura".into(),
            min_batch_size: 2,
            block_max_txns: crate::block::BLOCK_MAX_TXNS,
            queue_capacity: 256,
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self {
            inner: Config::default(),
        }
    }

    pub fn relay_host<S: Into<String>>(mut self, host: S) -> Self {
        self.inner.relay_host = host.into();
        self
    }

    pub fn relay_port(mut self, port: u16) -> Self {
        self.inner.relay_port = port;
        self
    }

    pub fn channel<S: Into<String>>(mut self, channel: S) -> Self {
        self.inner.channel = channel.into();
        self
    }

    pub fn min_batch_size(mut self, size: usize) -> Self {
        self.inner.min_batch_size = size;
        self
    }

    pub fn block_max_txns(mut self, n: usize) -> Self {
        self.inner.block_max_txns = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.inner.queue_capacity = n;
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
