//! Runtime configuration.
//!
//! A small TOML file merged under CLI flags. Defaults match the tuning the
//! protocol was deployed with on a 9600-baud line: generous pacing, a slow
//! poll, a multi-second delay-attack threshold.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::transfer::{BootstrapConfig, ReceiverConfig, SenderConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Nominal block length in bytes, before encryption overhead.
    pub block_size: u32,
    /// Pause between consecutive block sends.
    pub pacing_ms: u64,
    /// Pause between channel polls.
    pub poll_interval_ms: u64,
    /// Delay-attack threshold handed to the channel.
    pub delay_threshold_ms: u32,
    /// Cap on whole-file send attempts; absent means retry until confirmed.
    pub max_attempts: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: 4096,
            pacing_ms: 750,
            poll_interval_ms: 100,
            delay_threshold_ms: 3000,
            max_attempts: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            pacing: Duration::from_millis(self.pacing_ms),
            poll_interval: self.poll_interval(),
            max_attempts: self.max_attempts,
        }
    }

    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            poll_interval: self.poll_interval(),
        }
    }

    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            delay_threshold_ms: self.delay_threshold_ms,
            poll_interval: self.poll_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.pacing_ms, 750);
        assert_eq!(config.delay_threshold_ms, 3000);
        assert!(config.max_attempts.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str("block_size = 512\nmax_attempts = 5\n").unwrap();
        assert_eq!(config.block_size, 512);
        assert_eq!(config.max_attempts, Some(5));
        // untouched keys keep their defaults
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("block_sze = 512\n").is_err());
    }
}
