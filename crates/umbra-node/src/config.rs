//! Node configuration.
//!
//! [`NodeConfig`] carries defaults for the data directory, forging, and
//! logging. [`NodeConfig::load`] layers an optional TOML file and
//! `UMBRA_`-prefixed environment variables over the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("umbra")
}

/// Configuration for a full node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for persistent data.
    pub data_dir: PathBuf,
    /// Whether to run the forging loop.
    pub forge: bool,
    /// Milliseconds between forging attempts.
    pub forge_interval_ms: u64,
    /// Base multiplier for the stake eligibility target. A larger base
    /// makes any given stake win more often.
    pub stake_target_base: u64,
    /// Delegated-staking fee claimed per forged block, in umbrals.
    pub staking_fee: u64,
    /// Log level filter string (e.g. "info", "umbra_core=debug").
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            forge: false,
            forge_interval_ms: 500,
            stake_target_base: 1 << 20,
            staking_fee: 0,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl NodeConfig {
    /// Load configuration: defaults, overlaid by the file at `path` (if
    /// any), overlaid by `UMBRA_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("UMBRA"));
        builder.build()?.try_deserialize()
    }

    pub fn forge_interval(&self) -> Duration {
        Duration::from_millis(self.forge_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_data_dir_ends_with_umbra() {
        let cfg = NodeConfig::default();
        assert!(
            cfg.data_dir.ends_with("umbra"),
            "data_dir should end with 'umbra': {:?}",
            cfg.data_dir
        );
    }

    #[test]
    fn defaults_do_not_forge() {
        let cfg = NodeConfig::default();
        assert!(!cfg.forge);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn load_without_file_gives_defaults() {
        let cfg = NodeConfig::load(None).unwrap();
        assert_eq!(cfg.forge_interval_ms, NodeConfig::default().forge_interval_ms);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "forge = true\nforge_interval_ms = 100").unwrap();

        let cfg = NodeConfig::load(Some(&path)).unwrap();
        assert!(cfg.forge);
        assert_eq!(cfg.forge_interval(), Duration::from_millis(100));
        // Untouched fields keep their defaults.
        assert_eq!(cfg.staking_fee, 0);
    }
}
