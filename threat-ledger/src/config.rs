//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Log output format
    pub log_format: LogFormat,

    /// Proof-of-work and block assembly
    pub sealing: SealingConfig,

    /// Artifact persistence
    pub storage: StorageConfig,

    /// Async front end
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "threat-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_format: LogFormat::Pretty,
            sealing: SealingConfig::default(),
            storage: StorageConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// Log output format for the server binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    Pretty,
    /// One JSON object per line
    Json,
}

/// Sealing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SealingConfig {
    /// Leading zero hex characters required of a block digest
    pub difficulty: usize,

    /// Pool size that triggers an automatic seal
    pub seal_trigger: usize,

    /// Upper bound on a single nonce search (milliseconds); unbounded if unset
    pub seal_timeout_ms: Option<u64>,

    /// Payee of the per-block reward transaction
    pub reward_payee: String,

    /// Amount of the per-block reward transaction
    pub reward_amount: u64,
}

impl Default for SealingConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            seal_trigger: 5,
            seal_timeout_ms: None,
            reward_payee: "threat-ledger".to_string(),
            reward_amount: 1,
        }
    }
}

impl SealingConfig {
    /// Seal timeout as a duration
    pub fn seal_timeout(&self) -> Option<Duration> {
        self.seal_timeout_ms.map(Duration::from_millis)
    }
}

/// What to do when the persisted artifact cannot be reconstructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMode {
    /// Log and start again from a genesis-only chain
    Genesis,
    /// Refuse to open the ledger
    Strict,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persist the chain after every seal
    pub enabled: bool,

    /// Path of the JSON artifact
    pub path: PathBuf,

    /// Recovery behaviour for malformed artifacts
    pub recovery: RecoveryMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/ledger.json"),
            recovery: RecoveryMode::Genesis,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(path) = std::env::var("THREAT_LEDGER_PATH") {
            config.storage.path = PathBuf::from(path);
        }

        if let Ok(difficulty) = std::env::var("THREAT_LEDGER_DIFFICULTY") {
            config.sealing.difficulty = parse_env("THREAT_LEDGER_DIFFICULTY", &difficulty)?;
        }

        if let Ok(trigger) = std::env::var("THREAT_LEDGER_SEAL_TRIGGER") {
            config.sealing.seal_trigger = parse_env("THREAT_LEDGER_SEAL_TRIGGER", &trigger)?;
        }

        if let Ok(timeout) = std::env::var("THREAT_LEDGER_SEAL_TIMEOUT_MS") {
            config.sealing.seal_timeout_ms =
                Some(parse_env("THREAT_LEDGER_SEAL_TIMEOUT_MS", &timeout)?);
        }

        if let Ok(recovery) = std::env::var("THREAT_LEDGER_RECOVERY") {
            config.storage.recovery = match recovery.as_str() {
                "genesis" => RecoveryMode::Genesis,
                "strict" => RecoveryMode::Strict,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown recovery mode: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(format) = std::env::var("THREAT_LEDGER_LOG_FORMAT") {
            config.log_format = if format == "json" {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        // a sha256 hex digest has 64 characters
        if self.sealing.difficulty > 64 {
            return Err(crate::Error::Config(format!(
                "difficulty {} exceeds digest length",
                self.sealing.difficulty
            )));
        }

        if self.sealing.seal_trigger == 0 {
            return Err(crate::Error::Config(
                "seal_trigger must be at least 1".to_string(),
            ));
        }

        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::Config(format!("Invalid value for {}: {}", name, value)))
}
