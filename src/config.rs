use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workflow::{WorkflowPolicy, DEFAULT_ANOMALY_THRESHOLD_MINUTES};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApprovalFlowConfig {
    pub workflow: WorkflowConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Perfect scores given faster than this many minutes raise an anomaly
    pub anomaly_threshold_minutes: i64,
    /// Largest accepted attachment, in bytes
    pub max_attachment_bytes: u64,
    /// Accepted attachment extensions, without the dot
    pub accepted_attachment_types: Vec<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let policy = WorkflowPolicy::default();
        Self {
            anomaly_threshold_minutes: DEFAULT_ANOMALY_THRESHOLD_MINUTES,
            max_attachment_bytes: policy.max_attachment_bytes,
            accepted_attachment_types: policy.accepted_attachment_types,
        }
    }
}

impl WorkflowConfig {
    pub fn policy(&self) -> WorkflowPolicy {
        WorkflowPolicy {
            max_attachment_bytes: self.max_attachment_bytes,
            accepted_attachment_types: self.accepted_attachment_types.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the state snapshot, lock file and session
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".approval-flow".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: true,
        }
    }
}

impl ApprovalFlowConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration files (approval-flow.toml, .approval-flow-rc)
    /// 3. Environment variables (APPROVAL_FLOW_<SECTION>__<KEY>)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        let toml_file = dir.join("approval-flow.toml");
        if toml_file.exists() {
            builder = builder.add_source(File::from(toml_file));
        }

        let rc_file = dir.join(".approval-flow-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("APPROVAL_FLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ApprovalFlowConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

static CONFIG: std::sync::LazyLock<Result<ApprovalFlowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = ApprovalFlowConfig::load_env_file();
        ApprovalFlowConfig::load()
    });

/// Process-wide configuration, loaded on first use
pub fn config() -> Result<&'static ApprovalFlowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ApprovalFlowConfig::default();
        assert_eq!(config.workflow.anomaly_threshold_minutes, 10);
        assert_eq!(config.workflow.max_attachment_bytes, 10 * 1024 * 1024);
        assert_eq!(config.storage.data_dir, ".approval-flow");
        assert_eq!(config.workflow.policy(), WorkflowPolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("approval-flow.toml"),
            "[workflow]\nanomaly_threshold_minutes = 15\n",
        )
        .unwrap();

        let config = ApprovalFlowConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.workflow.anomaly_threshold_minutes, 15);
        assert_eq!(config.workflow.accepted_attachment_types.len(), 5);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_env_overrides_use_double_underscore() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("APPROVAL_FLOW_OBSERVABILITY__LOG_LEVEL", "debug");
        let loaded = ApprovalFlowConfig::load_from(dir.path());
        std::env::remove_var("APPROVAL_FLOW_OBSERVABILITY__LOG_LEVEL");

        let config = loaded.unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.workflow, WorkflowConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut config = ApprovalFlowConfig::default();
        config.observability.json_logs = false;
        config.save_to_file(dir.path().join("approval-flow.toml")).unwrap();

        let loaded = ApprovalFlowConfig::load_from(dir.path()).unwrap();
        assert!(!loaded.observability.json_logs);
    }
}
