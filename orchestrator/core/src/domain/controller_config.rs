// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

// Controller Configuration Types
//
// Defines the configuration schema for the NAS reconciliation controller:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Desired-state store location
// - Remote shell settings
// - Managed service paths on hosts
// - Reconciler schedules
// - Observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::schedule::parse_schedule;

pub const API_VERSION: &str = "nas.io/v1";
pub const KIND: &str = "ControllerConfig";

/// Top-level controller configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfigManifest {
    /// API version (must be "nas.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ControllerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: ControllerConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigSpec {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the desired state
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_user")]
    pub user: String,

    /// Every `id_*` private key in this directory is offered
    #[serde(default = "default_identity_dir")]
    pub identity_dir: PathBuf,

    #[serde(default = "default_ssh_port")]
    pub default_port: u16,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Per-call deadline; unset means wait for the transport
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<Duration>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            identity_dir: default_identity_dir(),
            default_port: default_ssh_port(),
            connect_timeout: default_connect_timeout(),
            command_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_mount_root")]
    pub mount_root: String,

    #[serde(default = "default_share_config_path")]
    pub share_config_path: String,

    #[serde(default = "default_export_config_path")]
    pub export_config_path: String,

    #[serde(default = "default_export_service_unit")]
    pub export_service_unit: String,

    /// Local account whose uid/gid become the export anonymous ids
    #[serde(default = "default_anonymous_account")]
    pub anonymous_account: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            mount_root: default_mount_root(),
            share_config_path: default_share_config_path(),
            export_config_path: default_export_config_path(),
            export_service_unit: default_export_service_unit(),
            anonymous_account: default_anonymous_account(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_every_15s")]
    pub mount_points: String,

    #[serde(default = "default_every_15s")]
    pub share_users: String,

    #[serde(default = "default_every_15s")]
    pub shares: String,

    #[serde(default = "default_every_30s")]
    pub exports: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mount_points: default_every_15s(),
            share_users: default_every_15s(),
            shares: default_every_15s(),
            exports: default_every_30s(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./.nas/nas.db")
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_identity_dir() -> PathBuf {
    PathBuf::from("/root/.ssh")
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_mount_root() -> String {
    "/mnt".to_string()
}

fn default_share_config_path() -> String {
    "/etc/samba/smb.conf".to_string()
}

fn default_export_config_path() -> String {
    "/etc/ganesha/ganesha.conf".to_string()
}

fn default_export_service_unit() -> String {
    "nfs-ganesha".to_string()
}

fn default_anonymous_account() -> String {
    "flute".to_string()
}

fn default_every_15s() -> String {
    "@every 15s".to_string()
}

fn default_every_30s() -> String {
    "@every 30s".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ControllerConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "nas-controller".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: ControllerConfigSpec::default(),
        }
    }
}

impl ControllerConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. NAS_CONFIG_PATH environment variable
    /// 2. ./nas-config.yaml (working directory)
    /// 3. ~/.nas/config.yaml (user home)
    /// 4. /etc/nas/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("NAS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./nas-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".nas").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/nas/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NAS_DATABASE_PATH") {
            if !val.trim().is_empty() {
                tracing::info!("Environment override: NAS_DATABASE_PATH={}", val);
                self.spec.database.path = PathBuf::from(val);
            }
        }

        if let Ok(val) = std::env::var("NAS_SSH_USER") {
            if !val.trim().is_empty() {
                tracing::info!("Environment override: NAS_SSH_USER={}", val);
                self.spec.ssh.user = val;
            }
        }

        if let Ok(val) = std::env::var("NAS_MOUNT_ROOT") {
            if !val.trim().is_empty() {
                tracing::info!("Environment override: NAS_MOUNT_ROOT={}", val);
                self.spec.services.mount_root = val;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.trim().is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.database.path.as_os_str().is_empty() {
            anyhow::bail!("spec.database.path cannot be empty");
        }

        if self.spec.ssh.user.trim().is_empty() {
            anyhow::bail!("spec.ssh.user cannot be empty");
        }

        let services = &self.spec.services;
        for (field, value) in [
            ("mount_root", &services.mount_root),
            ("share_config_path", &services.share_config_path),
            ("export_config_path", &services.export_config_path),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("spec.services.{} cannot be empty", field);
            }
            if !value.starts_with('/') {
                anyhow::bail!("spec.services.{} must be an absolute path: '{}'", field, value);
            }
        }

        if services.export_service_unit.trim().is_empty() {
            anyhow::bail!("spec.services.export_service_unit cannot be empty");
        }

        let schedule = &self.spec.schedule;
        for (job, expr) in [
            ("mount_points", &schedule.mount_points),
            ("share_users", &schedule.share_users),
            ("shares", &schedule.shares),
            ("exports", &schedule.exports),
        ] {
            parse_schedule(expr)
                .map_err(|e| anyhow::anyhow!("spec.schedule.{}: {}", job, e))?;
        }

        Ok(())
    }

    pub fn logging(&self) -> Option<&LoggingConfig> {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = ControllerConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.services.mount_root, "/mnt");
        assert_eq!(manifest.spec.schedule.exports, "@every 30s");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: nas.io/v1
kind: ControllerConfig
metadata:
  name: nas-01
spec:
  ssh:
    user: admin
    connect_timeout: 5s
    command_timeout: 2m
  services:
    anonymous_account: nobody
"#;
        let manifest = ControllerConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "nas-01");
        assert_eq!(manifest.spec.ssh.user, "admin");
        assert_eq!(manifest.spec.ssh.default_port, 22);
        assert_eq!(manifest.spec.ssh.connect_timeout, Duration::from_secs(5));
        assert_eq!(manifest.spec.ssh.command_timeout, Some(Duration::from_secs(120)));
        assert_eq!(manifest.spec.services.anonymous_account, "nobody");
        assert_eq!(manifest.spec.services.export_config_path, "/etc/ganesha/ganesha.conf");
        assert_eq!(manifest.spec.schedule.shares, "@every 15s");
        assert!(manifest.logging().is_none());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut manifest = ControllerConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.services.mount_root = "mnt".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.services.mount_root = "/mnt".to_string();

        manifest.spec.schedule.exports = "every thirty seconds".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.schedule.exports = "@every 30s".to_string();

        assert!(manifest.validate().is_ok());
    }
}
