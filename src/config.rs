// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum ConfigError {
    LoadError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::LoadError(msg) => write!(f, "Configuration load error: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    pub app: AppConfig,
}

/// Post-validation view of the configuration. Construction goes through
/// `Config::validate`, so holders can rely on the bounds checked there.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub uploads: UploadsConfig,
    pub app: AppConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    #[serde(default = "default_use_forwarded_for")]
    pub use_forwarded_for: bool,
    #[serde(default = "default_login_limit")]
    pub login_limit: ActionLimitConfig,
    #[serde(default = "default_inquiry_limit")]
    pub inquiry_limit: ActionLimitConfig,
    #[serde(default = "default_upload_limit")]
    pub upload_limit: ActionLimitConfig,
    #[serde(default)]
    pub admin_session: AdminSessionConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            use_forwarded_for: default_use_forwarded_for(),
            login_limit: default_login_limit(),
            inquiry_limit: default_inquiry_limit(),
            upload_limit: default_upload_limit(),
            admin_session: AdminSessionConfig::default(),
        }
    }
}

fn default_use_forwarded_for() -> bool {
    false
}

/// One fixed-window throttle: `max_requests` per `window_seconds`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ActionLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

fn default_login_limit() -> ActionLimitConfig {
    ActionLimitConfig {
        max_requests: 5,
        window_seconds: 300,
    }
}

fn default_inquiry_limit() -> ActionLimitConfig {
    ActionLimitConfig {
        max_requests: 10,
        window_seconds: 600,
    }
}

fn default_upload_limit() -> ActionLimitConfig {
    ActionLimitConfig {
        max_requests: 30,
        window_seconds: 3600,
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdminSessionConfig {
    #[serde(default = "default_admin_timeout_minutes")]
    pub timeout_minutes: u64,
    #[serde(default = "default_admin_warning_seconds")]
    pub warning_seconds: u64,
}

impl Default for AdminSessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_admin_timeout_minutes(),
            warning_seconds: default_admin_warning_seconds(),
        }
    }
}

impl AdminSessionConfig {
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_minutes * 60
    }
}

fn default_admin_timeout_minutes() -> u64 {
    30
}

fn default_admin_warning_seconds() -> u64 {
    300
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UploadsConfig {
    #[serde(default)]
    pub intake: IntakeUploadConfig,
    #[serde(default)]
    pub backstop: BackstopUploadConfig,
}

/// Thresholds for the customer-facing intake check. Deliberately more
/// permissive than the backstop: it runs before compression guidance and
/// exists for early feedback, not enforcement.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IntakeUploadConfig {
    #[serde(default = "default_intake_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_intake_warn_file_size_mb")]
    pub warn_file_size_mb: u64,
    #[serde(default = "default_min_file_size_bytes")]
    pub min_file_size_bytes: u64,
}

impl Default for IntakeUploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_intake_max_file_size_mb(),
            warn_file_size_mb: default_intake_warn_file_size_mb(),
            min_file_size_bytes: default_min_file_size_bytes(),
        }
    }
}

fn default_intake_max_file_size_mb() -> u64 {
    100
}

fn default_intake_warn_file_size_mb() -> u64 {
    50
}

fn default_min_file_size_bytes() -> u64 {
    1024
}

/// Thresholds for the authoritative backstop check that runs on the stored
/// bytes. Stricter than intake on purpose; the two sets of limits are kept
/// separate in the config so neither side drifts with the other.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackstopUploadConfig {
    #[serde(default = "default_backstop_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_min_file_size_bytes")]
    pub min_file_size_bytes: u64,
    #[serde(default = "default_backstop_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for BackstopUploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_backstop_max_file_size_mb(),
            min_file_size_bytes: default_min_file_size_bytes(),
            allowed_extensions: default_backstop_allowed_extensions(),
        }
    }
}

fn default_backstop_max_file_size_mb() -> u64 {
    50
}

fn default_backstop_allowed_extensions() -> Vec<String> {
    [
        // Standard images
        "jpg", "jpeg", "png", "gif", "webp", "tif", "tiff", "bmp", "heic", "heif",
        // Camera raw formats delivered by photographers
        "cr2", "cr3", "nef", "arw", "dng", "raf", "orf", "rw2",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            ConfigError::LoadError(format!("Failed to parse '{}': {}", path.display(), e))
        })
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.host must not be empty".to_string(),
            ));
        }
        if self.server.workers == 0 {
            return Err(ConfigError::ValidationError(
                "server.workers must be at least 1".to_string(),
            ));
        }
        if self.app.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "app.name must not be empty".to_string(),
            ));
        }

        for (label, limit) in [
            ("security.login_limit", &self.security.login_limit),
            ("security.inquiry_limit", &self.security.inquiry_limit),
            ("security.upload_limit", &self.security.upload_limit),
        ] {
            if limit.max_requests == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{}.max_requests must be at least 1",
                    label
                )));
            }
            if limit.window_seconds == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{}.window_seconds must be at least 1",
                    label
                )));
            }
        }

        let admin_session = &self.security.admin_session;
        if admin_session.timeout_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "security.admin_session.timeout_minutes must be at least 1".to_string(),
            ));
        }
        if admin_session.warning_seconds >= admin_session.timeout_seconds() {
            return Err(ConfigError::ValidationError(
                "security.admin_session.warning_seconds must be shorter than the timeout"
                    .to_string(),
            ));
        }

        if self.uploads.intake.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "uploads.intake.max_file_size_mb must be at least 1".to_string(),
            ));
        }
        if self.uploads.backstop.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "uploads.backstop.max_file_size_mb must be at least 1".to_string(),
            ));
        }
        if self.uploads.backstop.allowed_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "uploads.backstop.allowed_extensions must not be empty".to_string(),
            ));
        }

        Ok(ValidatedConfig {
            server: self.server,
            logging: self.logging,
            security: self.security,
            uploads: self.uploads,
            app: self.app,
        })
    }
}

/// Loads `config.yaml` from the runtime root, writing a commented default
/// file first when none exists. Returns the validated config and whether a
/// file had to be created.
pub fn load_or_create(config_file: &Path) -> Result<(ValidatedConfig, bool), ConfigError> {
    let created = if config_file.exists() {
        false
    } else {
        fs::write(config_file, default_config_yaml()).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to create '{}': {}",
                config_file.display(),
                e
            ))
        })?;
        info!("created default config at {}", config_file.display());
        true
    };

    let config = Config::load(config_file)?.validate()?;
    Ok((config, created))
}

fn default_config_yaml() -> String {
    r#"# ImmoShot portal server configuration
server:
  host: 127.0.0.1
  port: 7180
  workers: 4

logging:
  level: info

app:
  name: ImmoShot
  description: Real-estate photo editing portal

security:
  # Trust X-Forwarded-For / X-Real-IP when running behind a reverse proxy.
  use_forwarded_for: false
  login_limit:
    max_requests: 5
    window_seconds: 300
  inquiry_limit:
    max_requests: 10
    window_seconds: 600
  upload_limit:
    max_requests: 30
    window_seconds: 3600
  admin_session:
    timeout_minutes: 30
    warning_seconds: 300

uploads:
  intake:
    max_file_size_mb: 100
    warn_file_size_mb: 50
    min_file_size_bytes: 1024
  backstop:
    max_file_size_mb: 50
    min_file_size_bytes: 1024
"#
    .to_string()
}
