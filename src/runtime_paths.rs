// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RuntimePaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub users_file: PathBuf,
    pub uploads_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl RuntimePaths {
    pub fn from_root(root: &Path) -> Result<Self, ConfigError> {
        let root_path = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root.to_path_buf()
        };

        if !root_path.exists() {
            fs::create_dir_all(&root_path).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "Failed to create runtime root '{}': {}",
                    root_path.display(),
                    e
                ))
            })?;
        }

        let root_canonical = root_path.canonicalize().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to canonicalize runtime root '{}': {}",
                root_path.display(),
                e
            ))
        })?;

        let config_file = root_canonical.join("config.yaml");
        let users_file = root_canonical.join("users.yaml");

        let uploads_dir = root_canonical.join("uploads");
        let state_dir = root_canonical.join("state");
        ensure_dir_exists(&uploads_dir)?;
        ensure_dir_exists(&state_dir)?;

        let uploads_dir = uploads_dir.canonicalize().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to canonicalize uploads directory '{}': {}",
                uploads_dir.display(),
                e
            ))
        })?;
        let state_dir = state_dir.canonicalize().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to canonicalize state directory '{}': {}",
                state_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            root: root_canonical,
            config_file,
            users_file,
            uploads_dir,
            state_dir,
        })
    }

    pub fn audit_log_file(&self) -> PathBuf {
        self.state_dir.join("audit.log")
    }

    pub fn inquiries_file(&self) -> PathBuf {
        self.state_dir.join("inquiries.jsonl")
    }
}

fn ensure_dir_exists(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to create directory '{}': {}",
                path.display(),
                e
            ))
        })?;
    }

    ensure_dir_writable(path, "Directory must be writable")
}

fn ensure_dir_writable(path: &Path, context: &str) -> Result<(), ConfigError> {
    if !path.is_dir() {
        return Err(ConfigError::ValidationError(format!(
            "{} (not a directory): {}",
            context,
            path.display()
        )));
    }

    let probe_name = format!(".immoshot-write-check-{}", Uuid::new_v4());
    let probe_path = path.join(probe_name);

    let probe_result = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe_path);

    match probe_result {
        Ok(_) => {
            if let Err(err) = fs::remove_file(&probe_path) {
                return Err(ConfigError::ValidationError(format!(
                    "{} (unable to clean probe file {}): {}",
                    context,
                    probe_path.display(),
                    err
                )));
            }
            Ok(())
        }
        Err(err) => Err(ConfigError::ValidationError(format!(
            "{} ({}): {}",
            context,
            path.display(),
            err
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_root_creates_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RuntimePaths::from_root(temp.path()).expect("paths");

        assert!(paths.uploads_dir.is_dir());
        assert!(paths.state_dir.is_dir());
        assert!(paths.config_file.ends_with("config.yaml"));
        assert!(paths.users_file.ends_with("users.yaml"));
        assert!(paths.audit_log_file().ends_with("audit.log"));
    }

    #[test]
    fn from_root_creates_missing_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let nested = temp.path().join("runtime").join("nested");
        let paths = RuntimePaths::from_root(&nested).expect("paths");
        assert!(paths.root.is_dir());
    }
}
