// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{IamError, User, UsersData, YamlUser, password};
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;

pub trait UserStore: Send + Sync {
    fn load(&self) -> Result<UsersData, IamError>;
}

pub struct FileUserStore {
    users_file: PathBuf,
}

impl FileUserStore {
    pub fn new(users_file: PathBuf) -> Result<Self, IamError> {
        if users_file.as_os_str().is_empty() {
            return Err(IamError::ConfigurationError(
                "Users file path is empty".to_string(),
            ));
        }

        Ok(Self { users_file })
    }

    fn parse_users(content: &str) -> Result<UsersData, IamError> {
        let yaml_users: HashMap<String, YamlUser> = serde_yaml::from_str(content)
            .map_err(|e| IamError::ParseError(format!("Failed to parse users file: {}", e)))?;

        Ok(yaml_users
            .into_iter()
            .map(|(email, yaml_user)| (email.clone(), yaml_user.into_user(email)))
            .collect())
    }
}

impl UserStore for FileUserStore {
    fn load(&self) -> Result<UsersData, IamError> {
        let content = std::fs::read_to_string(&self.users_file)
            .map_err(|e| IamError::FileError(format!("Failed to read users file: {}", e)))?;
        Self::parse_users(&content)
    }
}

/// Creates `users.yaml` with a single admin account when the file is
/// missing. The generated password is printed to stderr exactly once; it is
/// not stored anywhere in clear.
pub fn bootstrap_users_file(users_file: &PathBuf) -> Result<bool, IamError> {
    if users_file.exists() {
        return Ok(false);
    }

    let initial_password = password::generate_initial_password();
    let password_hash = password::hash_password(&initial_password)?;
    let content = format!(
        "# ImmoShot portal users\n\
         admin@example.com:\n\
         \x20\x20name: \"Portal Admin\"\n\
         \x20\x20password_hash: \"{}\"\n\
         \x20\x20roles:\n\
         \x20\x20\x20\x20- \"admin\"\n",
        password_hash
    );

    std::fs::write(users_file, content)
        .map_err(|e| IamError::FileError(format!("Failed to write users file: {}", e)))?;

    eprintln!(
        "[bootstrap] created {} with admin@example.com / {}",
        users_file.display(),
        initial_password
    );
    info!("created default users file at {}", users_file.display());
    Ok(true)
}

pub struct MemoryUserStore {
    users: UsersData,
}

impl MemoryUserStore {
    pub fn new(initial: UsersData) -> Self {
        Self { users: initial }
    }

    pub fn from_users(users: Vec<User>) -> Self {
        let data = users
            .into_iter()
            .map(|user| (user.email.clone(), user))
            .collect();
        Self::new(data)
    }
}

impl UserStore for MemoryUserStore {
    fn load(&self) -> Result<UsersData, IamError> {
        Ok(self.users.clone())
    }
}
