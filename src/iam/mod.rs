// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod password;
pub mod sessions;
pub mod store;

pub use sessions::{SessionIdentity, SessionStore};
pub use store::{FileUserStore, UserStore};

use crate::security::RoleCheck;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug)]
pub enum IamError {
    ConfigurationError(String),
    ParseError(String),
    FileError(String),
    HashError(String),
}

impl std::fmt::Display for IamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IamError::ConfigurationError(msg) => write!(f, "IAM configuration error: {}", msg),
            IamError::ParseError(msg) => write!(f, "IAM parse error: {}", msg),
            IamError::FileError(msg) => write!(f, "IAM file error: {}", msg),
            IamError::HashError(msg) => write!(f, "IAM hash error: {}", msg),
        }
    }
}

impl std::error::Error for IamError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == ADMIN_ROLE)
    }
}

pub type UsersData = HashMap<String, User>;

/// On-disk user record; the map key in `users.yaml` is the email.
#[derive(Debug, Deserialize, Serialize)]
pub struct YamlUser {
    pub name: String,
    pub password_hash: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl YamlUser {
    pub fn into_user(self, email: String) -> User {
        User {
            email,
            name: self.name,
            password_hash: self.password_hash,
            roles: self.roles,
        }
    }
}

/// Login verification and role lookups over a `UserStore`. The store is
/// consulted on every call, so role changes on disk take effect without a
/// restart and the session guard never acts on a stale role snapshot.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Returns the user when the credentials verify. A missing user and a
    /// wrong password are indistinguishable to the caller.
    pub fn verify_login(&self, email: &str, password: &str) -> Result<Option<User>, IamError> {
        let users = self.store.load()?;
        let user = match users.get(email) {
            Some(user) => user,
            None => return Ok(None),
        };
        if password::verify_password(password, &user.password_hash) {
            Ok(Some(user.clone()))
        } else {
            Ok(None)
        }
    }

}

#[async_trait]
impl RoleCheck for UserDirectory {
    async fn has_admin_role(&self, user_id: &str) -> bool {
        match self.store.load() {
            Ok(users) => users.get(user_id).map(User::is_admin).unwrap_or(false),
            Err(err) => {
                log::warn!("Role check failed to load users: {}", err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::password::hash_password;
    use crate::iam::store::MemoryUserStore;

    fn directory_with(users: Vec<User>) -> UserDirectory {
        UserDirectory::new(Arc::new(MemoryUserStore::from_users(users)))
    }

    fn admin_user(password: &str) -> User {
        User {
            email: "admin@example.com".to_string(),
            name: "Admin".to_string(),
            password_hash: hash_password(password).expect("hash"),
            roles: vec![ADMIN_ROLE.to_string()],
        }
    }

    #[test]
    fn verify_login_accepts_correct_password() {
        let directory = directory_with(vec![admin_user("hunter2hunter2")]);
        let user = directory
            .verify_login("admin@example.com", "hunter2hunter2")
            .expect("load")
            .expect("user");
        assert!(user.is_admin());
    }

    #[test]
    fn verify_login_rejects_wrong_password() {
        let directory = directory_with(vec![admin_user("hunter2hunter2")]);
        let user = directory
            .verify_login("admin@example.com", "wrong")
            .expect("load");
        assert!(user.is_none());
    }

    #[test]
    fn verify_login_rejects_unknown_user() {
        let directory = directory_with(vec![]);
        let user = directory
            .verify_login("nobody@example.com", "irrelevant")
            .expect("load");
        assert!(user.is_none());
    }

    #[actix_web::test]
    async fn role_check_reflects_store_contents() {
        let directory = directory_with(vec![
            admin_user("hunter2hunter2"),
            User {
                email: "customer@example.com".to_string(),
                name: "Customer".to_string(),
                password_hash: hash_password("pass-pass-pass").expect("hash"),
                roles: vec![],
            },
        ]);

        assert!(directory.has_admin_role("admin@example.com").await);
        assert!(!directory.has_admin_role("customer@example.com").await);
        assert!(!directory.has_admin_role("ghost@example.com").await);
    }
}
