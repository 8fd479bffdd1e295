// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use actix_web::body::{BoxBody, EitherBody};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};
use immoshot::api;
use immoshot::app_state::AppState;
use immoshot::config::{
    ActionLimitConfig, AdminSessionConfig, AppConfig, LoggingConfig, SecurityConfig, ServerConfig,
    UploadsConfig, ValidatedConfig,
};
use immoshot::csrf::{CSRF_HEADER_NAME, CsrfValidationMiddlewareFactory};
use immoshot::iam::password::hash_password;
use immoshot::iam::sessions::SESSION_COOKIE_NAME;
use immoshot::iam::store::MemoryUserStore;
use immoshot::iam::{ADMIN_ROLE, User};
use immoshot::runtime_paths::RuntimePaths;
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const CUSTOMER_EMAIL: &str = "customer@example.com";
pub const CUSTOMER_PASSWORD: &str = "customer-password";

pub struct TestHarness {
    pub temp: TempDir,
    pub config: Arc<ValidatedConfig>,
    pub runtime_paths: RuntimePaths,
    pub state: web::Data<AppState>,
}

pub struct AuthSession {
    pub email: String,
    pub cookie: actix_web::cookie::Cookie<'static>,
    pub csrf_token: String,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut ValidatedConfig)) -> Self {
        let temp = TempDir::new().expect("tempdir");
        let runtime_paths = RuntimePaths::from_root(temp.path()).expect("runtime paths");

        let mut config = build_config();
        customize(&mut config);
        let config = Arc::new(config);

        let users = vec![
            User {
                email: ADMIN_EMAIL.to_string(),
                name: "Admin User".to_string(),
                password_hash: hash_password(ADMIN_PASSWORD).expect("hash"),
                roles: vec![ADMIN_ROLE.to_string()],
            },
            User {
                email: CUSTOMER_EMAIL.to_string(),
                name: "Customer User".to_string(),
                password_hash: hash_password(CUSTOMER_PASSWORD).expect("hash"),
                roles: vec![],
            },
        ];
        let store = Arc::new(MemoryUserStore::from_users(users));

        let state = web::Data::new(AppState::new(
            config.clone(),
            runtime_paths.clone(),
            store,
        ));

        Self {
            temp,
            config,
            runtime_paths,
            state,
        }
    }

    /// Issues a session and CSRF token directly through the stores, the way
    /// a successful login would.
    pub async fn auth_session(&self, email: &str, name: &str, is_admin: bool) -> AuthSession {
        let session_id = self
            .state
            .sessions
            .issue(email, name, is_admin)
            .await
            .expect("session");
        let csrf_token = self
            .state
            .csrf_tokens
            .issue(&session_id)
            .await
            .expect("csrf token");
        if is_admin {
            self.state.session_guard.watch(&session_id, email).await;
        }

        AuthSession {
            email: email.to_string(),
            cookie: actix_web::cookie::Cookie::new(SESSION_COOKIE_NAME, session_id),
            csrf_token,
        }
    }

    pub async fn admin_auth(&self) -> AuthSession {
        self.auth_session(ADMIN_EMAIL, "Admin User", true).await
    }

    pub async fn customer_auth(&self) -> AuthSession {
        self.auth_session(CUSTOMER_EMAIL, "Customer User", false)
            .await
    }
}

pub fn build_test_app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<EitherBody<BoxBody>>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state)
        .app_data(web::PayloadConfig::new(110 * 1024 * 1024))
        .wrap(CsrfValidationMiddlewareFactory)
        .configure(api::configure)
}

pub fn add_auth_headers(
    req: actix_web::test::TestRequest,
    session: &AuthSession,
    include_csrf: bool,
) -> actix_web::test::TestRequest {
    let req = req.cookie(session.cookie.clone());
    if include_csrf {
        req.insert_header((CSRF_HEADER_NAME, session.csrf_token.clone()))
    } else {
        req
    }
}

/// Valid JPEG leader padded out to a plausible photo size.
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
    bytes.resize(len, 0x00);
    bytes
}

fn build_config() -> ValidatedConfig {
    ValidatedConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7180,
            workers: 1,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
        security: SecurityConfig {
            use_forwarded_for: false,
            login_limit: ActionLimitConfig {
                max_requests: 5,
                window_seconds: 300,
            },
            inquiry_limit: ActionLimitConfig {
                max_requests: 5,
                window_seconds: 60,
            },
            upload_limit: ActionLimitConfig {
                max_requests: 30,
                window_seconds: 3600,
            },
            admin_session: AdminSessionConfig {
                timeout_minutes: 30,
                warning_seconds: 300,
            },
        },
        uploads: UploadsConfig::default(),
        app: AppConfig {
            name: "ImmoShot".to_string(),
            description: "test".to_string(),
        },
    }
}
