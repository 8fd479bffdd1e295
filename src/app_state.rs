// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::sync::Arc;

use crate::audit::SecurityEventLog;
use crate::config::ValidatedConfig;
use crate::csrf::CsrfTokenStore;
use crate::iam::{SessionStore, UserDirectory, UserStore};
use crate::runtime_paths::RuntimePaths;
use crate::security::{
    ActionRateLimiter, AdminSessionGuard, BackstopValidator, InputSanitizer, IntakeValidator,
};

/// Every injected component the handlers touch lives here; none of the
/// security components is reachable through module globals, so tests build
/// as many independent instances as they want.
pub struct AppState {
    pub config: Arc<ValidatedConfig>,
    pub runtime_paths: RuntimePaths,
    pub sanitizer: InputSanitizer,
    pub intake_validator: IntakeValidator,
    pub backstop_validator: BackstopValidator,
    pub rate_limiter: ActionRateLimiter,
    pub sessions: SessionStore,
    pub users: UserDirectory,
    pub csrf_tokens: CsrfTokenStore,
    pub audit: SecurityEventLog,
    pub session_guard: AdminSessionGuard,
}

impl AppState {
    pub fn new(
        config: Arc<ValidatedConfig>,
        runtime_paths: RuntimePaths,
        user_store: Arc<dyn UserStore>,
    ) -> Self {
        let audit = SecurityEventLog::new(runtime_paths.audit_log_file());
        let sessions = SessionStore::new();
        let users = UserDirectory::new(user_store);
        let session_guard = AdminSessionGuard::new(
            config.security.admin_session.clone(),
            Arc::new(users.clone()),
            Arc::new(sessions.clone()),
            audit.clone(),
        );

        Self {
            sanitizer: InputSanitizer::new(),
            intake_validator: IntakeValidator::new(config.uploads.intake.clone()),
            backstop_validator: BackstopValidator::new(config.uploads.backstop.clone()),
            rate_limiter: ActionRateLimiter::new(),
            sessions,
            users,
            csrf_tokens: CsrfTokenStore::new(),
            audit,
            session_guard,
            config,
            runtime_paths,
        }
    }
}
