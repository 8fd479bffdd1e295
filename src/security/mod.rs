// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod forms;
mod limiter;
mod sanitize;
mod session_guard;
mod upload_backstop;
mod upload_intake;

pub use forms::{
    FieldKind, FieldRule, FormValidationResult, MAX_EMAIL_CHARS, REQUIRED_FIELD_ERROR,
    validate_email_field, validate_form,
};
pub use limiter::ActionRateLimiter;
pub use sanitize::{DANGEROUS_CONTENT_ERROR, InputSanitizer, SanitizeOptions, ValidationResult};
pub use session_guard::{
    AdminSessionGuard, CountdownState, GuardError, GuardPhase, GuardStatus, GuardTransition,
    RoleCheck, SignOut,
};
pub use upload_backstop::{BackstopValidator, detect_mime_type};
pub use upload_intake::IntakeValidator;

use serde::Serialize;

/// Shared result shape of the two upload validators. The intake and
/// backstop validators are intentionally independent implementations that
/// only agree on this contract; the backstop never consumes an intake
/// result.
#[derive(Debug, Clone, Serialize)]
pub struct FileValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub file_info: FileInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub declared_type: String,
    /// Client-reported modification time, milliseconds since the epoch.
    pub last_modified: Option<i64>,
}
