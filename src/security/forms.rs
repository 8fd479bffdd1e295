// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::sanitize::{InputSanitizer, SanitizeOptions};
use std::collections::HashMap;
use validator::ValidateEmail;

/// Verbatim copy of the message the customer frontend renders for missing
/// required fields.
pub const REQUIRED_FIELD_ERROR: &str = "Dieses Feld ist erforderlich";

pub const MAX_EMAIL_CHARS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub required: bool,
    pub kind: FieldKind,
    pub options: SanitizeOptions,
}

impl FieldRule {
    pub fn text(required: bool, max_length: Option<usize>) -> Self {
        Self {
            required,
            kind: FieldKind::Text,
            options: SanitizeOptions {
                max_length,
                ..SanitizeOptions::default()
            },
        }
    }

    pub fn email(required: bool) -> Self {
        Self {
            required,
            kind: FieldKind::Email,
            options: SanitizeOptions {
                max_length: Some(MAX_EMAIL_CHARS),
                ..SanitizeOptions::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormValidationResult {
    pub is_valid: bool,
    pub sanitized_data: HashMap<String, String>,
    pub errors: HashMap<String, Vec<String>>,
}

/// Validate user email input
pub fn validate_email_field(email: &str) -> Result<(), String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err("Email is required".to_string());
    }
    if trimmed.chars().count() > MAX_EMAIL_CHARS {
        return Err(format!(
            "Email must be at most {} characters",
            MAX_EMAIL_CHARS
        ));
    }
    if !trimmed.validate_email() {
        return Err("Email format is invalid".to_string());
    }
    Ok(())
}

/// Applies the sanitizer to every field of a form. Never stops at the first
/// failing field: every field comes back sanitized and every error is
/// collected, so the caller can render the full set at once.
pub fn validate_form(
    sanitizer: &InputSanitizer,
    fields: &HashMap<String, String>,
    rules: &[(&str, FieldRule)],
) -> FormValidationResult {
    let mut sanitized_data = HashMap::new();
    let mut errors: HashMap<String, Vec<String>> = HashMap::new();

    for (name, rule) in rules {
        let value = fields.get(*name).map(String::as_str).unwrap_or("");
        let mut field_errors = Vec::new();

        if rule.required && value.trim().is_empty() {
            field_errors.push(REQUIRED_FIELD_ERROR.to_string());
        }

        let result = sanitizer.sanitize(value, &rule.options);
        field_errors.extend(result.errors);

        if rule.kind == FieldKind::Email
            && !value.trim().is_empty()
            && let Err(message) = validate_email_field(value)
        {
            field_errors.push(message);
        }

        sanitized_data.insert(name.to_string(), result.sanitized_text);
        if !field_errors.is_empty() {
            errors.insert(name.to_string(), field_errors);
        }
    }

    FormValidationResult {
        is_valid: errors.is_empty(),
        sanitized_data,
        errors,
    }
}
