// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{current_session, rate_limited_response};
use crate::app_state::AppState;
use crate::audit::{SecurityEventKind, Severity};
use crate::security::{FileInfo, detect_mime_type};
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpRequest, HttpResponse, web};
use log::{error, info};
use std::path::Path;
use std::time::Duration;

const LAST_MODIFIED_HEADER: &str = "x-last-modified";

/// Upload pipeline: intake validation over the declared metadata plus the
/// magic-byte check, then the independent backstop over the received bytes.
/// The backstop result decides; intake exists to fail fast and to shape the
/// error the customer sees.
pub async fn upload_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let identity = match current_session(&req, &state).await {
        Some(identity) => identity,
        None => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "code": "authentication_required",
                "error": "Sign in to upload files",
            }));
        }
    };

    let limit = &state.config.security.upload_limit;
    let key = format!("upload_{}", identity.email);
    if !state
        .rate_limiter
        .allow(&key, limit.max_requests, Duration::from_secs(limit.window_seconds))
        .await
    {
        state.audit.record(
            SecurityEventKind::RateLimitExceeded,
            serde_json::json!({ "key": key }),
            Severity::Medium,
        );
        return rate_limited_response();
    }

    let file_name = path.into_inner();
    let declared_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let last_modified = req
        .headers()
        .get(LAST_MODIFIED_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());

    let info = FileInfo {
        name: file_name.clone(),
        size: body.len() as u64,
        declared_type: declared_type.clone(),
        last_modified,
    };

    let intake = state.intake_validator.validate(&info);
    let mut errors = intake.errors;
    let mut warnings = intake.warnings;

    let mut head: &[u8] = &body;
    let signature_ok = state
        .intake_validator
        .check_signature_reader(&declared_type, &mut head)
        .await
        .unwrap_or(false);
    if !signature_ok {
        errors.push("File content does not match its declared type".to_string());
    }

    if !errors.is_empty() {
        reject(&state, &identity.email, &info, &body, &errors);
        return HttpResponse::UnprocessableEntity().json(serde_json::json!({
            "code": "validation_failed",
            "errors": errors,
            "warnings": warnings,
        }));
    }

    // Authoritative pass over the bytes actually received. Runs even though
    // intake just passed: the backstop trusts nothing from the first check.
    let backstop = state.backstop_validator.validate(&info, &body);
    if !backstop.is_valid {
        reject(&state, &identity.email, &info, &body, &backstop.errors);
        return HttpResponse::UnprocessableEntity().json(serde_json::json!({
            "code": "validation_failed",
            "errors": backstop.errors,
            "warnings": backstop.warnings,
        }));
    }
    for warning in backstop.warnings {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }

    // Both validators reject path separators, so this is only a guard
    // against surprising percent-decoding in the route parameter.
    let safe_name = match Path::new(&file_name).file_name() {
        Some(safe_name) => safe_name.to_owned(),
        None => {
            return HttpResponse::UnprocessableEntity().json(serde_json::json!({
                "code": "validation_failed",
                "errors": ["File name is not usable"],
                "warnings": warnings,
            }));
        }
    };

    let target = state.runtime_paths.uploads_dir.join(safe_name);
    if let Err(err) = std::fs::write(&target, &body) {
        error!("Failed to store upload {}: {}", target.display(), err);
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "code": "storage_failed",
            "error": "The upload could not be stored",
        }));
    }

    info!(
        "Stored upload {} ({} bytes) for {}",
        file_name,
        body.len(),
        identity.email
    );

    HttpResponse::Created().json(serde_json::json!({
        "status": "stored",
        "file": backstop.file_info,
        "warnings": warnings,
    }))
}

fn reject(state: &AppState, email: &str, info: &FileInfo, body: &[u8], errors: &[String]) {
    state.audit.record(
        SecurityEventKind::FileValidationFailed,
        serde_json::json!({
            "user": email,
            "name": info.name,
            "declared_type": info.declared_type,
            "detected_type": detect_mime_type(&info.name, body),
            "errors": errors,
        }),
        Severity::Medium,
    );
}
