// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{client_key, rate_limited_response};
use crate::app_state::AppState;
use crate::audit::{SecurityEventKind, Severity};
use crate::security::{DANGEROUS_CONTENT_ERROR, FieldRule, validate_form};
use actix_web::{HttpRequest, HttpResponse, web};
use log::error;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

const MAX_NAME_CHARS: usize = 256;
const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct InquiryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

/// Public contact form. Every field is sanitized and validated as a set so
/// the customer sees all problems at once; what gets stored is always the
/// sanitized text, even for submissions that were rejected elsewhere.
pub async fn submit_inquiry(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<InquiryRequest>,
) -> HttpResponse {
    let limit = &state.config.security.inquiry_limit;
    let key = format!("inquiry_{}", client_key(&req, &state.config));
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

    let mut fields = HashMap::new();
    fields.insert("name".to_string(), payload.name.clone());
    fields.insert("email".to_string(), payload.email.clone());
    fields.insert("message".to_string(), payload.message.clone());

    let rules = [
        ("name", FieldRule::text(true, Some(MAX_NAME_CHARS))),
        ("email", FieldRule::email(true)),
        ("message", FieldRule::text(true, Some(MAX_MESSAGE_CHARS))),
    ];

    let result = validate_form(&state.sanitizer, &fields, &rules);

    let dangerous_fields: Vec<&String> = result
        .errors
        .iter()
        .filter(|(_, errors)| errors.iter().any(|e| e == DANGEROUS_CONTENT_ERROR))
        .map(|(field, _)| field)
        .collect();
    if !dangerous_fields.is_empty() {
        state.audit.record(
            SecurityEventKind::XssAttemptBlocked,
            serde_json::json!({
                "form": "inquiry",
                "fields": dangerous_fields,
            }),
            Severity::High,
        );
    }

    if !result.is_valid {
        return HttpResponse::UnprocessableEntity().json(serde_json::json!({
            "code": "validation_failed",
            "errors": result.errors,
        }));
    }

    let record = serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339(),
        "name": result.sanitized_data["name"],
        "email": result.sanitized_data["email"],
        "message": result.sanitized_data["message"],
    });
    if let Err(err) = append_inquiry(&state, &record) {
        error!("Failed to store inquiry: {}", err);
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "code": "storage_failed",
            "error": "The inquiry could not be stored",
        }));
    }

    HttpResponse::Created().json(serde_json::json!({ "status": "received" }))
}

fn append_inquiry(state: &AppState, record: &serde_json::Value) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(state.runtime_paths.inquiries_file())?;
    writeln!(file, "{}", record)
}
