// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{client_key, current_session, rate_limited_response};
use crate::app_state::AppState;
use crate::audit::{SecurityEventKind, Severity};
use crate::iam::SessionIdentity;
use crate::iam::sessions::SESSION_COOKIE_NAME;
use crate::security::{GuardError, GuardStatus};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponse, web};
use log::{error, info};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> HttpResponse {
    let limit = &state.config.security.login_limit;
    let key = format!("login_{}", client_key(&req, &state.config));
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

    let user = match state.users.verify_login(&payload.email, &payload.password) {
        Ok(Some(user)) => user,
        Ok(None) => {
            state.audit.record(
                SecurityEventKind::LoginFailed,
                serde_json::json!({ "email": payload.email }),
                Severity::Medium,
            );
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "code": "invalid_credentials",
                "error": "Invalid email or password",
            }));
        }
        Err(err) => {
            error!("Login failed to consult user store: {}", err);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "code": "user_store_unavailable",
                "error": "Login is temporarily unavailable",
            }));
        }
    };

    let is_admin = user.is_admin();
    let session_id = match state.sessions.issue(&user.email, &user.name, is_admin).await {
        Some(session_id) => session_id,
        None => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "code": "session_unavailable",
                "error": "Login is temporarily unavailable",
            }));
        }
    };
    let csrf_token = match state.csrf_tokens.issue(&session_id).await {
        Some(token) => token,
        None => {
            state.sessions.invalidate(&session_id);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "code": "session_unavailable",
                "error": "Login is temporarily unavailable",
            }));
        }
    };

    // The guard stays inert for everyone without the admin role.
    if is_admin {
        state.session_guard.watch(&session_id, &user.email).await;
    }

    info!("Login for {} (admin: {})", user.email, is_admin);

    let cookie = Cookie::build(SESSION_COOKIE_NAME, session_id)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish();

    HttpResponse::Ok().cookie(cookie).json(serde_json::json!({
        "email": user.email,
        "name": user.name,
        "is_admin": is_admin,
        "csrf_token": csrf_token,
    }))
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(identity) = current_session(&req, &state).await {
        state.session_guard.unwatch(&identity.session_id);
        state.csrf_tokens.drop_session(&identity.session_id);
        state.sessions.invalidate(&identity.session_id);
        info!("Logout for {}", identity.email);
    }

    let mut removal = Cookie::new(SESSION_COOKIE_NAME, "");
    removal.set_path("/");
    removal.make_removal();
    HttpResponse::NoContent().cookie(removal).finish()
}

fn guard_status_body(status: &GuardStatus) -> serde_json::Value {
    serde_json::json!({
        "remaining_seconds": status.remaining_seconds,
        "warning_active": status.warning_active,
    })
}

pub async fn admin_session_status(
    state: web::Data<AppState>,
    identity: web::ReqData<SessionIdentity>,
) -> HttpResponse {
    match state.session_guard.status(&identity.session_id).await {
        Some(status) => HttpResponse::Ok().json(guard_status_body(&status)),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "code": GuardError::NotWatched.code(),
            "error": "No countdown is tracked for this session",
        })),
    }
}

pub async fn extend_admin_session(
    state: web::Data<AppState>,
    identity: web::ReqData<SessionIdentity>,
) -> HttpResponse {
    match state.session_guard.extend(&identity.session_id).await {
        Ok(status) => HttpResponse::Ok().json(guard_status_body(&status)),
        Err(GuardError::NotAdmin) => HttpResponse::Forbidden().json(serde_json::json!({
            "code": GuardError::NotAdmin.code(),
            "error": "This resource requires the admin role",
        })),
        Err(GuardError::NotWatched) => HttpResponse::NotFound().json(serde_json::json!({
            "code": GuardError::NotWatched.code(),
            "error": "No countdown is tracked for this session",
        })),
    }
}
