// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod inquiries;
pub mod session;
pub mod uploads;

use crate::admin::RequireAdminMiddleware;
use crate::app_state::AppState;
use crate::config::ValidatedConfig;
use crate::iam::SessionIdentity;
use crate::iam::sessions::SESSION_COOKIE_NAME;
use actix_web::{HttpRequest, HttpResponse, web};
use log::warn;
use std::net::IpAddr;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/login", web::post().to(session::login))
            .route("/logout", web::post().to(session::logout))
            .route("/inquiries", web::post().to(inquiries::submit_inquiry))
            .route("/uploads/{filename}", web::put().to(uploads::upload_file))
            .service(
                web::scope("/admin")
                    .wrap(RequireAdminMiddleware)
                    .route("/session", web::get().to(session::admin_session_status))
                    .route(
                        "/session/extend",
                        web::post().to(session::extend_admin_session),
                    ),
            ),
    );
}

/// Extracts the real client IP address from the request, considering
/// X-Forwarded-For headers if configured
pub fn extract_client_ip(req: &HttpRequest, config: &ValidatedConfig) -> Option<IpAddr> {
    if config.security.use_forwarded_for {
        // Take the first IP from the comma-separated list (leftmost is the
        // original client)
        if let Some(forwarded_for) = req.headers().get("x-forwarded-for")
            && let Ok(header_value) = forwarded_for.to_str()
            && let Some(first_ip) = header_value.split(',').next()
            && let Ok(ip) = first_ip.trim().parse::<IpAddr>()
        {
            return Some(ip);
        }

        if let Some(real_ip) = req.headers().get("x-real-ip")
            && let Ok(header_value) = real_ip.to_str()
            && let Ok(ip) = header_value.trim().parse::<IpAddr>()
        {
            return Some(ip);
        }
    }

    if let Some(peer_addr) = req.connection_info().peer_addr()
        && let Some(ip_str) = peer_addr.split(':').next()
        && let Ok(ip) = ip_str.parse::<IpAddr>()
    {
        return Some(ip);
    }

    // Try parsing the full address as IP (in case there's no port)
    if let Some(peer_addr) = req.connection_info().peer_addr()
        && let Ok(ip) = peer_addr.parse::<IpAddr>()
    {
        return Some(ip);
    }

    warn!("Could not extract client IP from request");
    None
}

/// Rate-limit keys fall back to a shared bucket when the client IP cannot
/// be determined; anonymous callers must not bypass the throttle.
pub(crate) fn client_key(req: &HttpRequest, config: &ValidatedConfig) -> String {
    extract_client_ip(req, config)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn rate_limited_response() -> HttpResponse {
    HttpResponse::TooManyRequests().json(serde_json::json!({
        "code": "rate_limited",
        "error": "Too many requests. Please try again later.",
    }))
}

pub(crate) async fn current_session(
    req: &HttpRequest,
    state: &AppState,
) -> Option<SessionIdentity> {
    let cookie = req.cookie(SESSION_COOKIE_NAME)?;
    state.sessions.resolve(cookie.value()).await
}
