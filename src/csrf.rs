// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::app_state::AppState;
use crate::audit::{SecurityEventKind, Severity};
use crate::iam::password::random_token;
use crate::iam::sessions::SESSION_COOKIE_NAME;
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::Method,
    web,
};
use futures_util::future::LocalBoxFuture;
use log::warn;
use std::collections::HashMap;
use std::future::{Ready, ready};
use std::rc::Rc;
use tokio::sync::{mpsc, oneshot};

pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

const CSRF_CHANNEL_DEPTH: usize = 64;

/// Endpoints reachable without a session; they cannot carry a session-bound
/// token and are protected by rate limiting instead.
const EXEMPT_PATHS: [&str; 2] = ["/api/login", "/api/inquiries"];

/// One CSRF token per session, issued at login and dropped with the
/// session. Requests tag themselves via the `X-Csrf-Token` header.
#[derive(Clone)]
pub struct CsrfTokenStore {
    sender: mpsc::Sender<CsrfCommand>,
}

impl CsrfTokenStore {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(CSRF_CHANNEL_DEPTH);
        tokio::spawn(async move {
            let mut state = CsrfState::new();
            state.run(receiver).await;
        });
        Self { sender }
    }

    pub async fn issue(&self, session_id: &str) -> Option<String> {
        let (reply, receive) = oneshot::channel();
        let command = CsrfCommand::Issue {
            session_id: session_id.to_string(),
            reply,
        };
        if self.sender.send(command).await.is_err() {
            warn!("CSRF token store channel closed while issuing token");
            return None;
        }
        receive.await.ok()
    }

    /// Fails closed: an unknown session or store failure never validates.
    pub async fn check(&self, session_id: &str, token: &str) -> bool {
        let (reply, receive) = oneshot::channel();
        let command = CsrfCommand::Check {
            session_id: session_id.to_string(),
            token: token.to_string(),
            reply,
        };
        if self.sender.send(command).await.is_err() {
            return false;
        }
        receive.await.unwrap_or(false)
    }

    pub fn drop_session(&self, session_id: &str) {
        let command = CsrfCommand::Drop {
            session_id: session_id.to_string(),
        };
        if self.sender.try_send(command).is_err() {
            warn!("CSRF token store channel unavailable while dropping session");
        }
    }
}

impl Default for CsrfTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

enum CsrfCommand {
    Issue {
        session_id: String,
        reply: oneshot::Sender<String>,
    },
    Check {
        session_id: String,
        token: String,
        reply: oneshot::Sender<bool>,
    },
    Drop {
        session_id: String,
    },
}

struct CsrfState {
    tokens: HashMap<String, String>,
}

impl CsrfState {
    fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    async fn run(&mut self, mut receiver: mpsc::Receiver<CsrfCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                CsrfCommand::Issue { session_id, reply } => {
                    let token = random_token("csrf");
                    self.tokens.insert(session_id, token.clone());
                    let _ = reply.send(token);
                }
                CsrfCommand::Check {
                    session_id,
                    token,
                    reply,
                } => {
                    let valid = self
                        .tokens
                        .get(&session_id)
                        .map(|expected| *expected == token)
                        .unwrap_or(false);
                    let _ = reply.send(valid);
                }
                CsrfCommand::Drop { session_id } => {
                    self.tokens.remove(&session_id);
                }
            }
        }
    }
}

/// Rejects mutating requests that do not carry the session's CSRF token.
pub struct CsrfValidationMiddlewareFactory;

impl<S, B> Transform<S, ServiceRequest> for CsrfValidationMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CsrfValidationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CsrfValidationMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct CsrfValidationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for CsrfValidationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if !requires_csrf_check(&req) {
                let response = service.call(req).await?;
                return Ok(response.map_into_left_body());
            }

            let state = req.app_data::<web::Data<AppState>>().cloned();
            let session_id = req
                .cookie(SESSION_COOKIE_NAME)
                .map(|cookie| cookie.value().to_string());
            let header_token = req
                .headers()
                .get(CSRF_HEADER_NAME)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.to_string());

            let valid = match (&state, &session_id, &header_token) {
                (Some(state), Some(session_id), Some(token)) => {
                    state.csrf_tokens.check(session_id, token).await
                }
                _ => false,
            };

            if !valid {
                if let Some(state) = &state {
                    state.audit.record(
                        SecurityEventKind::CsrfRejected,
                        serde_json::json!({
                            "path": req.path(),
                            "method": req.method().as_str(),
                        }),
                        Severity::Medium,
                    );
                }
                let (req, _) = req.into_parts();
                let response = HttpResponse::Forbidden()
                    .json(serde_json::json!({
                        "code": "csrf_token_invalid",
                        "error": "Missing or invalid CSRF token",
                    }))
                    .map_into_right_body();
                return Ok(ServiceResponse::new(req, response));
            }

            let response = service.call(req).await?;
            Ok(response.map_into_left_body())
        })
    }
}

fn requires_csrf_check(req: &ServiceRequest) -> bool {
    let method = req.method();
    let mutating = method == Method::POST
        || method == Method::PUT
        || method == Method::DELETE
        || method == Method::PATCH;
    if !mutating {
        return false;
    }
    !EXEMPT_PATHS.iter().any(|path| req.path() == *path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn issued_token_checks_out() {
        let store = CsrfTokenStore::new();
        let token = store.issue("ssn_1").await.expect("token");

        assert!(store.check("ssn_1", &token).await);
        assert!(!store.check("ssn_1", "csrf_forged").await);
        assert!(!store.check("ssn_2", &token).await);
    }

    #[actix_web::test]
    async fn reissue_replaces_previous_token() {
        let store = CsrfTokenStore::new();
        let first = store.issue("ssn_1").await.expect("token");
        let second = store.issue("ssn_1").await.expect("token");

        assert!(!store.check("ssn_1", &first).await);
        assert!(store.check("ssn_1", &second).await);
    }

    #[actix_web::test]
    async fn dropped_session_no_longer_validates() {
        let store = CsrfTokenStore::new();
        let token = store.issue("ssn_1").await.expect("token");
        store.drop_session("ssn_1");

        let mut valid = store.check("ssn_1", &token).await;
        for _ in 0..10 {
            if !valid {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            valid = store.check("ssn_1", &token).await;
        }
        assert!(!valid);
    }
}
