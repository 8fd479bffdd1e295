// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::app_state::AppState;
use crate::iam::sessions::SESSION_COOKIE_NAME;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;

/// Middleware guarding the admin API scope: the request needs a live
/// session (401 otherwise) holding the admin role (403 otherwise). The
/// resolved identity is stored in request extensions for the handlers.
pub struct RequireAdminMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RequireAdminMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireAdminMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAdminMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireAdminMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireAdminMiddlewareService<S>
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
            let state = req.app_data::<web::Data<AppState>>().cloned();
            let session_id = req
                .cookie(SESSION_COOKIE_NAME)
                .map(|cookie| cookie.value().to_string());

            let identity = match (&state, &session_id) {
                (Some(state), Some(session_id)) => state.sessions.resolve(session_id).await,
                _ => None,
            };

            let identity = match identity {
                Some(identity) => identity,
                None => {
                    let (req, _) = req.into_parts();
                    let response = HttpResponse::Unauthorized()
                        .json(serde_json::json!({
                            "code": "authentication_required",
                            "error": "Sign in to access this resource",
                        }))
                        .map_into_right_body();
                    return Ok(ServiceResponse::new(req, response));
                }
            };

            if !identity.is_admin {
                let (req, _) = req.into_parts();
                let response = HttpResponse::Forbidden()
                    .json(serde_json::json!({
                        "code": "admin_role_required",
                        "error": "This resource requires the admin role",
                    }))
                    .map_into_right_body();
                return Ok(ServiceResponse::new(req, response));
            }

            req.extensions_mut().insert(identity);
            let response = service.call(req).await?;
            Ok(response.map_into_left_body())
        })
    }
}
