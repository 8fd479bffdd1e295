// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod common;

use actix_web::{http::StatusCode, test};
use common::{TestHarness, add_auth_headers, build_test_app};

#[actix_web::test]
async fn admin_sees_countdown_status() {
    let harness = TestHarness::new().await;
    let app = test::init_service(build_test_app(harness.state.clone())).await;
    let session = harness.admin_auth().await;

    let req = add_auth_headers(
        test::TestRequest::get().uri("/api/admin/session"),
        &session,
        false,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let remaining = body["remaining_seconds"].as_u64().expect("remaining");
    // The 1-second ticker may have fired a few times since login.
    assert!((1790..=1800).contains(&remaining), "remaining {}", remaining);
    assert_eq!(body["warning_active"], false);
}

#[actix_web::test]
async fn extend_resets_the_countdown() {
    let harness = TestHarness::new().await;
    let app = test::init_service(build_test_app(harness.state.clone())).await;
    let session = harness.admin_auth().await;

    let req = add_auth_headers(
        test::TestRequest::post().uri("/api/admin/session/extend"),
        &session,
        true,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let remaining = body["remaining_seconds"].as_u64().expect("remaining");
    assert!((1790..=1800).contains(&remaining));
    assert_eq!(body["warning_active"], false);
}

#[actix_web::test]
async fn extend_requires_csrf_token() {
    let harness = TestHarness::new().await;
    let app = test::init_service(build_test_app(harness.state.clone())).await;
    let session = harness.admin_auth().await;

    let req = add_auth_headers(
        test::TestRequest::post().uri("/api/admin/session/extend"),
        &session,
        false,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn customer_cannot_reach_admin_session_api() {
    let harness = TestHarness::new().await;
    let app = test::init_service(build_test_app(harness.state.clone())).await;
    let session = harness.customer_auth().await;

    let req = add_auth_headers(
        test::TestRequest::get().uri("/api/admin/session"),
        &session,
        false,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "admin_role_required");
}

#[actix_web::test]
async fn anonymous_request_is_unauthorized() {
    let harness = TestHarness::new().await;
    let app = test::init_service(build_test_app(harness.state.clone())).await;

    let req = test::TestRequest::get()
        .uri("/api/admin/session")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn logout_invalidates_session_and_watch() {
    let harness = TestHarness::new().await;
    let app = test::init_service(build_test_app(harness.state.clone())).await;
    let session = harness.admin_auth().await;

    let req = add_auth_headers(
        test::TestRequest::post().uri("/api/logout"),
        &session,
        true,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // The session is gone, so the admin scope rejects the old cookie.
    let req = add_auth_headers(
        test::TestRequest::get().uri("/api/admin/session"),
        &session,
        false,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
