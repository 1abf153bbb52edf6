// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end ride lifecycle tests through the HTTP surface.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, empty_request, json_request, seed_driver, seed_user};
use ecoride_api::models::Role;

fn ride_body() -> serde_json::Value {
    json!({
        "pickup": { "address": "Connaught Place", "lat": 28.6315, "lng": 77.2167 },
        "dropoff": { "address": "Noida Sector 18", "lat": 28.5708, "lng": 77.3260 },
        "vehicle_type": "e_rickshaw"
    })
}

#[tokio::test]
async fn test_full_lifecycle_via_api() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    // Rider requests a ride; the quote is frozen on the response.
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "pending");
    assert!(ride["estimated_fare"].as_f64().unwrap() > 0.0);
    assert!(ride["driver_id"].is_null());
    let ride_id = ride["id"].as_str().unwrap().to_string();

    // Driver sees it in the pending list.
    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/rides/pending", &driver))
        .await
        .unwrap();
    let pending = body_json(response).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    // Accept, start, complete.
    let response = app
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/api/rides/{}/accept", ride_id),
            &driver,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "accepted");
    assert_eq!(ride["driver_id"], "driver-1");
    assert!(ride["accepted_at"].is_string());

    let response = app
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/api/rides/{}/start", ride_id),
            &driver,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "in_progress");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/rides/{}/complete", ride_id),
            &driver,
            json!({ "actual_fare": 180.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "completed");
    assert_eq!(ride["actual_fare"], 180.0);

    // Rider's counters moved.
    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/me", &rider))
        .await
        .unwrap();
    let me = body_json(response).await;
    assert!(me["eco_points"].as_u64().unwrap() > 0);
    assert!(me["co2_saved_kg"].as_f64().unwrap() > 0.0);

    // Rider rates the driver, then pays.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/rides/{}/rating", ride_id),
            &rider,
            json!({ "stars": 4, "comment": "smooth ride" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/payments",
            &rider,
            json!({ "ride_id": ride_id, "method": "upi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payment = body_json(response).await;
    assert_eq!(payment["amount"], 180.0);
    assert_eq!(payment["status"], "succeeded");
}

#[tokio::test]
async fn test_driver_cannot_request_ride() {
    let (app, state) = create_test_app();
    let driver = seed_driver(&state, "driver-1", true).await;

    let response = app
        .oneshot(json_request("POST", "/api/rides", &driver, ride_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "forbidden");
}

#[tokio::test]
async fn test_invalid_coordinates_rejected() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;

    let mut body = ride_body();
    body["pickup"]["lat"] = json!(123.0);

    let response = app
        .oneshot(json_request("POST", "/api/rides", &rider, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "bad_request");
}

#[tokio::test]
async fn test_complete_out_of_order_is_conflict() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();
    let ride_id = body_json(response).await["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(empty_request(
            "POST",
            &format!("/api/rides/{}/accept", ride_id),
            &driver,
        ))
        .await
        .unwrap();

    // Completing an accepted (not started) ride is a conflict.
    let response = app
        .oneshot(empty_request(
            "POST",
            &format!("/api/rides/{}/complete", ride_id),
            &driver,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "conflict");
}

#[tokio::test]
async fn test_cancel_completed_ride_is_conflict() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();
    let ride_id = body_json(response).await["id"].as_str().unwrap().to_string();

    for step in ["accept", "start", "complete"] {
        let response = app
            .clone()
            .oneshot(empty_request(
                "POST",
                &format!("/api/rides/{}/{}", ride_id, step),
                &driver,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(empty_request(
            "POST",
            &format!("/api/rides/{}/cancel", ride_id),
            &rider,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_after_accept_unassigns_driver() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();
    let ride_id = body_json(response).await["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(empty_request(
            "POST",
            &format!("/api/rides/{}/accept", ride_id),
            &driver,
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/api/rides/{}/cancel", ride_id),
            &rider,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "cancelled");
    // A cancelled ride names no driver.
    assert!(ride["driver_id"].is_null());

    // The driver's history no longer includes it.
    let response = app
        .oneshot(empty_request("GET", "/api/rides?role=driver", &driver))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_unknown_ride_is_not_found() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;

    let response = app
        .oneshot(empty_request("GET", "/api/rides/nope", &rider))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_second_rating_is_conflict() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();
    let ride_id = body_json(response).await["id"].as_str().unwrap().to_string();

    for step in ["accept", "start", "complete"] {
        app.clone()
            .oneshot(empty_request(
                "POST",
                &format!("/api/rides/{}/{}", ride_id, step),
                &driver,
            ))
            .await
            .unwrap();
    }

    let rate = |token: String, stars: u8| {
        let app = app.clone();
        let uri = format!("/api/rides/{}/rating", ride_id);
        async move {
            app.oneshot(json_request("POST", &uri, &token, json!({ "stars": stars })))
                .await
                .unwrap()
        }
    };

    assert_eq!(rate(rider.clone(), 5).await.status(), StatusCode::OK);
    // One rating per ride, regardless of which side tries again.
    assert_eq!(rate(rider, 1).await.status(), StatusCode::CONFLICT);
    assert_eq!(rate(driver, 5).await.status(), StatusCode::CONFLICT);
}
