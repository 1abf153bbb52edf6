// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stats aggregates and the availability-gated pending view.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, empty_request, json_request, seed_driver, seed_user};
use ecoride_api::models::Role;

fn ride_body() -> serde_json::Value {
    json!({
        "pickup": { "address": "A", "lat": 28.6315, "lng": 77.2167 },
        "dropoff": { "address": "B", "lat": 28.5708, "lng": 77.3260 },
        "vehicle_type": "e_rickshaw"
    })
}

async fn run_one_ride(app: &axum::Router, rider: &str, driver: &str, fare: f64) -> String {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/rides", rider, ride_body()))
        .await
        .unwrap();
    let ride_id = body_json(response).await["id"].as_str().unwrap().to_string();

    for step in ["accept", "start"] {
        let response = app
            .clone()
            .oneshot(empty_request(
                "POST",
                &format!("/api/rides/{}/{}", ride_id, step),
                driver,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/rides/{}/complete", ride_id),
            driver,
            json!({ "actual_fare": fare }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    ride_id
}

#[tokio::test]
async fn test_stats_reflect_completed_rides() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    run_one_ride(&app, &rider, &driver, 120.0).await;
    run_one_ride(&app, &rider, &driver, 80.0).await;

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/stats/rider", &rider))
        .await
        .unwrap();
    let rider_stats = body_json(response).await;
    assert_eq!(rider_stats["completed_rides"], 2);
    assert!(rider_stats["eco_points"].as_u64().unwrap() > 0);

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/drivers/stats", &driver))
        .await
        .unwrap();
    let driver_stats = body_json(response).await;
    assert_eq!(driver_stats["total_rides"], 2);
    assert_eq!(driver_stats["total_earnings"], 200.0);
    // Both rides completed just now, on the current UTC day.
    assert_eq!(driver_stats["today_earnings"], 200.0);

    let admin = seed_user(&state, "admin-1", Role::Admin).await;
    let response = app
        .oneshot(empty_request("GET", "/api/admin/stats", &admin))
        .await
        .unwrap();
    let admin_stats = body_json(response).await;
    assert_eq!(admin_stats["total_rides"], 2);
    assert_eq!(admin_stats["completed_rides"], 2);
    assert_eq!(admin_stats["total_revenue"], 200.0);
    assert_eq!(admin_stats["rides_by_vehicle_type"]["e_rickshaw"], 2);
}

#[tokio::test]
async fn test_stats_reads_are_idempotent() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    run_one_ride(&app, &rider, &driver, 100.0).await;

    let read = || async {
        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/stats/rider", &rider))
            .await
            .unwrap();
        body_json(response).await
    };

    assert_eq!(read().await, read().await);
}

#[tokio::test]
async fn test_unavailable_driver_sees_empty_pending_view() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    app.clone()
        .oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();

    let pending_for = |token: String| {
        let app = app.clone();
        async move {
            let response = app
                .oneshot(empty_request("GET", "/api/rides/pending", &token))
                .await
                .unwrap();
            body_json(response).await.as_array().unwrap().len()
        }
    };

    assert_eq!(pending_for(driver.clone()).await, 1);

    app.clone()
        .oneshot(json_request(
            "PUT",
            "/api/drivers/availability",
            &driver,
            json!({ "available": false }),
        ))
        .await
        .unwrap();

    // Off-duty drivers see nothing; the rider's view is unaffected.
    assert_eq!(pending_for(driver.clone()).await, 0);
    assert_eq!(pending_for(rider).await, 1);

    app.clone()
        .oneshot(json_request(
            "PUT",
            "/api/drivers/availability",
            &driver,
            json!({ "available": true }),
        ))
        .await
        .unwrap();
    assert_eq!(pending_for(driver).await, 1);
}

#[tokio::test]
async fn test_badge_awarded_and_counted() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    // A long e-bike ride earns well over the 100-point threshold.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/rides",
            &rider,
            json!({
                "pickup": { "address": "A", "lat": 28.0, "lng": 77.0 },
                "dropoff": { "address": "B", "lat": 28.7, "lng": 77.8 },
                "vehicle_type": "e_bike"
            }),
        ))
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

    let response = app
        .oneshot(empty_request("GET", "/api/stats/rider", &rider))
        .await
        .unwrap();
    let stats = body_json(response).await;
    assert!(stats["badge_count"].as_u64().unwrap() >= 1);
}
