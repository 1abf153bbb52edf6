// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live fan-out tests: HTTP writes reach every bus subscriber exactly
//! once, and departed subscribers receive nothing.

use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, empty_request, json_request, seed_driver, seed_user};
use ecoride_api::events::LiveEvent;
use ecoride_api::models::{Role, RideStatus};

fn ride_body() -> serde_json::Value {
    json!({
        "pickup": { "address": "A", "lat": 28.6315, "lng": 77.2167 },
        "dropoff": { "address": "B", "lat": 28.5708, "lng": 77.3260 },
        "vehicle_type": "e_rickshaw"
    })
}

#[tokio::test]
async fn test_ride_creation_fans_out_to_all_subscribers() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;

    let mut receivers: Vec<_> = (0..4).map(|_| state.bus.subscribe()).collect();

    let response = app
        .oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();
    let ride_id = body_json(response).await["id"].as_str().unwrap().to_string();

    for rx in &mut receivers {
        match rx.recv().await.unwrap() {
            LiveEvent::RideAdded { ride } => assert_eq!(ride.id, ride_id),
            other => panic!("unexpected event: {:?}", other),
        }
        // Exactly one event each.
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn test_lifecycle_emits_updates_in_order() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;
    let driver = seed_driver(&state, "driver-1", true).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();
    let ride_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let mut rx = state.bus.subscribe();

    for step in ["accept", "start"] {
        app.clone()
            .oneshot(empty_request(
                "POST",
                &format!("/api/rides/{}/{}", ride_id, step),
                &driver,
            ))
            .await
            .unwrap();
    }

    let statuses: Vec<RideStatus> = [rx.recv().await.unwrap(), rx.recv().await.unwrap()]
        .into_iter()
        .map(|event| match event {
            LiveEvent::RideUpdated { ride } => ride.status,
            other => panic!("unexpected event: {:?}", other),
        })
        .collect();
    assert_eq!(statuses, vec![RideStatus::Accepted, RideStatus::InProgress]);
}

#[tokio::test]
async fn test_departed_subscriber_receives_nothing() {
    let (app, state) = create_test_app();
    let rider = seed_user(&state, "rider-1", Role::Rider).await;

    let departed = state.bus.subscribe();
    drop(departed);
    let mut active = state.bus.subscribe();
    assert_eq!(state.bus.receiver_count(), 1);

    app.oneshot(json_request("POST", "/api/rides", &rider, ride_body()))
        .await
        .unwrap();

    assert!(matches!(
        active.recv().await.unwrap(),
        LiveEvent::RideAdded { .. }
    ));
}

#[tokio::test]
async fn test_availability_toggle_emits_driver_update() {
    let (app, state) = create_test_app();
    let driver = seed_driver(&state, "driver-1", true).await;

    let mut rx = state.bus.subscribe();

    app.oneshot(json_request(
        "PUT",
        "/api/drivers/availability",
        &driver,
        json!({ "available": false }),
    ))
    .await
    .unwrap();

    match rx.recv().await.unwrap() {
        LiveEvent::DriverUpdated { profile } => {
            assert_eq!(profile.user_id, "driver-1");
            assert!(!profile.available);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}
