// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use http_body_util::BodyExt;

use ecoride_api::config::Config;
use ecoride_api::engine::RideEngine;
use ecoride_api::events::EventBus;
use ecoride_api::middleware::auth::create_jwt;
use ecoride_api::models::{
    DriverProfile, Role, User, VehicleDescriptor, VehicleType, VerificationStatus,
};
use ecoride_api::routes::create_router;
use ecoride_api::services::{MockPaymentProcessor, MockVerifier, StandardFareCalculator};
use ecoride_api::store::{MemoryStore, Store};
use ecoride_api::time_utils::now_rfc3339;
use ecoride_api::AppState;

/// Check if the Firestore emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test app over the in-memory store with offline collaborators.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let bus = EventBus::default();

    let engine = RideEngine::new(
        store.clone(),
        bus.clone(),
        Arc::new(StandardFareCalculator),
        Arc::new(MockPaymentProcessor),
        true,
    );

    let state = Arc::new(AppState {
        config,
        store,
        bus,
        engine,
        identity: Arc::new(MockVerifier),
    });

    (create_router(state.clone()), state)
}

/// Seed a user and return a session token for them.
#[allow(dead_code)]
pub async fn seed_user(state: &AppState, id: &str, role: Role) -> String {
    let now = now_rfc3339();
    let user = User {
        id: id.to_string(),
        external_auth_id: Some(format!("ext-{}", id)),
        email: format!("{}@example.com", id),
        display_name: id.to_string(),
        role,
        eco_points: 0,
        co2_saved_kg: 0.0,
        referral_code: format!("ECO-{}", id.to_uppercase()),
        active: true,
        created_at: now.clone(),
        updated_at: now,
    };
    state.store.create_user(&user).await.unwrap();
    create_jwt(id, &state.config.jwt_signing_key).unwrap()
}

/// Seed a driver (user plus profile) and return a session token.
#[allow(dead_code)]
pub async fn seed_driver(state: &AppState, id: &str, available: bool) -> String {
    let token = seed_user(state, id, Role::Driver).await;
    let profile = DriverProfile {
        user_id: id.to_string(),
        vehicle: VehicleDescriptor {
            vehicle_type: VehicleType::ERickshaw,
            model: "Mahindra Treo".to_string(),
            plate: format!("DL-{}", id),
        },
        license_number: format!("LIC-{}", id),
        verification: VerificationStatus::Verified,
        rating: 5.0,
        total_rides: 0,
        total_earnings: 0.0,
        available,
        updated_at: now_rfc3339(),
    };
    state.store.create_driver_profile(&profile).await.unwrap();
    token
}

/// Build an authenticated JSON request.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build an authenticated request with no body.
#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
