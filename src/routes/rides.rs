// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users: profile, driver onboarding and
//! the ride lifecycle.
//! The auth middleware is applied in routes/mod.rs for these routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    DriverProfile, LocationPoint, Payment, Rating, Ride, Role, User, UserPatch, VehicleDescriptor,
    VehicleType,
};
use crate::routes::current_user;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route(
            "/api/drivers/profile",
            get(get_driver_profile)
                .post(upsert_driver_profile)
                .put(upsert_driver_profile),
        )
        .route("/api/drivers/availability", put(set_availability))
        .route("/api/rides", post(create_ride).get(get_my_rides))
        .route("/api/rides/pending", get(get_pending_rides))
        .route("/api/rides/active", get(get_active_rides))
        .route("/api/rides/{id}", get(get_ride))
        .route("/api/rides/{id}/accept", post(accept_ride))
        .route("/api/rides/{id}/start", post(start_ride))
        .route("/api/rides/{id}/complete", post(complete_ride))
        .route("/api/rides/{id}/cancel", post(cancel_ride))
        .route("/api/rides/{id}/rating", post(submit_rating))
        .route("/api/payments", post(record_payment))
}

// ─── User Profile ────────────────────────────────────────────

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>> {
    Ok(Json(current_user(&state, &auth).await?))
}

#[derive(Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Update the caller's own profile fields.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<User>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user = current_user(&state, &auth).await?;

    let patch = UserPatch {
        display_name: req.display_name,
        email: req.email,
        ..Default::default()
    };
    let user = state.store.update_user(&user.id, &patch).await?;
    Ok(Json(user))
}

// ─── Driver Onboarding ───────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct DriverProfileRequest {
    pub vehicle_type: VehicleType,
    #[validate(length(min = 1, max = 100))]
    pub vehicle_model: String,
    #[validate(length(min = 1, max = 20))]
    pub plate: String,
    #[validate(length(min = 1, max = 50))]
    pub license_number: String,
}

async fn get_driver_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<DriverProfile>> {
    let user = current_user(&state, &auth).await?;
    let profile = state
        .store
        .get_driver_profile(&user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("driver profile".to_string()))?;
    Ok(Json(profile))
}

async fn upsert_driver_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<DriverProfileRequest>,
) -> Result<Json<DriverProfile>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user = current_user(&state, &auth).await?;

    let vehicle = VehicleDescriptor {
        vehicle_type: req.vehicle_type,
        model: req.vehicle_model,
        plate: req.plate,
    };
    let profile = state
        .engine
        .upsert_driver_profile(&user, vehicle, req.license_number)
        .await?;
    Ok(Json(profile))
}

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

async fn set_availability(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<DriverProfile>> {
    let user = current_user(&state, &auth).await?;
    let profile = state.engine.set_availability(&user, req.available).await?;
    Ok(Json(profile))
}

// ─── Ride Lifecycle ──────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct LocationInput {
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

impl From<LocationInput> for LocationPoint {
    fn from(input: LocationInput) -> Self {
        LocationPoint {
            address: input.address,
            lat: input.lat,
            lng: input.lng,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateRideRequest {
    #[validate(nested)]
    pub pickup: LocationInput,
    #[validate(nested)]
    pub dropoff: LocationInput,
    pub vehicle_type: VehicleType,
}

async fn create_ride(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateRideRequest>,
) -> Result<Json<Ride>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user = current_user(&state, &auth).await?;
    let ride = state
        .engine
        .create_ride(&user, req.pickup.into(), req.dropoff.into(), req.vehicle_type)
        .await?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
struct MyRidesQuery {
    /// Which side of the ride to list; defaults to the caller's role.
    role: Option<Role>,
}

/// Ride history for the caller, newest first.
async fn get_my_rides(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<MyRidesQuery>,
) -> Result<Json<Vec<Ride>>> {
    let user = current_user(&state, &auth).await?;
    let role = query.role.unwrap_or(user.role);
    let rides = state.store.get_user_rides(&user.id, role).await?;
    Ok(Json(rides))
}

/// Pending rides, oldest first. A driver who has toggled themselves
/// unavailable sees an empty list; they cannot accept anyway.
async fn get_pending_rides(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Ride>>> {
    let user = current_user(&state, &auth).await?;

    if user.role == Role::Driver {
        let available = state
            .store
            .get_driver_profile(&user.id)
            .await?
            .map(|p| p.available)
            .unwrap_or(false);
        if !available {
            return Ok(Json(Vec::new()));
        }
    }

    let rides = state.store.get_pending_rides().await?;
    Ok(Json(rides))
}

async fn get_active_rides(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Ride>>> {
    let _user = current_user(&state, &auth).await?;
    let rides = state.store.get_active_rides().await?;
    Ok(Json(rides))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Ride>> {
    let _user = current_user(&state, &auth).await?;
    let ride = state
        .store
        .get_ride(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ride {}", id)))?;
    Ok(Json(ride))
}

async fn accept_ride(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Ride>> {
    let user = current_user(&state, &auth).await?;
    let ride = state.engine.accept_ride(&user, &id).await?;
    Ok(Json(ride))
}

async fn start_ride(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Ride>> {
    let user = current_user(&state, &auth).await?;
    let ride = state.engine.start_ride(&user, &id).await?;
    Ok(Json(ride))
}

#[derive(Deserialize, Default)]
pub struct CompleteRideRequest {
    /// Final fare; defaults to the frozen estimate.
    pub actual_fare: Option<f64>,
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Option<Json<CompleteRideRequest>>,
) -> Result<Json<Ride>> {
    let user = current_user(&state, &auth).await?;
    let req = body.map(|Json(r)| r).unwrap_or_default();
    if let Some(fare) = req.actual_fare {
        if fare <= 0.0 {
            return Err(AppError::BadRequest("fare must be positive".to_string()));
        }
    }
    let ride = state.engine.complete_ride(&user, &id, req.actual_fare).await?;
    Ok(Json(ride))
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Ride>> {
    let user = current_user(&state, &auth).await?;
    let ride = state.engine.cancel_ride(&user, &id).await?;
    Ok(Json(ride))
}

// ─── Ratings & Payments ──────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RatingRequest {
    #[validate(range(min = 1, max = 5))]
    pub stars: u8,
    #[validate(length(max = 500))]
    pub comment: Option<String>,
}

async fn submit_rating(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<RatingRequest>,
) -> Result<Json<Rating>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user = current_user(&state, &auth).await?;
    let rating = state
        .engine
        .submit_rating(&user, &id, req.stars, req.comment)
        .await?;
    Ok(Json(rating))
}

#[derive(Deserialize, Validate)]
pub struct PaymentRequest {
    #[validate(length(min = 1))]
    pub ride_id: String,
    /// e.g. "upi", "card", "cash"
    #[validate(length(min = 1, max = 20))]
    pub method: String,
}

async fn record_payment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<Payment>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user = current_user(&state, &auth).await?;
    let payment = state
        .engine
        .record_payment(&user, &req.ride_id, req.method)
        .await?;
    Ok(Json(payment))
}
