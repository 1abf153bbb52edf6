// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard aggregate routes.
//!
//! All three aggregates are computed on demand from the store; nothing
//! is cached, so a re-read with no intervening writes returns identical
//! numbers.

use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AdminStats, DriverStats, RiderStats, Role};
use crate::routes::current_user;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats/rider", get(rider_stats))
        .route("/api/drivers/stats", get(driver_stats))
        .route("/api/admin/stats", get(admin_stats))
}

async fn rider_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<RiderStats>> {
    let user = current_user(&state, &auth).await?;
    let stats = state.store.rider_stats(&user.id).await?;
    Ok(Json(stats))
}

async fn driver_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<DriverStats>> {
    let user = current_user(&state, &auth).await?;
    if user.role != Role::Driver {
        return Err(AppError::Forbidden(
            "only drivers have driver stats".to_string(),
        ));
    }
    let stats = state.store.driver_stats(&user.id).await?;
    Ok(Json(stats))
}

async fn admin_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<AdminStats>> {
    let user = current_user(&state, &auth).await?;
    if user.role != Role::Admin {
        return Err(AppError::Forbidden("admin access required".to_string()));
    }
    let stats = state.store.admin_stats().await?;
    Ok(Json(stats))
}
