// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! EcoRide: eco-friendly ride-hailing backend
//!
//! This crate provides the ride state and event distribution service:
//! a backend-agnostic store (in-memory, Postgres or Firestore) behind a
//! single contract, the ride lifecycle engine, and live event fan-out to
//! connected clients.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use engine::RideEngine;
use events::EventBus;
use services::IdentityVerifier;
use store::Store;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub bus: EventBus,
    pub engine: RideEngine,
    pub identity: Arc<dyn IdentityVerifier>,
}
