// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! EcoRide API Server
//!
//! Ride state and event distribution for the eco-friendly ride-hailing
//! platform: lifecycle engine, pluggable backing store and live fan-out.

use ecoride_api::{
    config::{Config, StoreBackend},
    engine::RideEngine,
    events::{bridge::ChangeFeedBridge, EventBus},
    services::{HttpIdentityVerifier, MockPaymentProcessor, StandardFareCalculator},
    store::{FirestoreStore, MemoryStore, PostgresStore, Store},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, backend = ?config.store_backend, "Starting EcoRide API");

    let bus = EventBus::default();

    // Select the backing store. The choice is fixed for the process
    // lifetime; with Firestore the change-feed bridge becomes the event
    // source, so the engine must not also publish ride/driver changes.
    let mut bridge = None;
    let (store, emits_direct): (Arc<dyn Store>, bool) = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; state is lost on restart");
            (Arc::new(MemoryStore::new()), true)
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL is validated at config load");
            let store = PostgresStore::connect(url)
                .await
                .expect("Failed to connect to Postgres");
            tracing::info!("Postgres store initialized, migrations applied");
            (Arc::new(store), true)
        }
        StoreBackend::Firestore => {
            let store = FirestoreStore::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore");
            tracing::info!(project = %config.gcp_project_id, "Firestore store initialized");

            // Changes flow database -> listener -> bus, so writes from
            // every instance fan out to every instance's clients.
            let db = store.database().expect("Firestore client is online");
            bridge = Some(
                ChangeFeedBridge::start(&db, bus.clone())
                    .await
                    .expect("Failed to start change-feed bridge"),
            );
            (Arc::new(store), false)
        }
    };

    let identity = Arc::new(HttpIdentityVerifier::new(
        config.identity_verify_url.clone(),
    ));

    let engine = RideEngine::new(
        store.clone(),
        bus.clone(),
        Arc::new(StandardFareCalculator),
        Arc::new(MockPaymentProcessor),
        emits_direct,
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        bus,
        engine,
        identity,
    });

    // Build router
    let app = ecoride_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;

    if let Some(bridge) = bridge {
        bridge.shutdown().await?;
    }
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ecoride_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
