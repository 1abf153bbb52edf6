// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backing store adapter: one storage contract, three interchangeable
//! implementations (in-memory, Postgres, Firestore).
//!
//! Exactly one implementation is selected at startup (`Config::store_backend`)
//! and held behind `Arc<dyn Store>` for the process lifetime. The ride
//! lifecycle engine depends only on this trait.

pub mod firestore;
pub mod memory;
pub mod postgres;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    AdminStats, Badge, DriverProfile, DriverProfilePatch, DriverStats, Payment, PaymentStatus,
    Rating, Referral, Ride, RidePatch, RiderStats, RideStatus, Role, User, UserBadge, UserPatch,
};

/// Collection/table names shared by the document and relational backends.
pub mod collections {
    pub const USERS: &str = "users";
    pub const DRIVER_PROFILES: &str = "driver_profiles";
    pub const RIDES: &str = "rides";
    pub const PAYMENTS: &str = "payments";
    pub const RATINGS: &str = "ratings";
    pub const BADGES: &str = "badges";
    pub const USER_BADGES: &str = "user_badges";
    pub const REFERRALS: &str = "referrals";
}

/// Storage-level errors. All three backends map their native failures onto
/// these so identical operation sequences produce equivalent outcomes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A state precondition was violated (e.g. the ride is no longer
    /// pending). Expected under contention, not a programming error.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Backend(msg) => AppError::Database(msg),
        }
    }
}

/// The storage contract.
///
/// Ordering guarantees: `get_user_rides` is newest-first;
/// `get_pending_rides` is oldest-first so the earliest requester is served
/// first. Ride status writes are atomic check-and-set: `accept_ride` for
/// the contended pending -> accepted claim (exactly one winner) and
/// `transition_ride` for every later status change.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn get_user_by_external_auth(&self, subject: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;
    /// Merge `patch` into the user and refresh `updated_at`.
    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, StoreError>;

    // ─── Driver Profiles ─────────────────────────────────────────
    async fn get_driver_profile(&self, user_id: &str) -> Result<Option<DriverProfile>, StoreError>;
    async fn create_driver_profile(&self, profile: &DriverProfile) -> Result<(), StoreError>;
    async fn update_driver_profile(
        &self,
        user_id: &str,
        patch: &DriverProfilePatch,
    ) -> Result<DriverProfile, StoreError>;

    // ─── Rides ───────────────────────────────────────────────────
    async fn create_ride(&self, ride: &Ride) -> Result<(), StoreError>;
    async fn get_ride(&self, id: &str) -> Result<Option<Ride>, StoreError>;
    /// Rides where the user participated in the given role, newest first.
    async fn get_user_rides(&self, user_id: &str, role: Role) -> Result<Vec<Ride>, StoreError>;
    /// Pending rides, oldest first.
    async fn get_pending_rides(&self) -> Result<Vec<Ride>, StoreError>;
    /// Rides with status accepted or in_progress.
    async fn get_active_rides(&self) -> Result<Vec<Ride>, StoreError>;
    /// Merge `patch` into the ride, but only while its status is still
    /// `expected`. Returns `Conflict` when another writer changed the
    /// status first; post-accept transitions all go through this guard so
    /// an interleaved writer cannot persist an illegal status change or
    /// double-apply completion.
    async fn transition_ride(
        &self,
        id: &str,
        expected: RideStatus,
        patch: &RidePatch,
    ) -> Result<Ride, StoreError>;
    /// Atomically set `driver_id`, `status = accepted` and `accepted_at`,
    /// but only if the ride is still pending. Returns `Conflict` when
    /// another driver already took it, `NotFound` when the ride does not
    /// exist.
    async fn accept_ride(&self, ride_id: &str, driver_id: &str) -> Result<Ride, StoreError>;

    // ─── Satellite Records ───────────────────────────────────────
    async fn create_payment(&self, payment: &Payment) -> Result<(), StoreError>;
    async fn update_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> Result<Payment, StoreError>;
    async fn create_rating(&self, rating: &Rating) -> Result<(), StoreError>;
    async fn get_ride_rating(&self, ride_id: &str) -> Result<Option<Rating>, StoreError>;
    /// All ratings received by a user, in no particular order.
    async fn get_ratings_for_user(&self, ratee_id: &str) -> Result<Vec<Rating>, StoreError>;
    async fn list_badges(&self) -> Result<Vec<Badge>, StoreError>;
    async fn award_badge(&self, user_badge: &UserBadge) -> Result<(), StoreError>;
    async fn get_user_badges(&self, user_id: &str) -> Result<Vec<UserBadge>, StoreError>;
    async fn create_referral(&self, referral: &Referral) -> Result<(), StoreError>;
    async fn get_referral(&self, code: &str) -> Result<Option<Referral>, StoreError>;

    // ─── Aggregates ──────────────────────────────────────────────
    async fn rider_stats(&self, user_id: &str) -> Result<RiderStats, StoreError>;
    async fn driver_stats(&self, user_id: &str) -> Result<DriverStats, StoreError>;
    async fn admin_stats(&self) -> Result<AdminStats, StoreError>;
}

/// Default badge catalog, seeded into stores that start empty.
pub fn default_badges() -> Vec<Badge> {
    vec![
        Badge {
            id: "green-starter".to_string(),
            name: "Green Starter".to_string(),
            description: "Earned your first 100 eco points".to_string(),
            threshold_points: 100,
        },
        Badge {
            id: "eco-warrior".to_string(),
            name: "Eco Warrior".to_string(),
            description: "Earned 500 eco points".to_string(),
            threshold_points: 500,
        },
        Badge {
            id: "planet-saver".to_string(),
            name: "Planet Saver".to_string(),
            description: "Earned 2000 eco points".to_string(),
            threshold_points: 2000,
        },
    ]
}
