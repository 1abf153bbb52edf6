// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore backing store.
//!
//! Document-oriented backend with a native change feed; when this store is
//! active the live event bus is fed by the change-feed bridge
//! (`events::bridge`) instead of direct emission.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    AdminStats, Badge, DriverProfile, DriverProfilePatch, DriverStats, Payment, PaymentStatus,
    Rating, Referral, Ride, RidePatch, RiderStats, RideStatus, Role, User, UserBadge, UserPatch,
};
use crate::store::{collections, Store, StoreError};
use crate::time_utils::now_rfc3339;

/// Firestore store wrapper with typed operations.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Clone of the underlying client, for the change-feed bridge.
    pub fn database(&self) -> Option<firestore::FirestoreDb> {
        self.client.clone()
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client.as_ref().ok_or_else(|| {
            StoreError::Backend("Database not connected (offline mode)".to_string())
        })
    }

    async fn get_by_id<T>(&self, collection: &str, id: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn upsert<T>(&self, collection: &str, id: &str, obj: &T) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(obj)
            .execute()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Run a guarded ride mutation inside a transaction.
    ///
    /// The read goes through a client scoped to the transaction's
    /// consistency selector, which registers the document on the
    /// transaction; a concurrent writer then makes our commit fail
    /// instead of letting both blind-writes land. `mutate` checks the
    /// state precondition and returns the updated ride, `contended` is
    /// the conflict message for a lost commit race.
    async fn guarded_ride_write<F>(
        &self,
        ride_id: &str,
        contended: &str,
        mutate: F,
    ) -> Result<Ride, StoreError>
    where
        F: FnOnce(Ride) -> Result<Ride, StoreError> + Send,
    {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let ride: Option<Ride> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::RIDES)
            .obj()
            .one(ride_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to read ride: {}", e)))?;

        let ride = match ride {
            None => {
                let _ = transaction.rollback().await;
                return Err(StoreError::NotFound(format!("ride {}", ride_id)));
            }
            Some(ride) => ride,
        };

        let ride = match mutate(ride) {
            Ok(ride) => ride,
            Err(err) => {
                let _ = transaction.rollback().await;
                return Err(err);
            }
        };

        client
            .fluent()
            .update()
            .in_col(collections::RIDES)
            .document_id(ride_id)
            .object(&ride)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                StoreError::Backend(format!("Failed to add ride to transaction: {}", e))
            })?;

        // A contended commit means another writer got the document first.
        transaction
            .commit()
            .await
            .map_err(|_| StoreError::Conflict(contended.to_string()))?;

        Ok(ride)
    }
}

#[async_trait]
impl Store for FirestoreStore {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.get_by_id(collections::USERS, id).await
    }

    async fn get_user_by_external_auth(&self, subject: &str) -> Result<Option<User>, StoreError> {
        let subject = subject.to_string();
        let mut users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("external_auth_id").eq(subject.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(users.pop())
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.upsert(collections::USERS, &user.id, user).await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, StoreError> {
        let mut user = self
            .get_user(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;
        user.apply(patch, &now_rfc3339());
        self.upsert(collections::USERS, id, &user).await?;
        Ok(user)
    }

    // ─── Driver Profiles ─────────────────────────────────────────

    async fn get_driver_profile(&self, user_id: &str) -> Result<Option<DriverProfile>, StoreError> {
        self.get_by_id(collections::DRIVER_PROFILES, user_id).await
    }

    async fn create_driver_profile(&self, profile: &DriverProfile) -> Result<(), StoreError> {
        self.upsert(collections::DRIVER_PROFILES, &profile.user_id, profile)
            .await
    }

    async fn update_driver_profile(
        &self,
        user_id: &str,
        patch: &DriverProfilePatch,
    ) -> Result<DriverProfile, StoreError> {
        let mut profile = self
            .get_driver_profile(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("driver profile {}", user_id)))?;
        profile.apply(patch, &now_rfc3339());
        self.upsert(collections::DRIVER_PROFILES, user_id, &profile)
            .await?;
        Ok(profile)
    }

    // ─── Rides ───────────────────────────────────────────────────

    async fn create_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        self.upsert(collections::RIDES, &ride.id, ride).await
    }

    async fn get_ride(&self, id: &str) -> Result<Option<Ride>, StoreError> {
        self.get_by_id(collections::RIDES, id).await
    }

    async fn get_user_rides(&self, user_id: &str, role: Role) -> Result<Vec<Ride>, StoreError> {
        let field = match role {
            Role::Driver => "driver_id",
            _ => "rider_id",
        };
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RIDES)
            .filter(move |q| q.field(field).eq(user_id.clone()))
            .order_by([(
                "requested_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_pending_rides(&self) -> Result<Vec<Ride>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RIDES)
            .filter(|q| q.field("status").eq("pending"))
            // Oldest first: the earliest requester is served first.
            .order_by([(
                "requested_at",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_active_rides(&self) -> Result<Vec<Ride>, StoreError> {
        let rides: Vec<Ride> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RIDES)
            .filter(|q| {
                q.for_any([
                    q.field("status").eq("accepted"),
                    q.field("status").eq("in_progress"),
                ])
            })
            .order_by([(
                "requested_at",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rides)
    }

    async fn transition_ride(
        &self,
        id: &str,
        expected: RideStatus,
        patch: &RidePatch,
    ) -> Result<Ride, StoreError> {
        self.guarded_ride_write(id, "ride was modified concurrently", |mut ride| {
            if ride.status != expected {
                return Err(StoreError::Conflict(format!(
                    "ride is {}, not {}",
                    ride.status.as_str(),
                    expected.as_str()
                )));
            }
            ride.apply(patch);
            Ok(ride)
        })
        .await
    }

    async fn accept_ride(&self, ride_id: &str, driver_id: &str) -> Result<Ride, StoreError> {
        self.guarded_ride_write(ride_id, "ride no longer available", |mut ride| {
            if ride.status != RideStatus::Pending {
                return Err(StoreError::Conflict("ride no longer available".to_string()));
            }
            ride.driver_id = Some(driver_id.to_string());
            ride.status = RideStatus::Accepted;
            ride.accepted_at = Some(now_rfc3339());
            Ok(ride)
        })
        .await
    }

    // ─── Satellite Records ───────────────────────────────────────

    async fn create_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        self.upsert(collections::PAYMENTS, &payment.id, payment)
            .await
    }

    async fn update_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> Result<Payment, StoreError> {
        let mut payment: Payment = self
            .get_by_id(collections::PAYMENTS, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("payment {}", id)))?;
        payment.status = status;
        self.upsert(collections::PAYMENTS, id, &payment).await?;
        Ok(payment)
    }

    async fn create_rating(&self, rating: &Rating) -> Result<(), StoreError> {
        self.upsert(collections::RATINGS, &rating.id, rating).await
    }

    async fn get_ride_rating(&self, ride_id: &str) -> Result<Option<Rating>, StoreError> {
        let ride_id = ride_id.to_string();
        let mut ratings: Vec<Rating> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RATINGS)
            .filter(move |q| q.field("ride_id").eq(ride_id.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(ratings.pop())
    }

    async fn get_ratings_for_user(&self, ratee_id: &str) -> Result<Vec<Rating>, StoreError> {
        let ratee_id = ratee_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RATINGS)
            .filter(move |q| q.field("ratee_id").eq(ratee_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::BADGES)
            .order_by([(
                "threshold_points",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn award_badge(&self, user_badge: &UserBadge) -> Result<(), StoreError> {
        let doc_id = format!("{}_{}", user_badge.user_id, user_badge.badge_id);
        self.upsert(collections::USER_BADGES, &doc_id, user_badge)
            .await
    }

    async fn get_user_badges(&self, user_id: &str) -> Result<Vec<UserBadge>, StoreError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USER_BADGES)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn create_referral(&self, referral: &Referral) -> Result<(), StoreError> {
        self.upsert(collections::REFERRALS, &referral.code, referral)
            .await
    }

    async fn get_referral(&self, code: &str) -> Result<Option<Referral>, StoreError> {
        self.get_by_id(collections::REFERRALS, code).await
    }

    // ─── Aggregates ──────────────────────────────────────────────

    async fn rider_stats(&self, user_id: &str) -> Result<RiderStats, StoreError> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;

        let rides = self.get_user_rides(user_id, Role::Rider).await?;
        let completed_rides = rides
            .iter()
            .filter(|r| r.status == RideStatus::Completed)
            .count() as u64;
        let badge_count = self.get_user_badges(user_id).await?.len() as u64;

        Ok(RiderStats {
            completed_rides,
            eco_points: user.eco_points,
            co2_saved_kg: user.co2_saved_kg,
            badge_count,
        })
    }

    async fn driver_stats(&self, user_id: &str) -> Result<DriverStats, StoreError> {
        let profile = self
            .get_driver_profile(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("driver profile {}", user_id)))?;

        let rides = self.get_user_rides(user_id, Role::Driver).await?;

        Ok(DriverStats {
            total_rides: profile.total_rides,
            total_earnings: profile.total_earnings,
            today_earnings: crate::models::stats::today_earnings(&rides),
            rating: profile.rating,
            available: profile.available,
        })
    }

    async fn admin_stats(&self) -> Result<AdminStats, StoreError> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rides: Vec<Ride> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RIDES)
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut stats = AdminStats {
            total_users: users.len() as u64,
            total_drivers: users.iter().filter(|u| u.role == Role::Driver).count() as u64,
            total_rides: 0,
            completed_rides: 0,
            total_revenue: 0.0,
            total_co2_saved_kg: 0.0,
            rides_by_vehicle_type: Default::default(),
        };
        crate::models::stats::fold_admin_totals(&mut stats, &rides);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_reports_offline() {
        let store = FirestoreStore::new_mock();
        assert!(store.database().is_none());

        let err = store.get_user("anyone").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
