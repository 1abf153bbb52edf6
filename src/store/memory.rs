// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory backing store.
//!
//! Process-local maps, no durability. This is the backend used by tests
//! and local development; it must stay logically equivalent to the
//! Postgres and Firestore implementations for identical operation
//! sequences.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::{
    AdminStats, Badge, DriverProfile, DriverProfilePatch, DriverStats, Payment, PaymentStatus,
    Rating, Referral, Ride, RidePatch, RiderStats, RideStatus, Role, User, UserBadge, UserPatch,
};
use crate::store::{default_badges, Store, StoreError};
use crate::time_utils::now_rfc3339;

/// In-memory store backed by dashmap.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    driver_profiles: DashMap<String, DriverProfile>,
    rides: DashMap<String, Ride>,
    payments: DashMap<String, Payment>,
    ratings: DashMap<String, Rating>,
    badges: Vec<Badge>,
    user_badges: DashMap<String, Vec<UserBadge>>,
    referrals: DashMap<String, Referral>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            badges: default_badges(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn get_user_by_external_auth(&self, subject: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.external_auth_id.as_deref() == Some(subject))
            .map(|u| u.clone()))
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, StoreError> {
        let mut entry = self
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;
        entry.apply(patch, &now_rfc3339());
        Ok(entry.clone())
    }

    // ─── Driver Profiles ─────────────────────────────────────────

    async fn get_driver_profile(&self, user_id: &str) -> Result<Option<DriverProfile>, StoreError> {
        Ok(self.driver_profiles.get(user_id).map(|p| p.clone()))
    }

    async fn create_driver_profile(&self, profile: &DriverProfile) -> Result<(), StoreError> {
        self.driver_profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn update_driver_profile(
        &self,
        user_id: &str,
        patch: &DriverProfilePatch,
    ) -> Result<DriverProfile, StoreError> {
        let mut entry = self
            .driver_profiles
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("driver profile {}", user_id)))?;
        entry.apply(patch, &now_rfc3339());
        Ok(entry.clone())
    }

    // ─── Rides ───────────────────────────────────────────────────

    async fn create_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        self.rides.insert(ride.id.clone(), ride.clone());
        Ok(())
    }

    async fn get_ride(&self, id: &str) -> Result<Option<Ride>, StoreError> {
        Ok(self.rides.get(id).map(|r| r.clone()))
    }

    async fn get_user_rides(&self, user_id: &str, role: Role) -> Result<Vec<Ride>, StoreError> {
        let mut rides: Vec<Ride> = self
            .rides
            .iter()
            .filter(|r| match role {
                Role::Driver => r.driver_id.as_deref() == Some(user_id),
                _ => r.rider_id == user_id,
            })
            .map(|r| r.clone())
            .collect();
        rides.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(rides)
    }

    async fn get_pending_rides(&self) -> Result<Vec<Ride>, StoreError> {
        let mut rides: Vec<Ride> = self
            .rides
            .iter()
            .filter(|r| r.status == RideStatus::Pending)
            .map(|r| r.clone())
            .collect();
        // Oldest first: the earliest requester is served first.
        rides.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(rides)
    }

    async fn get_active_rides(&self) -> Result<Vec<Ride>, StoreError> {
        let mut rides: Vec<Ride> = self
            .rides
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.clone())
            .collect();
        rides.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(rides)
    }

    async fn transition_ride(
        &self,
        id: &str,
        expected: RideStatus,
        patch: &RidePatch,
    ) -> Result<Ride, StoreError> {
        // Same critical section as accept_ride: the status check and the
        // merge happen under the entry lock.
        let mut entry = self
            .rides
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("ride {}", id)))?;

        if entry.status != expected {
            return Err(StoreError::Conflict(format!(
                "ride is {}, not {}",
                entry.status.as_str(),
                expected.as_str()
            )));
        }

        entry.apply(patch);
        Ok(entry.clone())
    }

    async fn accept_ride(&self, ride_id: &str, driver_id: &str) -> Result<Ride, StoreError> {
        // The dashmap entry reference holds the shard lock, so the
        // check-then-set below is a single critical section per ride id.
        let mut entry = self
            .rides
            .get_mut(ride_id)
            .ok_or_else(|| StoreError::NotFound(format!("ride {}", ride_id)))?;

        if entry.status != RideStatus::Pending {
            return Err(StoreError::Conflict("ride no longer available".to_string()));
        }

        entry.driver_id = Some(driver_id.to_string());
        entry.status = RideStatus::Accepted;
        entry.accepted_at = Some(now_rfc3339());
        Ok(entry.clone())
    }

    // ─── Satellite Records ───────────────────────────────────────

    async fn create_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        self.payments.insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn update_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> Result<Payment, StoreError> {
        let mut entry = self
            .payments
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("payment {}", id)))?;
        entry.status = status;
        Ok(entry.clone())
    }

    async fn create_rating(&self, rating: &Rating) -> Result<(), StoreError> {
        self.ratings.insert(rating.id.clone(), rating.clone());
        Ok(())
    }

    async fn get_ride_rating(&self, ride_id: &str) -> Result<Option<Rating>, StoreError> {
        Ok(self
            .ratings
            .iter()
            .find(|r| r.ride_id == ride_id)
            .map(|r| r.clone()))
    }

    async fn get_ratings_for_user(&self, ratee_id: &str) -> Result<Vec<Rating>, StoreError> {
        Ok(self
            .ratings
            .iter()
            .filter(|r| r.ratee_id == ratee_id)
            .map(|r| r.clone())
            .collect())
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, StoreError> {
        Ok(self.badges.clone())
    }

    async fn award_badge(&self, user_badge: &UserBadge) -> Result<(), StoreError> {
        self.user_badges
            .entry(user_badge.user_id.clone())
            .or_default()
            .push(user_badge.clone());
        Ok(())
    }

    async fn get_user_badges(&self, user_id: &str) -> Result<Vec<UserBadge>, StoreError> {
        Ok(self
            .user_badges
            .get(user_id)
            .map(|b| b.clone())
            .unwrap_or_default())
    }

    async fn create_referral(&self, referral: &Referral) -> Result<(), StoreError> {
        self.referrals
            .insert(referral.code.clone(), referral.clone());
        Ok(())
    }

    async fn get_referral(&self, code: &str) -> Result<Option<Referral>, StoreError> {
        Ok(self.referrals.get(code).map(|r| r.clone()))
    }

    // ─── Aggregates ──────────────────────────────────────────────

    async fn rider_stats(&self, user_id: &str) -> Result<RiderStats, StoreError> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;

        let completed_rides = self
            .rides
            .iter()
            .filter(|r| r.rider_id == user_id && r.status == RideStatus::Completed)
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
        let mut stats = AdminStats {
            total_users: self.users.len() as u64,
            total_drivers: self
                .users
                .iter()
                .filter(|u| u.role == Role::Driver)
                .count() as u64,
            total_rides: 0,
            completed_rides: 0,
            total_revenue: 0.0,
            total_co2_saved_kg: 0.0,
            rides_by_vehicle_type: Default::default(),
        };

        let rides: Vec<Ride> = self.rides.iter().map(|r| r.clone()).collect();
        crate::models::stats::fold_admin_totals(&mut stats, &rides);
        Ok(stats)
    }
}
