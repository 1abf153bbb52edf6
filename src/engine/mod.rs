// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride lifecycle engine.
//!
//! All ride mutations go through here: the engine enforces role and
//! ownership guards, delegates the contended pending -> accepted
//! transition to the store's atomic `accept_ride`, applies completion
//! side effects, and emits live events.
//!
//! Event emission is direct for backends without a change feed; when the
//! Firestore bridge is active the engine stays quiet about ride/driver
//! changes so each event reaches the bus exactly once. Location updates
//! never touch storage and are always published directly.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::events::{EventBus, LiveEvent};
use crate::models::{
    DriverProfile, DriverProfilePatch, LocationPoint, Payment, PaymentStatus, Rating, Ride,
    RidePatch, RideStatus, Role, User, UserBadge, UserPatch, VehicleDescriptor, VehicleType,
    VerificationStatus,
};
use crate::services::{FareCalculator, PaymentProcessor};
use crate::store::Store;
use crate::time_utils::now_rfc3339;

pub struct RideEngine {
    store: Arc<dyn Store>,
    bus: EventBus,
    fare: Arc<dyn FareCalculator>,
    payments: Arc<dyn PaymentProcessor>,
    /// False when the Firestore change-feed bridge publishes ride and
    /// driver events instead of the engine.
    emits_direct: bool,
}

impl RideEngine {
    pub fn new(
        store: Arc<dyn Store>,
        bus: EventBus,
        fare: Arc<dyn FareCalculator>,
        payments: Arc<dyn PaymentProcessor>,
        emits_direct: bool,
    ) -> Self {
        Self {
            store,
            bus,
            fare,
            payments,
            emits_direct,
        }
    }

    fn emit(&self, event: LiveEvent) {
        if self.emits_direct {
            self.bus.publish(event);
        }
    }

    /// Create a pending ride for a rider. The fare quote is computed here
    /// and frozen on the ride; later pricing changes never affect it.
    pub async fn create_ride(
        &self,
        caller: &User,
        pickup: LocationPoint,
        dropoff: LocationPoint,
        vehicle_type: VehicleType,
    ) -> Result<Ride> {
        if caller.role != Role::Rider {
            return Err(AppError::Forbidden(
                "only riders can request rides".to_string(),
            ));
        }

        let quote = self.fare.quote(&pickup, &dropoff, vehicle_type);
        let ride = Ride {
            id: Uuid::new_v4().to_string(),
            rider_id: caller.id.clone(),
            driver_id: None,
            pickup,
            dropoff,
            vehicle_type,
            status: RideStatus::Pending,
            estimated_fare: quote.estimated_fare,
            actual_fare: None,
            distance_km: quote.distance_km,
            co2_saved_kg: quote.co2_saved_kg,
            eco_points: quote.eco_points,
            requested_at: now_rfc3339(),
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        };

        self.store.create_ride(&ride).await?;
        tracing::info!(ride_id = %ride.id, rider_id = %caller.id, "Ride requested");

        self.emit(LiveEvent::RideAdded { ride: ride.clone() });
        Ok(ride)
    }

    /// Claim a pending ride. Under contention exactly one caller wins;
    /// everyone else gets `Conflict`.
    pub async fn accept_ride(&self, caller: &User, ride_id: &str) -> Result<Ride> {
        if caller.role != Role::Driver {
            return Err(AppError::Forbidden(
                "only drivers can accept rides".to_string(),
            ));
        }
        let profile = self
            .store
            .get_driver_profile(&caller.id)
            .await?
            .ok_or_else(|| AppError::NotFound("driver profile".to_string()))?;
        if !profile.available {
            return Err(AppError::Conflict("driver is not available".to_string()));
        }

        let ride = self.store.accept_ride(ride_id, &caller.id).await?;
        tracing::info!(ride_id, driver_id = %caller.id, "Ride accepted");

        self.emit(LiveEvent::RideUpdated { ride: ride.clone() });
        Ok(ride)
    }

    /// Begin the trip. Only the assigned driver may start; a driver may
    /// also start a still-unclaimed ride, which claims it first through
    /// the same atomic accept path.
    pub async fn start_ride(&self, caller: &User, ride_id: &str) -> Result<Ride> {
        if caller.role != Role::Driver {
            return Err(AppError::Forbidden(
                "only drivers can start rides".to_string(),
            ));
        }
        let mut ride = self.get_ride(ride_id).await?;

        match &ride.driver_id {
            Some(driver_id) if driver_id != &caller.id => {
                return Err(AppError::Forbidden("not your ride".to_string()));
            }
            Some(_) => {}
            None => {
                // Unclaimed: go through the atomic accept so a racing
                // driver cannot end up co-assigned.
                ride = self.store.accept_ride(ride_id, &caller.id).await?;
            }
        }

        if ride.status != RideStatus::Accepted {
            return Err(AppError::Conflict(format!(
                "ride is {}, not accepted",
                ride.status.as_str()
            )));
        }

        // Conditional on still being accepted, so a cancel that slipped
        // in between the read and here surfaces as Conflict.
        let ride = self
            .store
            .transition_ride(
                ride_id,
                RideStatus::Accepted,
                &RidePatch {
                    status: Some(RideStatus::InProgress),
                    started_at: Some(now_rfc3339()),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(ride_id, driver_id = %caller.id, "Ride started");

        self.emit(LiveEvent::RideUpdated { ride: ride.clone() });
        Ok(ride)
    }

    /// Finish the trip and apply completion side effects: rider eco
    /// counters (plus any badge thresholds crossed) and driver totals.
    ///
    /// The ride reaches `completed` first; a failure applying either
    /// counter afterwards is logged and surfaced, leaving the ride
    /// terminal and the counters short until retried out of band.
    pub async fn complete_ride(
        &self,
        caller: &User,
        ride_id: &str,
        actual_fare: Option<f64>,
    ) -> Result<Ride> {
        if caller.role != Role::Driver {
            return Err(AppError::Forbidden(
                "only drivers can complete rides".to_string(),
            ));
        }
        let ride = self.get_ride(ride_id).await?;
        if ride.driver_id.as_deref() != Some(caller.id.as_str()) {
            return Err(AppError::Forbidden("not your ride".to_string()));
        }
        if ride.status != RideStatus::InProgress {
            return Err(AppError::Conflict(format!(
                "ride is {}, not in progress",
                ride.status.as_str()
            )));
        }

        let fare = actual_fare.unwrap_or(ride.estimated_fare);
        // Conditional on still being in progress: of two concurrent
        // completes exactly one lands, so the counters below apply once.
        let ride = self
            .store
            .transition_ride(
                ride_id,
                RideStatus::InProgress,
                &RidePatch {
                    status: Some(RideStatus::Completed),
                    actual_fare: Some(fare),
                    completed_at: Some(now_rfc3339()),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(ride_id, fare, "Ride completed");

        let rider = self
            .store
            .update_user(
                &ride.rider_id,
                &UserPatch {
                    add_eco_points: Some(ride.eco_points),
                    add_co2_saved_kg: Some(ride.co2_saved_kg),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                tracing::error!(ride_id, error = %e, "Ride completed but rider counters were not applied");
                e
            })?;

        if let Err(e) = self.award_crossed_badges(&rider, ride.eco_points).await {
            tracing::warn!(ride_id, rider_id = %rider.id, error = %e, "Badge award failed");
        }

        self.store
            .update_driver_profile(
                &caller.id,
                &DriverProfilePatch {
                    add_rides: Some(1),
                    add_earnings: Some(fare),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                tracing::error!(ride_id, error = %e, "Ride completed but driver counters were not applied");
                e
            })?;

        self.emit(LiveEvent::RideUpdated { ride: ride.clone() });
        Ok(ride)
    }

    /// Award badges whose threshold the rider's point total just crossed.
    async fn award_crossed_badges(&self, rider: &User, added_points: u64) -> Result<()> {
        let before = rider.eco_points.saturating_sub(added_points);
        let held: Vec<String> = self
            .store
            .get_user_badges(&rider.id)
            .await?
            .into_iter()
            .map(|b| b.badge_id)
            .collect();

        for badge in self.store.list_badges().await? {
            let crossed = before < badge.threshold_points && rider.eco_points >= badge.threshold_points;
            if !crossed || held.contains(&badge.id) {
                continue;
            }
            self.store
                .award_badge(&UserBadge {
                    user_id: rider.id.clone(),
                    badge_id: badge.id.clone(),
                    awarded_at: now_rfc3339(),
                })
                .await?;
            tracing::info!(user_id = %rider.id, badge_id = %badge.id, "Badge awarded");
        }
        Ok(())
    }

    /// Cancel a ride. Allowed for the rider, the assigned driver, or an
    /// admin, and only before the trip starts.
    pub async fn cancel_ride(&self, caller: &User, ride_id: &str) -> Result<Ride> {
        let ride = self.get_ride(ride_id).await?;

        let is_rider = ride.rider_id == caller.id;
        let is_assigned_driver = ride.driver_id.as_deref() == Some(caller.id.as_str());
        if !is_rider && !is_assigned_driver && caller.role != Role::Admin {
            return Err(AppError::Forbidden(
                "not a participant in this ride".to_string(),
            ));
        }
        if !ride.status.can_transition_to(RideStatus::Cancelled) {
            return Err(AppError::Conflict(format!(
                "ride is {} and can no longer be cancelled",
                ride.status.as_str()
            )));
        }

        // Conditional on the status we authorized against, and the driver
        // is unassigned so driver_id stays set only on accepted,
        // in_progress and completed rides.
        let ride = self
            .store
            .transition_ride(
                ride_id,
                ride.status,
                &RidePatch {
                    clear_driver: true,
                    status: Some(RideStatus::Cancelled),
                    cancelled_at: Some(now_rfc3339()),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(ride_id, user_id = %caller.id, "Ride cancelled");

        self.emit(LiveEvent::RideUpdated { ride: ride.clone() });
        Ok(ride)
    }

    /// Create or update the caller's driver profile.
    pub async fn upsert_driver_profile(
        &self,
        caller: &User,
        vehicle: VehicleDescriptor,
        license_number: String,
    ) -> Result<DriverProfile> {
        if caller.role != Role::Driver {
            return Err(AppError::Forbidden(
                "only drivers have a driver profile".to_string(),
            ));
        }

        let existing = self.store.get_driver_profile(&caller.id).await?;
        let profile = match existing {
            Some(_) => {
                let profile = self
                    .store
                    .update_driver_profile(
                        &caller.id,
                        &DriverProfilePatch {
                            vehicle: Some(vehicle),
                            license_number: Some(license_number),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.emit(LiveEvent::DriverUpdated {
                    profile: profile.clone(),
                });
                profile
            }
            None => {
                let profile = DriverProfile {
                    user_id: caller.id.clone(),
                    vehicle,
                    license_number,
                    verification: VerificationStatus::Pending,
                    rating: 5.0,
                    total_rides: 0,
                    total_earnings: 0.0,
                    available: false,
                    updated_at: now_rfc3339(),
                };
                self.store.create_driver_profile(&profile).await?;
                self.emit(LiveEvent::DriverAdded {
                    profile: profile.clone(),
                });
                profile
            }
        };
        Ok(profile)
    }

    /// Toggle the caller's accept eligibility.
    pub async fn set_availability(&self, caller: &User, available: bool) -> Result<DriverProfile> {
        if caller.role != Role::Driver {
            return Err(AppError::Forbidden(
                "only drivers have availability".to_string(),
            ));
        }
        let profile = self
            .store
            .update_driver_profile(
                &caller.id,
                &DriverProfilePatch {
                    available: Some(available),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(driver_id = %caller.id, available, "Driver availability changed");

        self.emit(LiveEvent::DriverUpdated {
            profile: profile.clone(),
        });
        Ok(profile)
    }

    /// Rate the counterparty of a completed ride. One rating per ride;
    /// ratings for a driver fold into the profile's running mean.
    pub async fn submit_rating(
        &self,
        caller: &User,
        ride_id: &str,
        stars: u8,
        comment: Option<String>,
    ) -> Result<Rating> {
        if !(1..=5).contains(&stars) {
            return Err(AppError::BadRequest(
                "stars must be between 1 and 5".to_string(),
            ));
        }
        let ride = self.get_ride(ride_id).await?;
        if ride.status != RideStatus::Completed {
            return Err(AppError::Conflict(
                "only completed rides can be rated".to_string(),
            ));
        }

        let ratee_id = if ride.rider_id == caller.id {
            ride.driver_id
                .clone()
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("completed ride without driver")))?
        } else if ride.driver_id.as_deref() == Some(caller.id.as_str()) {
            ride.rider_id.clone()
        } else {
            return Err(AppError::Forbidden(
                "not a participant in this ride".to_string(),
            ));
        };

        if self.store.get_ride_rating(ride_id).await?.is_some() {
            return Err(AppError::Conflict("ride already rated".to_string()));
        }

        let rating = Rating {
            id: Uuid::new_v4().to_string(),
            ride_id: ride_id.to_string(),
            rater_id: caller.id.clone(),
            ratee_id: ratee_id.clone(),
            stars,
            comment,
            created_at: now_rfc3339(),
        };
        self.store.create_rating(&rating).await?;

        // Driver ratings feed the profile; rider ratings are record-only.
        if ride.driver_id.as_deref() == Some(ratee_id.as_str()) {
            let received = self.store.get_ratings_for_user(&ratee_id).await?;
            if !received.is_empty() {
                let mean = received.iter().map(|r| r.stars as f64).sum::<f64>()
                    / received.len() as f64;
                let profile = self
                    .store
                    .update_driver_profile(
                        &ratee_id,
                        &DriverProfilePatch {
                            rating: Some((mean * 100.0).round() / 100.0),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.emit(LiveEvent::DriverUpdated { profile });
            }
        }

        Ok(rating)
    }

    /// Record a payment for a completed ride. The mock processor settles
    /// synchronously; a real integration would confirm via webhook.
    pub async fn record_payment(
        &self,
        caller: &User,
        ride_id: &str,
        method: String,
    ) -> Result<Payment> {
        let ride = self.get_ride(ride_id).await?;
        if ride.rider_id != caller.id {
            return Err(AppError::Forbidden("not your ride".to_string()));
        }
        if ride.status != RideStatus::Completed {
            return Err(AppError::Conflict(
                "only completed rides can be paid".to_string(),
            ));
        }

        let amount = ride.actual_fare.unwrap_or(ride.estimated_fare);
        let handle = self.payments.create_intent(amount, "INR").await?;

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            ride_id: ride_id.to_string(),
            rider_id: caller.id.clone(),
            amount,
            method,
            status: PaymentStatus::Created,
            provider_ref: handle.provider_ref,
            created_at: now_rfc3339(),
        };
        self.store.create_payment(&payment).await?;

        let payment = self
            .store
            .update_payment_status(&payment.id, PaymentStatus::Succeeded)
            .await?;
        tracing::info!(ride_id, payment_id = %payment.id, amount, "Payment recorded");
        Ok(payment)
    }

    /// Relay a position sample to everyone watching. Never persisted, so
    /// this publishes regardless of which backend is active.
    pub fn publish_location(&self, caller: &User, ride_id: &str, lat: f64, lng: f64) {
        self.bus.publish(LiveEvent::LocationUpdate {
            ride_id: ride_id.to_string(),
            sender_role: caller.role,
            lat,
            lng,
        });
    }

    async fn get_ride(&self, ride_id: &str) -> Result<Ride> {
        self.store
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ride {}", ride_id)))
    }
}
