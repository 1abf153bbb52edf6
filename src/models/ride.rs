//! Ride model and the ride lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Requested vehicle class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    ERickshaw,
    EBike,
    ECar,
    CngAuto,
}

impl VehicleType {
    /// Wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::ERickshaw => "e_rickshaw",
            VehicleType::EBike => "e_bike",
            VehicleType::ECar => "e_car",
            VehicleType::CngAuto => "cng_auto",
        }
    }
}

/// Ride lifecycle status.
///
/// ```text
/// pending -> accepted -> in_progress -> completed
/// pending | accepted -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Whether the state machine permits `self -> next`.
    pub fn can_transition_to(&self, next: RideStatus) -> bool {
        matches!(
            (self, next),
            (RideStatus::Pending, RideStatus::Accepted)
                | (RideStatus::Pending, RideStatus::Cancelled)
                | (RideStatus::Accepted, RideStatus::InProgress)
                | (RideStatus::Accepted, RideStatus::Cancelled)
                | (RideStatus::InProgress, RideStatus::Completed)
        )
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

/// A named coordinate (pickup or dropoff).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPoint {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

/// One rider-requested trip, from creation to terminal state.
///
/// Invariant: `driver_id` is set iff status is accepted, in_progress or
/// completed. Fare/distance/CO₂ values are frozen at creation; only
/// `actual_fare` may be set later (at completion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: String,
    pub rider_id: String,
    pub driver_id: Option<String>,
    pub pickup: LocationPoint,
    pub dropoff: LocationPoint,
    pub vehicle_type: VehicleType,
    pub status: RideStatus,
    pub estimated_fare: f64,
    pub actual_fare: Option<f64>,
    pub distance_km: f64,
    pub co2_saved_kg: f64,
    pub eco_points: u64,
    // Timestamp trail (RFC 3339)
    pub requested_at: String,
    pub accepted_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
}

/// Partial update for a ride.
///
/// Note: the pending -> accepted transition is NOT expressed as a patch;
/// it goes through the store's atomic `accept_ride` so concurrent accepts
/// cannot both win.
#[derive(Debug, Clone, Default)]
pub struct RidePatch {
    pub driver_id: Option<String>,
    /// Unassign the driver. Used when cancelling an accepted ride so the
    /// driver_id iff accepted/in_progress/completed invariant holds.
    pub clear_driver: bool,
    pub status: Option<RideStatus>,
    pub actual_fare: Option<f64>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
}

impl Ride {
    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &RidePatch) {
        if patch.clear_driver {
            self.driver_id = None;
        } else if let Some(driver_id) = &patch.driver_id {
            self.driver_id = Some(driver_id.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(fare) = patch.actual_fare {
            self.actual_fare = Some(fare);
        }
        if let Some(ts) = &patch.started_at {
            self.started_at = Some(ts.clone());
        }
        if let Some(ts) = &patch.completed_at {
            self.completed_at = Some(ts.clone());
        }
        if let Some(ts) = &patch.cancelled_at {
            self.cancelled_at = Some(ts.clone());
        }
    }

    /// True while the ride counts as active (driver en route or on trip).
    pub fn is_active(&self) -> bool {
        matches!(self.status, RideStatus::Accepted | RideStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(RideStatus::Pending.can_transition_to(RideStatus::Accepted));
        assert!(RideStatus::Accepted.can_transition_to(RideStatus::InProgress));
        assert!(RideStatus::InProgress.can_transition_to(RideStatus::Completed));
    }

    #[test]
    fn test_cancellation_only_before_start() {
        assert!(RideStatus::Pending.can_transition_to(RideStatus::Cancelled));
        assert!(RideStatus::Accepted.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::InProgress.can_transition_to(RideStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [RideStatus::Completed, RideStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                RideStatus::Pending,
                RideStatus::Accepted,
                RideStatus::InProgress,
                RideStatus::Completed,
                RideStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_no_backward_or_skipping_transitions() {
        assert!(!RideStatus::Pending.can_transition_to(RideStatus::InProgress));
        assert!(!RideStatus::Pending.can_transition_to(RideStatus::Completed));
        assert!(!RideStatus::Accepted.can_transition_to(RideStatus::Pending));
        assert!(!RideStatus::InProgress.can_transition_to(RideStatus::Accepted));
    }

    #[test]
    fn test_cancel_patch_unassigns_driver() {
        let mut ride = Ride {
            id: "r1".to_string(),
            rider_id: "rider-1".to_string(),
            driver_id: Some("driver-1".to_string()),
            pickup: LocationPoint {
                address: "A".to_string(),
                lat: 28.61,
                lng: 77.20,
            },
            dropoff: LocationPoint {
                address: "B".to_string(),
                lat: 28.63,
                lng: 77.22,
            },
            vehicle_type: VehicleType::ERickshaw,
            status: RideStatus::Accepted,
            estimated_fare: 80.0,
            actual_fare: None,
            distance_km: 3.1,
            co2_saved_kg: 0.6,
            eco_points: 6,
            requested_at: "2026-01-01T00:00:00+00:00".to_string(),
            accepted_at: Some("2026-01-01T00:01:00+00:00".to_string()),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        };

        ride.apply(&RidePatch {
            clear_driver: true,
            status: Some(RideStatus::Cancelled),
            cancelled_at: Some("2026-01-01T00:02:00+00:00".to_string()),
            ..Default::default()
        });

        assert_eq!(ride.status, RideStatus::Cancelled);
        assert_eq!(ride.driver_id, None);
    }

    #[test]
    fn test_vehicle_type_wire_names() {
        let json = serde_json::to_string(&VehicleType::ERickshaw).unwrap();
        assert_eq!(json, "\"e_rickshaw\"");
        assert_eq!(VehicleType::ERickshaw.as_str(), "e_rickshaw");
    }
}
