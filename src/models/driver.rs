//! Driver profile model.

use serde::{Deserialize, Serialize};

use crate::models::ride::VehicleType;

/// Driver document verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

/// The driver's vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleDescriptor {
    pub vehicle_type: VehicleType,
    pub model: String,
    pub plate: String,
}

/// 1:1 with a `User` of role `driver`, keyed by the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
    pub user_id: String,
    pub vehicle: VehicleDescriptor,
    pub license_number: String,
    pub verification: VerificationStatus,
    /// Running mean of ratings received
    pub rating: f64,
    pub total_rides: u64,
    pub total_earnings: f64,
    /// Gates accept eligibility. The most contended field in the system:
    /// toggled by the driver, read by every matching attempt.
    pub available: bool,
    pub updated_at: String,
}

/// Partial update for a driver profile. Counter fields are deltas.
#[derive(Debug, Clone, Default)]
pub struct DriverProfilePatch {
    pub vehicle: Option<VehicleDescriptor>,
    pub license_number: Option<String>,
    pub verification: Option<VerificationStatus>,
    pub rating: Option<f64>,
    pub available: Option<bool>,
    pub add_rides: Option<u64>,
    pub add_earnings: Option<f64>,
}

impl DriverProfile {
    /// Apply a partial update in place, refreshing `updated_at`.
    pub fn apply(&mut self, patch: &DriverProfilePatch, now: &str) {
        if let Some(vehicle) = &patch.vehicle {
            self.vehicle = vehicle.clone();
        }
        if let Some(license) = &patch.license_number {
            self.license_number = license.clone();
        }
        if let Some(verification) = patch.verification {
            self.verification = verification;
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(available) = patch.available {
            self.available = available;
        }
        if let Some(rides) = patch.add_rides {
            self.total_rides += rides;
        }
        if let Some(earnings) = patch.add_earnings {
            self.total_earnings += earnings;
        }
        self.updated_at = now.to_string();
    }
}
