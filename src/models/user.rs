//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User role. Mutually exclusive and fixed after first assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Rider,
    Driver,
    Admin,
}

/// Identity record. Created on first profile completion, never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable id (uuid, also used as document ID)
    pub id: String,
    /// Subject id from the external identity provider
    pub external_auth_id: Option<String>,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// Accumulated eco points (incremented on ride completion)
    pub eco_points: u64,
    /// Accumulated CO₂ saved, kilograms
    pub co2_saved_kg: f64,
    /// Shareable referral code
    pub referral_code: String,
    pub active: bool,
    /// When the user was created (RFC 3339)
    pub created_at: String,
    /// Refreshed on every partial update (RFC 3339)
    pub updated_at: String,
}

/// Partial update for a user. `None` fields are left untouched;
/// counters are deltas, not replacements.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub active: Option<bool>,
    /// Added to the current eco point total
    pub add_eco_points: Option<u64>,
    /// Added to the current CO₂ total
    pub add_co2_saved_kg: Option<f64>,
}

impl User {
    /// Apply a partial update in place, refreshing `updated_at`.
    pub fn apply(&mut self, patch: &UserPatch, now: &str) {
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(name) = &patch.display_name {
            self.display_name = name.clone();
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(points) = patch.add_eco_points {
            self.eco_points += points;
        }
        if let Some(co2) = patch.add_co2_saved_kg {
            self.co2_saved_kg += co2;
        }
        self.updated_at = now.to_string();
    }
}
