//! Satellite records keyed to rides and users: payments, ratings,
//! badges, referrals. Created once at a well-defined lifecycle point,
//! immutable afterwards except for status fields.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Succeeded,
    Failed,
}

/// Payment record for a ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub ride_id: String,
    pub rider_id: String,
    pub amount: f64,
    /// e.g. "upi", "card", "cash"
    pub method: String,
    pub status: PaymentStatus,
    /// Opaque handle from the payment processor
    pub provider_ref: String,
    pub created_at: String,
}

/// Rating left for the counterparty of a completed ride. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: String,
    pub ride_id: String,
    pub rater_id: String,
    pub ratee_id: String,
    /// 1..=5
    pub stars: u8,
    pub comment: Option<String>,
    pub created_at: String,
}

/// Eco achievement, awarded when a rider's point total crosses the
/// threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub threshold_points: u64,
}

/// Join record: a badge held by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_id: String,
    pub badge_id: String,
    pub awarded_at: String,
}

/// Referral code record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub code: String,
    pub referrer_id: String,
    pub redeemed_by: Option<String>,
    pub created_at: String,
}
