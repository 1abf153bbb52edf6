// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod driver;
pub mod payment;
pub mod ride;
pub mod stats;
pub mod user;

pub use driver::{DriverProfile, DriverProfilePatch, VehicleDescriptor, VerificationStatus};
pub use payment::{Badge, Payment, PaymentStatus, Rating, Referral, UserBadge};
pub use ride::{LocationPoint, Ride, RidePatch, RideStatus, VehicleType};
pub use stats::{AdminStats, DriverStats, RiderStats};
pub use user::{Role, User, UserPatch};
