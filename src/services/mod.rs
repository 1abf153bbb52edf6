// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! External collaborators, specified at their interface boundary:
//! fare/CO₂ calculation, identity verification, payment processing.

pub mod fare;
pub mod identity;
pub mod payments;

pub use fare::{FareCalculator, FareQuote, StandardFareCalculator};
pub use identity::{ExternalIdentity, HttpIdentityVerifier, IdentityVerifier, MockVerifier};
pub use payments::{MockPaymentProcessor, PaymentHandle, PaymentProcessor};
