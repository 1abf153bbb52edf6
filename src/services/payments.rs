// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment processor seam.
//!
//! The platform never moves money itself; it records intents created
//! with an external processor. Processor failures surface as `External`
//! and never change ride state.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Reference to an intent created with the external processor.
#[derive(Debug, Clone)]
pub struct PaymentHandle {
    pub provider_ref: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(&self, amount: f64, currency: &str) -> Result<PaymentHandle>;
}

/// In-process stand-in used for tests and local development. Rejects
/// non-positive amounts the way a real processor would.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentProcessor;

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_intent(&self, amount: f64, currency: &str) -> Result<PaymentHandle> {
        if amount <= 0.0 {
            return Err(AppError::External(format!(
                "processor rejected amount {} {}",
                amount, currency
            )));
        }
        Ok(PaymentHandle {
            provider_ref: format!("mock_pi_{}", Uuid::new_v4()),
        })
    }
}
