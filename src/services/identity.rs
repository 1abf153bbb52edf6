// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound verification of login credentials against the external
//! identity provider.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// What the provider tells us about a verified credential.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    /// Provider-scoped stable subject id.
    pub subject: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify an opaque credential and return the identity behind it.
    ///
    /// A credential the provider rejects maps to `Unauthorized`; a
    /// provider we cannot reach maps to `External`.
    async fn verify(&self, credential: &str) -> Result<ExternalIdentity>;
}

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    sub: String,
    email: Option<String>,
}

/// Verifies credentials with an HTTP tokeninfo-style endpoint.
pub struct HttpIdentityVerifier {
    http_client: reqwest::Client,
    verify_url: String,
}

impl HttpIdentityVerifier {
    pub fn new(verify_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            verify_url,
        }
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<ExternalIdentity> {
        let response = self
            .http_client
            .get(&self.verify_url)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| AppError::External(format!("identity provider unreachable: {}", e)))?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST
            || response.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(AppError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "identity provider returned {}",
                response.status()
            )));
        }

        let info: TokenInfoResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("bad identity response: {}", e)))?;

        Ok(ExternalIdentity {
            subject: info.sub,
            email: info.email,
        })
    }
}

/// Offline verifier for tests and local development: accepts any
/// credential of the form `mock-<subject>`.
#[derive(Debug, Clone, Default)]
pub struct MockVerifier;

#[async_trait]
impl IdentityVerifier for MockVerifier {
    async fn verify(&self, credential: &str) -> Result<ExternalIdentity> {
        let subject = credential
            .strip_prefix("mock-")
            .ok_or(AppError::Unauthorized)?;
        if subject.is_empty() {
            return Err(AppError::Unauthorized);
        }
        Ok(ExternalIdentity {
            subject: subject.to_string(),
            email: Some(format!("{}@example.com", subject)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_verifier_accepts_prefixed_credential() {
        let identity = MockVerifier.verify("mock-alice").await.unwrap();
        assert_eq!(identity.subject, "alice");
        assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_mock_verifier_rejects_everything_else() {
        assert!(matches!(
            MockVerifier.verify("garbage").await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            MockVerifier.verify("mock-").await,
            Err(AppError::Unauthorized)
        ));
    }
}
