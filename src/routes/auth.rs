// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: credential exchange and logout.
//!
//! Login is a single exchange: the client presents a credential from the
//! external identity provider, we verify it outbound, find or create the
//! user, and issue our own session JWT (cookie plus response body, so
//! both browser and non-browser clients are covered).

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::models::{Referral, Role, User};
use crate::time_utils::now_rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/session", post(create_session))
        .route("/auth/logout", get(logout))
}

#[derive(Deserialize)]
pub struct SessionRequest {
    /// Opaque credential from the identity provider
    pub credential: String,
    /// Display name, used only on first login
    #[serde(default)]
    pub display_name: Option<String>,
    /// Requested role, used only on first login. Admins cannot
    /// self-register.
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// Exchange an identity-provider credential for a session.
async fn create_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SessionRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let identity = state.identity.verify(&req.credential).await?;

    let user = match state
        .store
        .get_user_by_external_auth(&identity.subject)
        .await?
    {
        Some(user) => user,
        None => register_user(&state, &identity.subject, identity.email, &req).await?,
    };

    if !user.active {
        return Err(AppError::Forbidden("account is deactivated".to_string()));
    }

    let token = create_jwt(&user.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Json(SessionResponse { token, user })))
}

/// First login: create the user and their referral code.
async fn register_user(
    state: &AppState,
    subject: &str,
    email: Option<String>,
    req: &SessionRequest,
) -> Result<User> {
    let role = match req.role {
        Some(Role::Admin) => {
            return Err(AppError::Forbidden(
                "admin accounts cannot self-register".to_string(),
            ));
        }
        Some(role) => role,
        None => Role::Rider,
    };

    let email = email.unwrap_or_else(|| format!("{}@unknown.invalid", subject));
    let display_name = req
        .display_name
        .clone()
        .unwrap_or_else(|| email.split('@').next().unwrap_or("rider").to_string());

    let id = Uuid::new_v4().to_string();
    let referral_code = format!("ECO-{}", &id[..8].to_uppercase());
    let now = now_rfc3339();

    let user = User {
        id,
        external_auth_id: Some(subject.to_string()),
        email,
        display_name,
        role,
        eco_points: 0,
        co2_saved_kg: 0.0,
        referral_code: referral_code.clone(),
        active: true,
        created_at: now.clone(),
        updated_at: now.clone(),
    };
    state.store.create_user(&user).await?;

    // Best-effort: the referral record is derivable from the user.
    if let Err(e) = state
        .store
        .create_referral(&Referral {
            code: referral_code,
            referrer_id: user.id.clone(),
            redeemed_by: None,
            created_at: now,
        })
        .await
    {
        tracing::warn!(user_id = %user.id, error = %e, "Referral record creation failed");
    }

    tracing::info!(user_id = %user.id, role = ?user.role, "User registered");
    Ok(user)
}

/// Logout clears the session cookie; tokens held elsewhere simply expire.
async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    (jar, Json(serde_json::json!({ "success": true })))
}
