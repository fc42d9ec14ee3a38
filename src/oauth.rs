//! Federated identity provider client.
//!
//! The core consumes providers through the narrow `IdentityProvider`
//! contract: build an authorize URL, then exchange the callback code for a
//! `(issuer, subject, display name)` assertion. `OidcProvider` implements the
//! authorization-code flow over reqwest; the `state` values handed out at the
//! start of a login are single-use and short-lived.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::security;

#[derive(Debug, Clone)]
pub struct FederatedAssertion {
    pub issuer: String,
    pub subject: String,
    pub display_name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn issuer(&self) -> &str;
    fn authorize_url(&self, state: &str) -> String;
    async fn exchange(&self, code: &str) -> AppResult<FederatedAssertion>;
}

/// Provider settings, read from the environment by `config`.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub redirect_url: String,
}

pub struct OidcProvider {
    cfg: OidcConfig,
    http: reqwest::Client,
}

impl OidcProvider {
    pub fn new(cfg: OidcConfig) -> Self {
        Self { cfg, http: reqwest::Client::new() }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    name: Option<String>,
}

// Provider-side faults all map to the same generic auth failure; the client
// learns nothing about which leg of the exchange broke.
fn exchange_failed() -> AppError {
    AppError::auth("federated_login_failed", "federated login failed")
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn issuer(&self) -> &str {
        &self.cfg.issuer
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope=openid%20profile&state={}",
            self.cfg.auth_endpoint,
            urlencoding::encode(&self.cfg.client_id),
            urlencoding::encode(&self.cfg.redirect_url),
            urlencoding::encode(state),
        )
    }

    async fn exchange(&self, code: &str) -> AppResult<FederatedAssertion> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.cfg.client_id.as_str()),
            ("client_secret", self.cfg.client_secret.as_str()),
            ("redirect_uri", self.cfg.redirect_url.as_str()),
        ];
        let token: TokenResponse = self
            .http
            .post(&self.cfg.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| { debug!(target: "drivebox::oauth", "token exchange failed: {e}"); exchange_failed() })?
            .error_for_status()
            .map_err(|e| { debug!(target: "drivebox::oauth", "token endpoint status: {e}"); exchange_failed() })?
            .json()
            .await
            .map_err(|_| exchange_failed())?;

        let info: UserInfo = self
            .http
            .get(&self.cfg.userinfo_endpoint)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|_| exchange_failed())?
            .error_for_status()
            .map_err(|_| exchange_failed())?
            .json()
            .await
            .map_err(|_| exchange_failed())?;

        let display_name = info.name.unwrap_or_else(|| info.sub.clone());
        Ok(FederatedAssertion { issuer: self.cfg.issuer.clone(), subject: info.sub, display_name })
    }
}

const STATE_TTL_MINUTES: i64 = 10;

/// Pending login states: opaque value -> (provider key, expiry). Entries are
/// single-use; `take` removes them.
#[derive(Default)]
pub struct StateRegistry {
    pending: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(&self, provider: &str) -> String {
        let state = security::gen_token();
        let mut map = self.pending.write().await;
        // opportunistic cleanup of stale entries
        let now = Utc::now();
        map.retain(|_, (_, exp)| *exp > now);
        map.insert(state.clone(), (provider.to_string(), now + Duration::minutes(STATE_TTL_MINUTES)));
        state
    }

    /// Consume a state value. Returns the provider key it was minted for, or
    /// `None` when unknown, already used, or expired.
    pub async fn take(&self, state: &str, provider: &str) -> Option<String> {
        let mut map = self.pending.write().await;
        let (owner, expires_at) = map.remove(state)?;
        if owner != provider || expires_at <= Utc::now() {
            return None;
        }
        Some(owner)
    }
}
