//! Credential checks.
//!
//! The engine treats authentication as a capability check: before a round
//! trip it asks the [`AuthGate`] whether a valid credential is held, and the
//! HTTP transport asks it for the bearer token to attach.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::sync::RwLock;

use marksync_core::now_millis;

/// Validates the locally held credential.
#[async_trait]
pub trait AuthGate: Send + Sync {
    /// True if a currently valid credential is held.
    ///
    /// Implementations may clear an expired credential as a side effect.
    async fn is_valid(&self) -> bool;

    /// The bearer token to attach to requests, if any.
    async fn bearer_token(&self) -> Option<String>;

    /// Drop the credential after the server rejected it.
    async fn invalidate(&self);
}

/// Decode the claims segment of a JWT-style token.
///
/// Returns `None` if the token does not have a base64url JSON object as its
/// second segment.
pub fn decode_claims(token: &str) -> Option<serde_json::Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.is_object().then_some(claims)
}

/// Auth gate holding a JWT-style bearer token.
///
/// A token whose `exp` claim (seconds since the epoch) lies in the past is
/// cleared on the next [`is_valid`](AuthGate::is_valid) check. A token with
/// no `exp` claim never expires. A token that cannot be decoded is invalid
/// but kept.
#[derive(Default)]
pub struct TokenAuthGate {
    token: RwLock<Option<String>>,
}

impl TokenAuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Store a new credential, replacing any previous one.
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    /// The held credential, valid or not.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Drop the held credential.
    pub async fn clear(&self) {
        *self.token.write().await = None;
    }

    /// Claims of the held credential, if it decodes.
    pub async fn claims(&self) -> Option<serde_json::Value> {
        self.token.read().await.as_deref().and_then(decode_claims)
    }
}

#[async_trait]
impl AuthGate for TokenAuthGate {
    async fn is_valid(&self) -> bool {
        let mut token = self.token.write().await;
        let Some(claims) = token.as_deref().map(decode_claims) else {
            return false;
        };
        let Some(claims) = claims else {
            tracing::error!("failed to decode credential");
            return false;
        };

        let expired = claims
            .get("exp")
            .and_then(serde_json::Value::as_f64)
            .is_some_and(|exp| exp * 1000.0 < now_millis() as f64);
        if expired {
            tracing::info!("credential expired, clearing it");
            *token = None;
            return false;
        }
        true
    }

    async fn bearer_token(&self) -> Option<String> {
        self.token().await
    }

    async fn invalidate(&self) {
        tracing::warn!("credential rejected by server, clearing it");
        self.clear().await;
    }
}

/// Auth gate with a fixed answer.
#[derive(Debug)]
pub struct StaticAuthGate {
    valid: AtomicBool,
    token: String,
    invalidations: AtomicUsize,
}

impl StaticAuthGate {
    /// A gate that reports a valid credential until invalidated.
    pub fn valid() -> Self {
        Self::new(true)
    }

    /// A gate that never reports a valid credential.
    pub fn invalid() -> Self {
        Self::new(false)
    }

    fn new(valid: bool) -> Self {
        Self {
            valid: AtomicBool::new(valid),
            token: "static-token".to_string(),
            invalidations: AtomicUsize::new(0),
        }
    }

    /// Flip validity.
    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    /// How many times [`invalidate`](AuthGate::invalidate) was called.
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthGate for StaticAuthGate {
    async fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    async fn bearer_token(&self) -> Option<String> {
        self.is_valid().await.then(|| self.token.clone())
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.valid.store(false, Ordering::SeqCst);
    }
}
