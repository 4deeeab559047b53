//! Identity verification for incoming connections.
//!
//! Two steps: the provider checks the bearer token and yields an external
//! subject, then the store maps that subject to a local user. Failing either
//! step rejects the connection.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, warn};

use crate::error::HubError;
use crate::hub::UserId;
use crate::store::ChatStore;
use crate::utils::jwt;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate a token and return the provider's subject for it.
    async fn verify(&self, token: &str) -> Result<String, HubError>;
}

/// HS256 JWT provider.
pub struct JwtProvider {
    secret: Vec<u8>,
}

impl JwtProvider {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }
}

#[async_trait]
impl IdentityProvider for JwtProvider {
    async fn verify(&self, token: &str) -> Result<String, HubError> {
        jwt::verify(token, &self.secret)
            .map(|claims| claims.sub)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    HubError::Unauthorized("token expired".into())
                }
                _ => HubError::Unauthorized("invalid token".into()),
            })
    }
}

pub struct IdentityVerifier {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn ChatStore>,
}

impl IdentityVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ChatStore>) -> Self {
        Self { provider, store }
    }

    pub async fn verify(&self, credential: Option<&str>) -> Result<UserId, HubError> {
        let token = credential.ok_or_else(|| HubError::Unauthorized("missing credential".into()))?;
        let subject = self.provider.verify(token).await?;

        match self.store.resolve_user(&subject).await {
            Ok(Some(user)) => {
                debug!(subject = %subject, user = %user, "identity resolved");
                Ok(user)
            }
            Ok(None) => {
                warn!(subject = %subject, "token accepted but no local user");
                Err(HubError::Unauthorized("unknown user".into()))
            }
            Err(e) => {
                warn!(subject = %subject, error = %e, "user lookup failed");
                Err(HubError::Unauthorized("user lookup failed".into()))
            }
        }
    }
}

/// Bearer credential from the connection-time auth payload (`?token=`),
/// falling back to the `Authorization` header. Blank values count as absent.
pub fn extract_credential(auth_payload: Option<&str>, headers: &HeaderMap) -> Option<String> {
    let from_payload = auth_payload
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let from_header = || {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    };

    from_payload.or_else(from_header).map(str::to_string)
}
