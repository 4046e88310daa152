//! services/api/src/adapters/jwt.rs
//!
//! Bearer token verification. Tokens are accepted in two formats:
//! RS256 tokens issued by the external identity provider, checked against its
//! published key set, and HS256 tokens issued by this service at login.

use crate::config::ProviderConfig;
use async_trait::async_trait;
use chrono::Utc;
use cim_analyzer_core::domain::AuthenticatedUser;
use cim_analyzer_core::ports::{CredentialVerifier, PortError, PortResult};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

fn unauthorized(msg: impl Into<String>) -> PortError {
    PortError::Unauthorized(msg.into())
}

//=========================================================================================
// Locally Issued (Legacy) Tokens
//=========================================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct LegacyClaims {
    pub sub: String,
    pub exp: i64,
}

/// Issues and verifies the HS256 tokens handed out by `/login`.
pub struct LegacyTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl LegacyTokens {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: chrono::Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: &str) -> PortResult<String> {
        let claims = LegacyClaims {
            sub: user_id.to_string(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| PortError::Unexpected(format!("Failed to sign token: {}", e)))
    }

    /// Returns the `sub` claim of a valid, unexpired token.
    pub fn verify(&self, token: &str) -> PortResult<String> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<LegacyClaims>(token, &self.decoding, &validation)
            .map_err(|e| unauthorized(format!("Invalid local token: {}", e)))?;
        if data.claims.sub.is_empty() {
            return Err(unauthorized("Local token has an empty subject"));
        }
        Ok(data.claims.sub)
    }
}

//=========================================================================================
// Identity Provider Tokens (JWKS)
//=========================================================================================

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderClaims {
    sub: Option<String>,
    user_id: Option<String>,
}

struct CachedKeys {
    keys: Vec<(Option<String>, DecodingKey)>,
    fetched_at: Instant,
}

impl CachedKeys {
    fn find(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|(k, _)| k.as_deref() == Some(kid))
                .map(|(_, key)| key.clone()),
            None => self.keys.first().map(|(_, key)| key.clone()),
        }
    }
}

/// Verifies provider-issued RS256 tokens against a key set that is cached
/// process-wide for a fixed lifetime.
///
/// A token naming an unknown `kid` or failing its signature check triggers one
/// refetch, which covers key rotation at the provider. Refetches are spaced at
/// least `min_refresh` apart so made-up `kid`s cannot hammer the endpoint.
pub struct ProviderKeySet {
    http: reqwest::Client,
    jwks_url: String,
    issuer: Option<String>,
    audience: Option<String>,
    ttl: Duration,
    min_refresh: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl ProviderKeySet {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_url: config.jwks_url.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::from_secs(config.cache_ttl_secs),
            min_refresh: Duration::from_secs(config.min_refresh_secs),
            cache: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> PortResult<CachedKeys> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| unauthorized(format!("Failed to fetch JWKS: {}", e)))?;
        if !response.status().is_success() {
            return Err(unauthorized(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }
        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| unauthorized(format!("Failed to parse JWKS: {}", e)))?;

        let keys: Vec<(Option<String>, DecodingKey)> = jwks
            .keys
            .into_iter()
            .filter(|jwk| jwk.kty == "RSA")
            .filter_map(|jwk| match (jwk.n.as_deref(), jwk.e.as_deref()) {
                (Some(n), Some(e)) => match DecodingKey::from_rsa_components(n, e) {
                    Ok(key) => Some((jwk.kid, key)),
                    Err(err) => {
                        warn!(kid = ?jwk.kid, error = %err, "Skipping unusable JWKS key");
                        None
                    }
                },
                _ => None,
            })
            .collect();
        if keys.is_empty() {
            return Err(unauthorized("JWKS contains no usable RSA keys"));
        }
        info!(count = keys.len(), "Fetched identity provider keys");
        Ok(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        })
    }

    /// Looks the key up in the cache. Fetches when the cache is empty or
    /// stale, and when the key is missing or `force` is set, unless the last
    /// fetch is younger than `min_refresh`.
    async fn key_for(&self, kid: Option<&str>, force: bool) -> PortResult<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < self.ttl {
                    if !force {
                        if let Some(key) = cached.find(kid) {
                            return Ok(key);
                        }
                    }
                    if age < self.min_refresh {
                        debug!(kid = ?kid, "Key set refreshed too recently to refetch");
                        return Err(unauthorized(format!(
                            "Signing key {:?} not usable and JWKS was refreshed {}s ago",
                            kid,
                            age.as_secs()
                        )));
                    }
                }
            }
        }

        let fresh = self.fetch().await?;
        let key = fresh.find(kid);
        *self.cache.write().await = Some(fresh);
        key.ok_or_else(|| unauthorized(format!("Signing key {:?} not found in JWKS", kid)))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        // jsonwebtoken only checks iss/aud when the claim is present, so
        // configured claims are also made required.
        let mut required = vec!["exp"];
        match &self.issuer {
            Some(issuer) => {
                validation.set_issuer(&[issuer]);
                required.push("iss");
            }
            None => validation.iss = None,
        }
        match &self.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&required);
        validation
    }

    fn decode_with(
        &self,
        token: &str,
        key: &DecodingKey,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let data = decode::<ProviderClaims>(token, key, &self.validation())?;
        data.claims
            .sub
            .or(data.claims.user_id)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ErrorKind::MissingRequiredClaim("sub".to_string()).into())
    }

    /// Returns the subject of a valid provider token.
    pub async fn verify(&self, token: &str) -> PortResult<String> {
        let header = decode_header(token)
            .map_err(|e| unauthorized(format!("Malformed token header: {}", e)))?;
        if header.alg != Algorithm::RS256 {
            return Err(unauthorized("Not an identity provider token"));
        }
        let kid = header.kid.as_deref();

        let key = self.key_for(kid, false).await?;
        match self.decode_with(token, &key) {
            Ok(subject) => Ok(subject),
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => {
                debug!("Provider signature check failed, refreshing keys");
                let key = self.key_for(kid, true).await?;
                self.decode_with(token, &key)
                    .map_err(|e| unauthorized(format!("Invalid provider token: {}", e)))
            }
            Err(e) => Err(unauthorized(format!("Invalid provider token: {}", e))),
        }
    }
}

//=========================================================================================
// `CredentialVerifier` Trait Implementation
//=========================================================================================

/// Tries the identity provider first, then the locally issued token format.
pub struct JwtVerifier {
    provider: Option<ProviderKeySet>,
    legacy: std::sync::Arc<LegacyTokens>,
}

impl JwtVerifier {
    pub fn new(provider: Option<ProviderKeySet>, legacy: std::sync::Arc<LegacyTokens>) -> Self {
        Self { provider, legacy }
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> PortResult<AuthenticatedUser> {
        if let Some(provider) = &self.provider {
            match provider.verify(token).await {
                Ok(user_id) => {
                    debug!(user_id = %user_id, "Verified identity provider token");
                    return Ok(AuthenticatedUser { user_id });
                }
                Err(e) => debug!(error = %e, "Provider verification failed"),
            }
        }

        match self.legacy.verify(token) {
            Ok(user_id) => {
                debug!(user_id = %user_id, "Verified local token");
                Ok(AuthenticatedUser { user_id })
            }
            Err(e) => {
                debug!(error = %e, "Local token verification failed");
                Err(unauthorized("Invalid or expired token"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn issued_token_round_trips() {
        let tokens = LegacyTokens::new("secret", 30);
        let token = tokens.issue("user-1").unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "user-1");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = LegacyTokens::new("one", 30).issue("user-1").unwrap();
        assert!(matches!(
            LegacyTokens::new("two", 30).verify(&token),
            Err(PortError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = LegacyClaims {
            sub: "user-1".to_string(),
            exp: (Utc::now() - chrono::Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(LegacyTokens::new("secret", 30).verify(&token).is_err());
    }

    #[tokio::test]
    async fn verifier_rejects_garbage_instead_of_falling_back() {
        let verifier = JwtVerifier::new(None, Arc::new(LegacyTokens::new("secret", 30)));
        for token in ["", "not-a-jwt", "a.b.c"] {
            assert!(matches!(
                verifier.verify(token).await,
                Err(PortError::Unauthorized(_))
            ));
        }
    }

    #[tokio::test]
    async fn local_token_skips_the_provider() {
        // Nothing listens on this port; an HS256 token must never reach it.
        let provider = ProviderKeySet::new(&ProviderConfig {
            jwks_url: "http://127.0.0.1:9/jwks.json".to_string(),
            issuer: None,
            audience: None,
            cache_ttl_secs: 60,
            min_refresh_secs: 0,
        });
        let legacy = Arc::new(LegacyTokens::new("secret", 30));
        let token = legacy.issue("user-7").unwrap();
        let verifier = JwtVerifier::new(Some(provider), legacy);

        let user = verifier.verify(&token).await.unwrap();
        assert_eq!(user.user_id, "user-7");
    }
}
