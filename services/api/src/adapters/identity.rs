//! services/api/src/adapters/identity.rs
//!
//! Verifies Google and Apple identity tokens. Implements the `IdentityVerifier`
//! port from the `core` crate.

use async_trait::async_trait;
use conversa_core::domain::{SocialProvider, VerifiedIdentity};
use conversa_core::ports::{IdentityVerifier, PortError, PortResult};
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const APPLE_KEYS_URL: &str = "https://appleid.apple.com/auth/keys";
const APPLE_ISSUER: &str = "https://appleid.apple.com";
/// An unknown `kid` refetches Apple's keys at most this often.
const APPLE_KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

//=========================================================================================
// Google
//=========================================================================================

/// The subset of Google's `tokeninfo` response we rely on.
#[derive(Debug, Deserialize)]
pub struct GoogleTokenInfo {
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Checks a `tokeninfo` payload against the configured OAuth client ids.
pub fn check_google_token(
    info: GoogleTokenInfo,
    client_ids: &[String],
) -> PortResult<VerifiedIdentity> {
    if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
        warn!("Rejected Google token from issuer {}", info.iss);
        return Err(PortError::Unauthorized);
    }
    if !client_ids.iter().any(|id| *id == info.aud) {
        warn!("Rejected Google token for audience {}", info.aud);
        return Err(PortError::Unauthorized);
    }
    if info.sub.is_empty() {
        return Err(PortError::Unauthorized);
    }
    Ok(VerifiedIdentity {
        provider: SocialProvider::Google,
        social_id: info.sub,
        email: info.email,
        display_name: info.name,
    })
}

#[derive(Clone)]
pub struct GoogleVerifier {
    http: reqwest::Client,
    client_ids: Vec<String>,
}

impl GoogleVerifier {
    pub fn new(http: reqwest::Client, client_ids: Vec<String>) -> Self {
        Self { http, client_ids }
    }

    async fn verify(&self, id_token: &str) -> PortResult<VerifiedIdentity> {
        let response = self
            .http
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Google answers 400 for invalid or expired tokens.
        if response.status().is_client_error() {
            return Err(PortError::Unauthorized);
        }
        let info = response
            .error_for_status()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .json::<GoogleTokenInfo>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        check_google_token(info, &self.client_ids)
    }
}

//=========================================================================================
// Apple
//=========================================================================================

#[derive(Debug, Deserialize)]
struct AppleClaims {
    sub: String,
    email: Option<String>,
}

/// Apple's key set and when it was last requested.
#[derive(Default)]
struct KeyCache {
    set: Option<JwkSet>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn find(&self, kid: &str) -> Option<&jsonwebtoken::jwk::Jwk> {
        self.set.as_ref().and_then(|set| set.find(kid))
    }

    fn may_refresh(&self, now: Instant) -> bool {
        self.fetched_at
            .map_or(true, |at| now.saturating_duration_since(at) >= APPLE_KEY_REFRESH_INTERVAL)
    }
}

pub struct AppleVerifier {
    http: reqwest::Client,
    client_ids: Vec<String>,
    keys: RwLock<KeyCache>,
}

impl AppleVerifier {
    pub fn new(http: reqwest::Client, client_ids: Vec<String>) -> Self {
        Self {
            http,
            client_ids,
            keys: RwLock::new(KeyCache::default()),
        }
    }

    async fn fetch_keys(&self) -> PortResult<JwkSet> {
        info!("Fetching Apple signing keys");
        self.http
            .get(APPLE_KEYS_URL)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .json::<JwkSet>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// Finds the key for `kid`. An unknown `kid` refreshes the cached set, but no more
    /// than once per `APPLE_KEY_REFRESH_INTERVAL`; failed fetches count too.
    async fn decoding_key(&self, kid: &str) -> PortResult<DecodingKey> {
        if let Some(jwk) = self.keys.read().await.find(kid) {
            return DecodingKey::from_jwk(jwk).map_err(|e| PortError::Unexpected(e.to_string()));
        }

        // Held across the fetch so concurrent misses share one request.
        let mut cache = self.keys.write().await;
        if let Some(jwk) = cache.find(kid) {
            return DecodingKey::from_jwk(jwk).map_err(|e| PortError::Unexpected(e.to_string()));
        }
        if !cache.may_refresh(Instant::now()) {
            debug!(kid, "Unknown Apple key id, keys were refreshed recently");
            return Err(PortError::Unauthorized);
        }

        cache.fetched_at = Some(Instant::now());
        cache.set = Some(self.fetch_keys().await?);
        cache
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .ok_or(PortError::Unauthorized)
    }

    async fn verify(&self, id_token: &str) -> PortResult<VerifiedIdentity> {
        if self.client_ids.is_empty() {
            warn!("Apple sign-in attempted but no APPLE_CLIENT_IDS are configured");
            return Err(PortError::Unauthorized);
        }

        let header = decode_header(id_token).map_err(|_| PortError::Unauthorized)?;
        let kid = header.kid.ok_or(PortError::Unauthorized)?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[APPLE_ISSUER]);
        validation.set_audience(&self.client_ids);

        let claims = decode::<AppleClaims>(id_token, &key, &validation)
            .map_err(|e| {
                warn!("Rejected Apple token: {}", e);
                PortError::Unauthorized
            })?
            .claims;

        Ok(VerifiedIdentity {
            provider: SocialProvider::Apple,
            social_id: claims.sub,
            email: claims.email,
            display_name: None,
        })
    }
}

//=========================================================================================
// `IdentityVerifier` Trait Implementation
//=========================================================================================

/// Dispatches to the verifier for the token's provider.
pub struct SocialIdentityVerifier {
    google: GoogleVerifier,
    apple: AppleVerifier,
}

impl SocialIdentityVerifier {
    pub fn new(http: reqwest::Client, google_client_ids: Vec<String>, apple_client_ids: Vec<String>) -> Self {
        Self {
            google: GoogleVerifier::new(http.clone(), google_client_ids),
            apple: AppleVerifier::new(http, apple_client_ids),
        }
    }
}

#[async_trait]
impl IdentityVerifier for SocialIdentityVerifier {
    async fn verify(
        &self,
        provider: SocialProvider,
        id_token: &str,
    ) -> PortResult<VerifiedIdentity> {
        if id_token.trim().is_empty() {
            return Err(PortError::Validation("id_token is required".to_string()));
        }
        match provider {
            SocialProvider::Google => self.google.verify(id_token).await,
            SocialProvider::Apple => self.apple.verify(id_token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(aud: &str, iss: &str) -> GoogleTokenInfo {
        GoogleTokenInfo {
            aud: aud.to_string(),
            iss: iss.to_string(),
            sub: "1098765".to_string(),
            email: Some("ana@example.com".to_string()),
            name: Some("Ana".to_string()),
        }
    }

    #[test]
    fn google_token_for_a_known_client_is_accepted() {
        let ids = vec!["web-client".to_string()];
        let identity = check_google_token(info("web-client", "https://accounts.google.com"), &ids)
            .unwrap();
        assert_eq!(identity.provider, SocialProvider::Google);
        assert_eq!(identity.social_id, "1098765");
        assert_eq!(identity.display_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn google_token_for_another_audience_is_rejected() {
        let ids = vec!["web-client".to_string()];
        let err = check_google_token(info("someone-else", "accounts.google.com"), &ids).unwrap_err();
        assert!(matches!(err, PortError::Unauthorized));
    }

    #[test]
    fn google_token_from_a_foreign_issuer_is_rejected() {
        let ids = vec!["web-client".to_string()];
        let err = check_google_token(info("web-client", "https://evil.example"), &ids).unwrap_err();
        assert!(matches!(err, PortError::Unauthorized));
    }

    #[tokio::test]
    async fn test_blank_token_is_a_validation_error() {
        let verifier = SocialIdentityVerifier::new(reqwest::Client::new(), vec![], vec![]);
        let err = verifier.verify(SocialProvider::Apple, "  ").await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test]
    async fn test_apple_without_client_ids_is_unauthorized() {
        let verifier = SocialIdentityVerifier::new(reqwest::Client::new(), vec![], vec![]);
        let err = verifier.verify(SocialProvider::Apple, "a.b.c").await.unwrap_err();
        assert!(matches!(err, PortError::Unauthorized));
    }

    #[test]
    fn key_refresh_is_throttled() {
        let now = Instant::now();
        assert!(KeyCache::default().may_refresh(now));

        let cache = KeyCache {
            set: None,
            fetched_at: Some(now),
        };
        assert!(!cache.may_refresh(now + Duration::from_secs(1)));
        assert!(cache.may_refresh(now + APPLE_KEY_REFRESH_INTERVAL));
    }

    #[tokio::test]
    async fn test_unknown_kid_after_a_recent_fetch_is_rejected_without_fetching() {
        // The client cannot reach anything, so a fetch would surface as Unexpected.
        let http = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all("http://127.0.0.1:9").unwrap())
            .build()
            .unwrap();
        let verifier = AppleVerifier::new(http, vec!["com.example.app".to_string()]);
        *verifier.keys.write().await = KeyCache {
            set: Some(JwkSet { keys: vec![] }),
            fetched_at: Some(Instant::now()),
        };

        for _ in 0..3 {
            let err = verifier.decoding_key("forged-kid").await.err().unwrap();
            assert!(matches!(err, PortError::Unauthorized));
        }
    }
}

