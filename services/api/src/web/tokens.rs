//! services/api/src/web/tokens.rs
//!
//! Access and refresh token handling. Access tokens are short-lived HS256 JWTs;
//! refresh tokens are `<session_id>.<secret>` where only an argon2 hash of the
//! secret is stored on the session row.

use argon2::{
    password_hash::{rand_core::OsRng, rand_core::RngCore, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use conversa_core::ports::{PortError, PortResult};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Session the token was issued for.
    pub sid: Uuid,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
}

/// A refresh token split into its parts.
#[derive(Debug, PartialEq, Eq)]
pub struct RefreshToken {
    pub session_id: Uuid,
    pub secret: String,
}

impl RefreshToken {
    pub fn parse(raw: &str) -> PortResult<Self> {
        let (session, secret) = raw
            .trim()
            .split_once('.')
            .ok_or(PortError::Unauthorized)?;
        let session_id = Uuid::parse_str(session).map_err(|_| PortError::Unauthorized)?;
        if secret.is_empty() {
            return Err(PortError::Unauthorized);
        }
        Ok(Self {
            session_id,
            secret: secret.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!("{}.{}", self.session_id, self.secret)
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Generate a JWT access token.
    pub fn issue_access_token(&self, user_id: Uuid, session_id: Uuid) -> PortResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            exp: now + self.access_ttl.as_secs() as i64,
            iat: now,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// Validate a JWT access token.
    pub fn validate_access_token(&self, token: &str) -> PortResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| PortError::Unauthorized)
    }

    /// Creates a fresh refresh secret for `session_id` and its storable hash.
    pub fn new_refresh_token(&self, session_id: Uuid) -> PortResult<(RefreshToken, String)> {
        let mut raw = [0u8; 32];
        OsRng.fill_bytes(&mut raw);
        let secret = URL_SAFE_NO_PAD.encode(raw);

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| PortError::Unexpected(format!("Failed to hash refresh token: {}", e)))?
            .to_string();

        Ok((RefreshToken { session_id, secret }, hash))
    }

    pub fn verify_refresh_secret(&self, secret: &str, stored_hash: &str) -> PortResult<()> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| PortError::Unexpected(format!("Stored hash is invalid: {}", e)))?;
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .map_err(|_| PortError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", Duration::from_secs(900))
    }

    #[test]
    fn access_tokens_round_trip_their_subject() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let token = issuer.issue_access_token(user_id, session_id).unwrap();
        let claims = issuer.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let other = TokenIssuer::new("other-secret", Duration::from_secs(900));
        let token = other.issue_access_token(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert!(matches!(
            issuer().validate_access_token(&token),
            Err(PortError::Unauthorized)
        ));
        assert!(issuer().validate_access_token("not-a-jwt").is_err());
    }

    #[test]
    fn refresh_secret_verifies_against_its_hash_only() {
        let issuer = issuer();
        let (token, hash) = issuer.new_refresh_token(Uuid::new_v4()).unwrap();
        assert!(issuer.verify_refresh_secret(&token.secret, &hash).is_ok());
        assert!(matches!(
            issuer.verify_refresh_secret("guess", &hash),
            Err(PortError::Unauthorized)
        ));
    }

    #[test]
    fn refresh_tokens_parse_back_from_their_encoding() {
        let (token, _) = issuer().new_refresh_token(Uuid::new_v4()).unwrap();
        assert_eq!(RefreshToken::parse(&token.encode()).unwrap(), token);
        assert!(RefreshToken::parse("no-dot").is_err());
        assert!(RefreshToken::parse("not-a-uuid.secret").is_err());
        assert!(RefreshToken::parse(&format!("{}.", Uuid::new_v4())).is_err());
    }
}
