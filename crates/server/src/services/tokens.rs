//! Access/refresh token signing and verification.
//!
//! Both token classes are HS256 JWTs carrying the owner id and a type tag,
//! signed with separate secrets. Refresh tokens are stored server-side
//! only as SHA-256 digests (see the session repository).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use clementine_core::UserId;

use crate::config::JwtConfig;

/// Token class tag embedded in the claims.
///
/// Refusing an access token where a refresh token is expected (and vice
/// versa) is what keeps the short-lived credential from being replayed
/// against the refresh endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims for both token classes.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Owner id.
    sub: i32,
    /// Token class tag.
    token_type: TokenKind,
    /// Issued-at, seconds since epoch.
    iat: i64,
    /// Expiry, seconds since epoch.
    exp: i64,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// When the refresh token (and its session row) expires.
    pub refresh_expires_at: DateTime<Utc>,
}

/// Errors from token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature invalid, malformed, or expired.
    #[error("token is invalid or expired")]
    Invalid,

    /// Valid signature but wrong token class.
    #[error("wrong token type")]
    WrongType,

    /// Signing failed (key misconfiguration).
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies the two token classes.
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Build the service from JWT configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let access_secret = config.access_secret.expose_secret().as_bytes();
        let refresh_secret = config.refresh_secret.expose_secret().as_bytes();

        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl: Duration::from_std(config.access_ttl).unwrap_or_else(|_| Duration::minutes(15)),
            refresh_ttl: Duration::from_std(config.refresh_ttl).unwrap_or_else(|_| Duration::days(7)),
        }
    }

    /// Issue a fresh access/refresh pair for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue_pair(&self, user_id: UserId) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let refresh_expires_at = now + self.refresh_ttl;

        let access_token = sign(
            &self.access_encoding,
            user_id,
            TokenKind::Access,
            now,
            now + self.access_ttl,
        )?;
        let refresh_token = sign(
            &self.refresh_encoding,
            user_id,
            TokenKind::Refresh,
            now,
            refresh_expires_at,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_expires_at,
        })
    }

    /// Verify an access token and return its owner.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for bad/expired tokens and
    /// `TokenError::WrongType` for a refresh token presented as access.
    pub fn verify_access(&self, token: &str) -> Result<UserId, TokenError> {
        verify(&self.access_decoding, token, TokenKind::Access)
    }

    /// Verify a refresh token and return its owner.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for bad/expired tokens and
    /// `TokenError::WrongType` for an access token presented as refresh.
    pub fn verify_refresh(&self, token: &str) -> Result<UserId, TokenError> {
        verify(&self.refresh_decoding, token, TokenKind::Refresh)
    }
}

fn sign(
    key: &EncodingKey,
    user_id: UserId,
    kind: TokenKind,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<String, TokenError> {
    let claims = Claims {
        sub: user_id.as_i32(),
        token_type: kind,
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
    };

    Ok(encode(&Header::default(), &claims, key)?)
}

fn verify(key: &DecodingKey, token: &str, expected: TokenKind) -> Result<UserId, TokenError> {
    let data = decode::<Claims>(token, key, &Validation::default())
        .map_err(|_| TokenError::Invalid)?;

    if data.claims.token_type != expected {
        return Err(TokenError::WrongType);
    }

    Ok(UserId::new(data.claims.sub))
}

/// SHA-256 digest of a token, hex-encoded, for at-rest storage.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn service() -> TokenService {
        TokenService::new(&JwtConfig {
            access_secret: SecretString::from("test-access-Kq8#mV2$kT6!wR4@xP9"),
            refresh_secret: SecretString::from("test-refresh-Zu3&jD7*fH1%nL5^bQ"),
            access_ttl: std::time::Duration::from_secs(900),
            refresh_ttl: std::time::Duration::from_secs(604_800),
        })
    }

    #[test]
    fn test_access_token_roundtrip() {
        let svc = service();
        let pair = svc.issue_pair(UserId::new(42)).unwrap();
        assert_eq!(svc.verify_access(&pair.access_token).unwrap(), UserId::new(42));
    }

    #[test]
    fn test_refresh_token_roundtrip() {
        let svc = service();
        let pair = svc.issue_pair(UserId::new(7)).unwrap();
        assert_eq!(svc.verify_refresh(&pair.refresh_token).unwrap(), UserId::new(7));
    }

    #[test]
    fn test_type_tags_are_enforced() {
        let svc = service();
        let pair = svc.issue_pair(UserId::new(1)).unwrap();

        // Different secrets make cross-verification fail outright...
        assert!(matches!(
            svc.verify_access(&pair.refresh_token),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            svc.verify_refresh(&pair.access_token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_type_tag_rejected_even_with_shared_secret() {
        // ...and even when both classes share a secret, the type tag alone
        // must refuse the swap.
        let svc = TokenService::new(&JwtConfig {
            access_secret: SecretString::from("shared-Kq8#mV2$kT6!wR4@xP9nL3&"),
            refresh_secret: SecretString::from("shared-Kq8#mV2$kT6!wR4@xP9nL3&"),
            access_ttl: std::time::Duration::from_secs(900),
            refresh_ttl: std::time::Duration::from_secs(604_800),
        });

        let pair = svc.issue_pair(UserId::new(1)).unwrap();
        assert!(matches!(
            svc.verify_refresh(&pair.access_token),
            Err(TokenError::WrongType)
        ));
        assert!(matches!(
            svc.verify_access(&pair.refresh_token),
            Err(TokenError::WrongType)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let svc = service();
        let pair = svc.issue_pair(UserId::new(1)).unwrap();

        let mut tampered = pair.access_token.clone();
        tampered.pop();
        tampered.push('A');
        assert!(matches!(
            svc.verify_access(&tampered),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            svc.verify_access("not-a-jwt"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service();
        let now = Utc::now();
        // Expired beyond the default validation leeway.
        let expired = sign(
            &svc.access_encoding,
            UserId::new(1),
            TokenKind::Access,
            now - Duration::hours(2),
            now - Duration::hours(1),
        )
        .unwrap();

        assert!(matches!(
            svc.verify_access(&expired),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let digest = hash_token("some-refresh-token");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_token("some-refresh-token"));
        assert_ne!(digest, hash_token("some-other-token"));
    }
}
