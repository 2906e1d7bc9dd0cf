//! Single-use, time-bound tokens that authorise a real-time transport connection.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

/// What a token authorises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenGrant {
    pub person_id: Uuid,
    pub call_id: Uuid,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unknown or already used session token")]
    Unknown,
    #[error("session token expired")]
    Expired,
}

struct Issued {
    grant: TokenGrant,
    expires_at: DateTime<Utc>,
}

/// Process-local token registry.
pub struct SessionTokens {
    ttl: Duration,
    issued: DashMap<String, Issued>,
}

impl SessionTokens {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or(Duration::seconds(120)),
            issued: DashMap::new(),
        }
    }

    /// Issue an opaque token for `grant`, valid until `now + ttl`.
    pub fn issue(&self, grant: TokenGrant, now: DateTime<Utc>) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        self.issued.insert(
            token.clone(),
            Issued {
                grant,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Validate a token without spending it.
    ///
    /// # Errors
    ///
    /// Same as [`SessionTokens::consume`].
    pub fn check(&self, token: &str, now: DateTime<Utc>) -> Result<TokenGrant, TokenError> {
        let issued = self.issued.get(token).ok_or(TokenError::Unknown)?;
        if now >= issued.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(issued.grant)
    }

    /// Redeem a token. A token can be redeemed once, successful or not.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Unknown`] for tokens never issued or already used, and
    /// [`TokenError::Expired`] once the TTL has passed.
    pub fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<TokenGrant, TokenError> {
        let (_, issued) = self.issued.remove(token).ok_or(TokenError::Unknown)?;
        if now >= issued.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(issued.grant)
    }

    /// Drop expired tokens that were never redeemed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.issued.len();
        self.issued.retain(|_, issued| issued.expires_at > now);
        before - self.issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant() -> TokenGrant {
        TokenGrant {
            person_id: Uuid::new_v4(),
            call_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn token_is_single_use() {
        let tokens = SessionTokens::new(std::time::Duration::from_secs(120));
        let now = Utc::now();
        let g = grant();
        let token = tokens.issue(g, now);

        assert_eq!(tokens.consume(&token, now), Ok(g));
        assert_eq!(tokens.consume(&token, now), Err(TokenError::Unknown));
    }

    #[test]
    fn check_leaves_token_redeemable() {
        let tokens = SessionTokens::new(std::time::Duration::from_secs(120));
        let now = Utc::now();
        let g = grant();
        let token = tokens.issue(g, now);

        assert_eq!(tokens.check(&token, now), Ok(g));
        assert_eq!(tokens.check(&token, now), Ok(g));
        assert_eq!(tokens.consume(&token, now), Ok(g));
        assert_eq!(tokens.check(&token, now), Err(TokenError::Unknown));
        assert_eq!(
            tokens.check(&tokens.issue(g, now), now + Duration::seconds(120)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn token_expires_after_ttl() {
        let tokens = SessionTokens::new(std::time::Duration::from_secs(120));
        let now = Utc::now();
        let token = tokens.issue(grant(), now);
        assert_eq!(
            tokens.consume(&token, now + Duration::seconds(120)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let tokens = SessionTokens::new(std::time::Duration::from_secs(120));
        let now = Utc::now();
        let a = tokens.issue(grant(), now);
        let b = tokens.issue(grant(), now);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn purge_drops_only_expired() {
        let tokens = SessionTokens::new(std::time::Duration::from_secs(60));
        let now = Utc::now();
        tokens.issue(grant(), now);
        tokens.issue(grant(), now + Duration::seconds(30));
        assert_eq!(tokens.purge_expired(now + Duration::seconds(61)), 1);
    }
}
