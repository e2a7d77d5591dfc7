//! services/api/src/adapters/jwt.rs
//!
//! HMAC-SHA256 session tokens, the concrete `TokenService`.

use bookstore_core::domain::Identity;
use bookstore_core::error::AuthError;
use bookstore_core::ports::TokenService;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tokens are valid for three days after issue.
pub const TOKEN_TTL_HOURS: i64 = 72;

/// The signed payload. `aud` carries the user's role and `sub` the username.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: i64,
    username: String,
    sub: String,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
}

pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    validation: Validation,
}

impl JwtTokenService {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        // Only HS256 is accepted; the role lives in `aud`, so audience is not checked.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            validation,
        }
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, user_id: i64, username: &str, role: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            username: username.to_string(),
            sub: username.to_string(),
            iss: self.issuer.clone(),
            aud: role.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Rejected token: {}", e);
            AuthError::InvalidToken
        })?;
        Ok(Identity {
            user_id: data.claims.user_id,
            username: data.claims.username,
            role: data.claims.aud,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SECRET: &str = "test-secret";

    fn claims(exp_offset_secs: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            user_id: 7,
            username: "alice".into(),
            sub: "alice".into(),
            iss: "bookstore".into(),
            aud: "admin".into(),
            iat: now,
            exp: now + exp_offset_secs,
        }
    }

    fn sign(algorithm: Algorithm, claims: &Claims) -> String {
        encode(&Header::new(algorithm), claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[rstest]
    #[case(7, "alice", "admin")]
    #[case(1, "bob", "user")]
    #[case(i64::MAX, "nguyễn", "user")]
    fn issued_token_round_trips_to_identity(
        #[case] user_id: i64,
        #[case] username: &str,
        #[case] role: &str,
    ) {
        let tokens = JwtTokenService::new(SECRET, "bookstore");
        let token = tokens.issue(user_id, username, role).unwrap();

        let identity = tokens.validate(&token).unwrap();

        assert_eq!(
            identity,
            Identity { user_id, username: username.into(), role: role.into() }
        );
    }

    #[test]
    fn other_hmac_algorithms_are_rejected() {
        let tokens = JwtTokenService::new(SECRET, "bookstore");
        let token = sign(Algorithm::HS512, &claims(3600));

        assert_eq!(tokens.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = JwtTokenService::new(SECRET, "bookstore");
        let token = sign(Algorithm::HS256, &claims(-60));

        assert_eq!(tokens.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let tokens = JwtTokenService::new(SECRET, "bookstore");
        let other = JwtTokenService::new("someone-else", "bookstore");
        let token = other.issue(7, "alice", "admin").unwrap();

        assert_eq!(tokens.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn garbage_is_rejected() {
        let tokens = JwtTokenService::new(SECRET, "bookstore");
        assert_eq!(tokens.validate("not.a.token"), Err(AuthError::InvalidToken));
        assert_eq!(tokens.validate(""), Err(AuthError::InvalidToken));
    }
}
