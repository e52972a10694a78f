//! JWT token utilities for authentication.
//!
//! Provides creation and validation of the stateless session tokens handed
//! out on login. A token carries the user id as subject plus issued-at and
//! expiry timestamps; validity is determined solely by signature and expiry
//! at the point of use.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};

/// JWT claims for a session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Token expiration timestamp
    pub exp: usize,
    /// Token issued at timestamp
    pub iat: usize,
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    /// True when the current wall-clock time is at or past the expiry claim.
    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as usize;
        now >= self.exp
    }
}

/// JWT token utility for creating and validating session tokens.
///
/// The signing secret and TTL are process-wide configuration injected at
/// construction time.
pub struct JwtUtils {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in_seconds: u64,
}

impl JwtUtils {
    /// Creates a new JwtUtils instance from the configured signing secret
    /// and token lifetime.
    pub fn new(secret: &str, expires_in_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // No leeway: a token is invalid the moment its expiry claim passes,
        // matching Claims::is_expired.
        validation.leeway = 0;

        JwtUtils {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expires_in_seconds,
        }
    }

    /// Generates a new signed session token for the given user.
    pub fn generate_token(&self, user_id: &str) -> ServiceResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expires_in_seconds as i64);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::external_service(format!("Token generation failed: {e}")))
    }

    /// Validates the signature and expiry of a token and returns its claims.
    ///
    /// Fails closed: any structural or cryptographic anomaly is an error,
    /// and the error kind distinguishes expiry from a bad signature.
    pub fn validate_token(&self, token: &str) -> ServiceResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ServiceError::TokenExpired,
                ErrorKind::InvalidSignature => ServiceError::InvalidSignature,
                _ => ServiceError::InvalidToken,
            })
    }

    /// Returns the subject (user id) of a token after validating it.
    pub fn extract_user_id(&self, token: &str) -> ServiceResult<String> {
        let claims = self.validate_token(token)?;
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utils() -> JwtUtils {
        JwtUtils::new("test-secret-at-least-32-bytes-long", 3600)
    }

    #[test]
    fn generated_token_validates_immediately() {
        let jwt = utils();
        let token = jwt.generate_token("user-123").unwrap();

        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert!(!claims.is_expired());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn extract_user_id_returns_subject() {
        let jwt = utils();
        let token = jwt.generate_token("user-456").unwrap();

        assert_eq!(jwt.extract_user_id(&token).unwrap(), "user-456");
    }

    #[test]
    fn rejects_token_signed_with_different_secret() {
        let token = JwtUtils::new("another-secret-entirely-here!!", 3600)
            .generate_token("user-123")
            .unwrap();

        let err = utils().validate_token(&token).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature));
    }

    #[test]
    fn rejects_malformed_token() {
        let err = utils().validate_token("not.a.jwt").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }

    #[test]
    fn rejects_token_just_past_expiry() {
        let jwt = utils();

        // A few seconds past expiry must already fail: there is no leeway.
        let now = Utc::now();
        let claims = Claims {
            sub: "user-123".to_string(),
            exp: (now - Duration::seconds(5)).timestamp() as usize,
            iat: (now - Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret-at-least-32-bytes-long".as_bytes()),
        )
        .unwrap();

        assert!(claims.is_expired());
        let err = jwt.validate_token(&token).unwrap_err();
        assert!(matches!(err, ServiceError::TokenExpired));
    }
}
