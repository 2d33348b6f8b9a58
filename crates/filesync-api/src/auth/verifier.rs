//! JWT signature and expiry validation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use filesync_core::config::AuthConfig;
use filesync_core::error::{AppError, ErrorKind};
use filesync_core::result::AppResult;

use super::claims::Claims;

/// Validates HS256 bearer tokens issued by the auth service.
#[derive(Clone)]
pub struct TokenVerifier {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// HMAC secret key for signing; only used by tooling and tests.
    encoding_key: EncodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    /// Creates a verifier from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decode and validate a token, returning its claims.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::unauthorized("Token has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AppError::unauthorized("Invalid token format")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::unauthorized("Invalid token signature")
                }
                _ => AppError::unauthorized(format!("Token validation failed: {e}")),
            }
        })?;
        Ok(data.claims)
    }

    /// Sign `claims` with the shared secret.
    pub fn issue(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to sign token", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn verifier(secret: &str) -> TokenVerifier {
        TokenVerifier::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            leeway_seconds: 0,
        })
    }

    #[test]
    fn test_roundtrip_yields_user() {
        let v = verifier("s3cret");
        let user = Uuid::new_v4();
        let token = v.issue(&Claims::new(user, Utc::now() + Duration::minutes(5))).unwrap();
        assert_eq!(v.verify(&token).unwrap().user_id(), user);
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let user = Uuid::new_v4();
        let token = verifier("a")
            .issue(&Claims::new(user, Utc::now() + Duration::minutes(5)))
            .unwrap();
        let err = verifier("b").verify(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);

        let v = verifier("a");
        let stale = v
            .issue(&Claims::new(user, Utc::now() - Duration::minutes(5)))
            .unwrap();
        assert_eq!(v.verify(&stale).unwrap_err().kind, ErrorKind::Unauthorized);
        assert_eq!(v.verify("not-a-jwt").unwrap_err().kind, ErrorKind::Unauthorized);
    }
}
