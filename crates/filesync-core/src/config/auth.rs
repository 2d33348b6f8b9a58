//! Token verification configuration.

use serde::{Deserialize, Serialize};

/// Settings for the bearer-token verifier.
///
/// Tokens are issued by the external auth service; FileSync only verifies
/// them with the shared signing secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret shared with the token issuer.
    pub jwt_secret: String,
    /// Allowed clock skew in seconds when checking expiry.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"****")
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

fn default_leeway() -> u64 {
    5
}
