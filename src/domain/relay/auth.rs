//! Shared-secret authentication gate.
//!
//! Every client presents the same static token in the connect URL. The
//! comparison is byte-for-byte and constant-time.

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Why a connection was refused at the authentication step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthRejection {
    /// The server has no token configured, so nothing can match.
    #[error("no relay token configured")]
    NoTokenConfigured,

    /// The connect request carried no `token` parameter.
    #[error("missing token")]
    MissingToken,

    /// The provided token differs from the configured one.
    #[error("token mismatch")]
    TokenMismatch,
}

/// Holds the configured secret and verifies presented tokens.
#[derive(Debug)]
pub struct TokenGate {
    secret: Option<SecretString>,
}

impl TokenGate {
    /// Gate with the given secret. An empty string counts as unset.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(SecretString::new),
        }
    }

    /// Gate that rejects every connection.
    pub fn reject_all() -> Self {
        Self { secret: None }
    }

    /// Whether a token is configured at all.
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks a presented token.
    pub fn verify(&self, provided: Option<&str>) -> Result<(), AuthRejection> {
        let secret = self.secret.as_ref().ok_or(AuthRejection::NoTokenConfigured)?;
        let provided = provided.ok_or(AuthRejection::MissingToken)?;

        let matches: bool = secret
            .expose_secret()
            .as_bytes()
            .ct_eq(provided.as_bytes())
            .into();

        if matches {
            Ok(())
        } else {
            Err(AuthRejection::TokenMismatch)
        }
    }
}
