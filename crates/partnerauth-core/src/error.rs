//! Error types for PartnerAuth signing and verification.
//!
//! Every failure is represented by [`AuthError`]. The variants follow the
//! distinction between problems caused by the remote peer (malformed or invalid
//! headers, failed authorization), which are reported back to the caller, and
//! problems in the local process (signing with credentials it does not own,
//! using the request context outside a request), which indicate a bug or a
//! misconfiguration.

/// Errors that can occur while parsing, signing, or verifying messages.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The header text could not be parsed at all.
    #[error("Malformed authorization header: {0}")]
    MalformedHeader(String),

    /// The header parsed, but cannot be used to authenticate the message.
    #[error("Invalid authorization header: {0}")]
    InvalidHeader(String),

    /// The message was authenticatable, but authentication failed.
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// The local process tried to sign with a header it built itself and failed.
    #[error("{message}")]
    CallerConfiguration {
        /// Human readable summary.
        message: String,
        /// The underlying signing failure.
        #[source]
        source: Box<AuthError>,
    },

    /// The API was used incorrectly, e.g. outside the scope of a request.
    #[error("{0}")]
    Programmer(String),
}

impl AuthError {
    /// Whether the error was caused by the remote peer and should be reported
    /// back to it, as opposed to a local bug or misconfiguration.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedHeader(_) | Self::InvalidHeader(_) | Self::AuthorizationFailed(_)
        )
    }

    /// The HTTP status a server should answer with when this error rejects a request.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::MalformedHeader(_) => http::StatusCode::BAD_REQUEST,
            Self::InvalidHeader(_) => http::StatusCode::UNAUTHORIZED,
            Self::AuthorizationFailed(_) => http::StatusCode::FORBIDDEN,
            Self::CallerConfiguration { .. } | Self::Programmer(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convenience result type for PartnerAuth operations.
pub type AuthResult<T> = Result<T, AuthError>;
