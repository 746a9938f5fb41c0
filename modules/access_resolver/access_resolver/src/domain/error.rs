//! Domain errors for the access resolver.

use access_resolver_sdk::AccessResolverError;

/// Failure of a classification or resolution step.
///
/// `Clone` because the single-flight cache hands one failure to every caller
/// waiting on the same key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid access context: {0}")]
    InvalidContext(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("missing permission '{permission}'")]
    Forbidden { permission: String },

    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("{collaborator} failed: {message}")]
    Upstream {
        collaborator: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    /// Classify an error returned by a collaborator.
    ///
    /// Expected access outcomes keep their meaning; anything else is an
    /// upstream failure attributed to `collaborator`.
    pub fn from_collaborator(collaborator: &'static str, err: AccessResolverError) -> Self {
        match err {
            AccessResolverError::InvalidContext(msg) => Self::InvalidContext(msg),
            AccessResolverError::Unauthenticated => Self::Unauthenticated,
            AccessResolverError::Forbidden { permission } => Self::Forbidden { permission },
            AccessResolverError::InvalidToken(reason) => Self::InvalidToken { reason },
            AccessResolverError::CacheComputationFailed(message) => Self::Upstream {
                collaborator,
                message,
            },
        }
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}

impl From<AccessResolverError> for DomainError {
    fn from(err: AccessResolverError) -> Self {
        Self::from_collaborator("access_resolver", err)
    }
}

impl From<DomainError> for AccessResolverError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidContext(msg) => Self::InvalidContext(msg),
            DomainError::Unauthenticated => Self::Unauthenticated,
            DomainError::Forbidden { permission } => Self::Forbidden { permission },
            DomainError::InvalidToken { reason } => Self::InvalidToken(reason),
            e @ DomainError::Upstream { .. } => Self::CacheComputationFailed(e.to_string()),
        }
    }
}
