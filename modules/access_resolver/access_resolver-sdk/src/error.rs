//! Error types for the access resolver.

/// Errors surfaced by the access resolver and its collaborators.
///
/// The variants separate the three situations a caller must render
/// differently: the caller has to sign in, the caller is signed in but has no
/// access, or the link they followed is no longer valid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessResolverError {
    /// The access context itself is malformed (rejected before any I/O).
    #[error("invalid access context: {0}")]
    InvalidContext(String),

    /// The resource is private and the caller is anonymous.
    #[error("authentication required")]
    Unauthenticated,

    /// The caller is authenticated but lacks the required RBAC permission.
    #[error("access denied: missing permission '{permission}'")]
    Forbidden { permission: String },

    /// A signed or opaque token is missing, expired or bound to another submission.
    #[error("invalid or expired token: {0}")]
    InvalidToken(String),

    /// A collaborator needed to compute access was unreachable or failed.
    #[error("access computation failed: {0}")]
    CacheComputationFailed(String),
}

impl AccessResolverError {
    /// Stable machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidContext(_) => "invalid_request",
            Self::Unauthenticated => "authentication_required",
            Self::Forbidden { .. } => "access_denied",
            Self::InvalidToken(_) => "link_expired",
            Self::CacheComputationFailed(_) => "service_unavailable",
        }
    }

    /// Whether the error reflects an expected access outcome rather than an
    /// infrastructure failure.
    #[must_use]
    pub fn is_access_outcome(&self) -> bool {
        !matches!(self, Self::CacheComputationFailed(_))
    }
}
