//! Collaborator traits consumed by the access resolver.
//!
//! Each trait is a narrow boundary to a system the engine does not own:
//! identity/RBAC, the submission-token registry, signed-token verification
//! and form metadata. Implementations are expected to do their own caching
//! where lookups are expensive.

use async_trait::async_trait;

use crate::error::AccessResolverError;
use crate::models::{AuthorizationData, FormId, SignedAccessTokenClaims, SubmissionId};
use crate::security::SecurityContext;

/// Resolves the caller's roles and RBAC permissions.
#[async_trait]
pub trait IdentityResolverClient: Send + Sync {
    /// Resolve the caller identity.
    ///
    /// Anonymous callers resolve to [`AuthorizationData::anonymous`], not to
    /// an error.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if credentials were presented but are invalid
    /// - `CacheComputationFailed` if the identity backend is unreachable
    async fn resolve(&self, ctx: &SecurityContext)
    -> Result<AuthorizationData, AccessResolverError>;
}

/// Maps opaque submission tokens to submission ids.
#[async_trait]
pub trait SubmissionTokenResolverClient: Send + Sync {
    /// Look up a token. `Ok(None)` means the token is unknown or revoked.
    ///
    /// # Errors
    ///
    /// - `CacheComputationFailed` if the token registry is unreachable
    async fn resolve(&self, token: &str) -> Result<Option<SubmissionId>, AccessResolverError>;
}

/// Verifies signed access tokens and returns their embedded claims.
#[async_trait]
pub trait SignedTokenValidatorClient: Send + Sync {
    /// Validate signature and decode claims.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the signature or format is invalid
    /// - `CacheComputationFailed` if verification keys cannot be obtained
    async fn validate(&self, token: &str) -> Result<SignedAccessTokenClaims, AccessResolverError>;
}

/// Form metadata lookups.
#[async_trait]
pub trait FormMetadataClient: Send + Sync {
    /// Whether the form accepts anonymous visitors. Unknown forms are not public.
    ///
    /// # Errors
    ///
    /// - `CacheComputationFailed` if form storage is unreachable
    async fn is_public(&self, form_id: FormId) -> Result<bool, AccessResolverError>;
}
