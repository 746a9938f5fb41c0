//! Public API trait for the access resolver.

use async_trait::async_trait;

use crate::error::AccessResolverError;
use crate::models::{AccessContext, AccessData, CachedEnvelope, FormId};
use crate::security::SecurityContext;

/// Public API trait for the access resolver.
///
/// Endpoints call this to learn what the caller may do with a form and,
/// optionally, one of its submissions:
///
/// ```ignore
/// let ctx = AccessContext::for_form(form_id).with_token(token, TokenType::SubmissionToken);
/// let envelope = access.get_access_data(&security_ctx, &ctx).await?;
/// ```
#[async_trait]
pub trait AccessResolverClient: Send + Sync {
    /// Resolve access for a single trust context.
    ///
    /// # Errors
    ///
    /// - `InvalidContext` if the context is malformed
    /// - `Unauthenticated` for a private form and an anonymous caller
    /// - `Forbidden` if the caller lacks the RBAC permission
    /// - `InvalidToken` if the token is invalid, expired or bound elsewhere
    /// - `CacheComputationFailed` if a collaborator failed
    async fn get_access_data(
        &self,
        security: &SecurityContext,
        ctx: &AccessContext,
    ) -> Result<CachedEnvelope<AccessData>, AccessResolverError>;

    /// Resolve the union of public and authenticated access.
    ///
    /// A missing RBAC permission does not fail the call; the public grants
    /// are returned alone.
    ///
    /// # Errors
    ///
    /// - `InvalidContext` if the context is malformed
    /// - `CacheComputationFailed` if a collaborator failed
    async fn get_merged_access_data(
        &self,
        security: &SecurityContext,
        ctx: &AccessContext,
    ) -> Result<CachedEnvelope<AccessData>, AccessResolverError>;

    /// Drop every cached result for a form (visibility or roles changed).
    async fn invalidate_form(&self, form_id: FormId);

    /// Drop every cached permission result.
    async fn invalidate_all(&self);
}
