//! Collaborator trait implementations for the static access plugin.

use access_resolver_sdk::{
    AccessResolverError, AuthorizationData, FormId, FormMetadataClient, IdentityResolverClient,
    SecurityContext, SignedAccessTokenClaims, SignedTokenValidatorClient, SubmissionId,
    SubmissionTokenResolverClient,
};
use async_trait::async_trait;
use tracing::debug;

use super::service::Service;

#[async_trait]
impl IdentityResolverClient for Service {
    async fn resolve(
        &self,
        ctx: &SecurityContext,
    ) -> Result<AuthorizationData, AccessResolverError> {
        self.identity(ctx).ok_or_else(|| {
            debug!("unrecognized bearer token");
            AccessResolverError::Unauthenticated
        })
    }
}

#[async_trait]
impl SubmissionTokenResolverClient for Service {
    async fn resolve(&self, token: &str) -> Result<Option<SubmissionId>, AccessResolverError> {
        Ok(self.submission_for_token(token))
    }
}

#[async_trait]
impl SignedTokenValidatorClient for Service {
    async fn validate(&self, token: &str) -> Result<SignedAccessTokenClaims, AccessResolverError> {
        self.claims_for_token(token).ok_or_else(|| {
            AccessResolverError::InvalidToken("signature verification failed".to_owned())
        })
    }
}

#[async_trait]
impl FormMetadataClient for Service {
    async fn is_public(&self, form_id: FormId) -> Result<bool, AccessResolverError> {
        Ok(Service::is_public(self, form_id))
    }
}
