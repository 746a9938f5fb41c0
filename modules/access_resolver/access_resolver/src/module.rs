//! Access resolver module wiring.

use std::sync::Arc;

use access_resolver_sdk::{
    AccessResolverClient, FormMetadataClient, IdentityResolverClient, SignedTokenValidatorClient,
    SubmissionTokenResolverClient,
};
use anyhow::Context;
use tracing::info;

use crate::config::AccessResolverConfig;
use crate::domain::{
    AccessEnvelope, AccessResolverLocalClient, Collaborators, DistributedCacheTier, Service,
    TieredCache,
};

/// Builder for the access resolver client.
///
/// All four collaborators are required. A distributed cache tier is optional;
/// without one, each process caches on its own.
#[derive(Default)]
pub struct AccessResolverModule {
    config: AccessResolverConfig,
    identity: Option<Arc<dyn IdentityResolverClient>>,
    submission_tokens: Option<Arc<dyn SubmissionTokenResolverClient>>,
    signed_tokens: Option<Arc<dyn SignedTokenValidatorClient>>,
    forms: Option<Arc<dyn FormMetadataClient>>,
    distributed_tier: Option<Arc<dyn DistributedCacheTier>>,
}

impl AccessResolverModule {
    #[must_use]
    pub fn new(config: AccessResolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn identity(mut self, client: Arc<dyn IdentityResolverClient>) -> Self {
        self.identity = Some(client);
        self
    }

    #[must_use]
    pub fn submission_tokens(mut self, client: Arc<dyn SubmissionTokenResolverClient>) -> Self {
        self.submission_tokens = Some(client);
        self
    }

    #[must_use]
    pub fn signed_tokens(mut self, client: Arc<dyn SignedTokenValidatorClient>) -> Self {
        self.signed_tokens = Some(client);
        self
    }

    #[must_use]
    pub fn forms(mut self, client: Arc<dyn FormMetadataClient>) -> Self {
        self.forms = Some(client);
        self
    }

    /// Use one implementation for all four collaborators.
    #[must_use]
    pub fn collaborators<T>(self, client: Arc<T>) -> Self
    where
        T: IdentityResolverClient
            + SubmissionTokenResolverClient
            + SignedTokenValidatorClient
            + FormMetadataClient
            + 'static,
    {
        self.identity(client.clone())
            .submission_tokens(client.clone())
            .signed_tokens(client.clone())
            .forms(client)
    }

    #[must_use]
    pub fn distributed_tier(mut self, tier: Arc<dyn DistributedCacheTier>) -> Self {
        self.distributed_tier = Some(tier);
        self
    }

    /// Build the in-process client.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator was not supplied.
    #[tracing::instrument(skip_all)]
    pub fn build(self) -> anyhow::Result<Arc<dyn AccessResolverClient>> {
        let collaborators = Collaborators {
            identity: self.identity.context("identity resolver is not configured")?,
            submission_tokens: self
                .submission_tokens
                .context("submission token resolver is not configured")?,
            signed_tokens: self
                .signed_tokens
                .context("signed token validator is not configured")?,
            forms: self.forms.context("form metadata client is not configured")?,
        };

        let distributed = self.distributed_tier.is_some();
        let mut access: TieredCache<AccessEnvelope> =
            TieredCache::new("access", self.config.max_capacity);
        let mut visibility: TieredCache<bool> =
            TieredCache::new("form_visibility", self.config.max_capacity);
        if let Some(tier) = self.distributed_tier {
            access = access.with_remote(tier.clone());
            visibility = visibility.with_remote(tier);
        }

        info!(
            max_capacity = self.config.max_capacity,
            distributed,
            "Initializing access_resolver"
        );

        let svc = Arc::new(Service::new(
            collaborators,
            Arc::new(access),
            Arc::new(visibility),
            self.config,
        ));
        Ok(Arc::new(AccessResolverLocalClient::new(svc)))
    }
}
