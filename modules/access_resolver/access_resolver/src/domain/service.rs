//! Access orchestrator.

use std::sync::Arc;
use std::time::Duration;

use access_resolver_sdk::permissions::{self, CREATE_SUBMISSION_SET, ResourceType};
use access_resolver_sdk::{
    AccessContext, AccessData, AuthorizationData, CachedEnvelope, FormId, FormMetadataClient,
    IdentityResolverClient, SecurityContext, SignedTokenValidatorClient,
    SubmissionTokenResolverClient,
};
use futures::FutureExt;
use tracing::debug;

use super::cache::{AccessCache, Computed, MIN_TTL};
use super::error::DomainError;
use super::resolvers::{self, Resolved};
use super::route::{CacheInstruction, PERMISSIONS_TAG, Route, RouteClassifier, form_tag};
use crate::config::AccessResolverConfig;

/// Cached permission result.
pub type AccessEnvelope = CachedEnvelope<AccessData>;

/// External systems the engine consults.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityResolverClient>,
    pub submission_tokens: Arc<dyn SubmissionTokenResolverClient>,
    pub signed_tokens: Arc<dyn SignedTokenValidatorClient>,
    pub forms: Arc<dyn FormMetadataClient>,
}

/// Orchestrates identity lookup, admin bypass, route classification and the
/// cached route resolvers.
pub struct Service {
    identity: Arc<dyn IdentityResolverClient>,
    submission_tokens: Arc<dyn SubmissionTokenResolverClient>,
    signed_tokens: Arc<dyn SignedTokenValidatorClient>,
    classifier: RouteClassifier,
    cache: Arc<dyn AccessCache<AccessEnvelope>>,
    config: AccessResolverConfig,
}

impl Service {
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        cache: Arc<dyn AccessCache<AccessEnvelope>>,
        visibility: Arc<dyn AccessCache<bool>>,
        config: AccessResolverConfig,
    ) -> Self {
        let classifier = RouteClassifier::new(collaborators.forms, visibility, config.clone());
        Self {
            identity: collaborators.identity,
            submission_tokens: collaborators.submission_tokens,
            signed_tokens: collaborators.signed_tokens,
            classifier,
            cache,
            config,
        }
    }

    /// Resolve access for a single trust context.
    ///
    /// Admins bypass classification and caching. Everyone else goes through
    /// the route classifier and the permission cache.
    ///
    /// # Errors
    ///
    /// See [`DomainError`]. Failures are never cached.
    #[tracing::instrument(
        skip_all,
        fields(form_id = ctx.form_id, submission_id = ctx.submission_id)
    )]
    pub async fn get_access_data(
        &self,
        security: &SecurityContext,
        ctx: &AccessContext,
    ) -> Result<AccessEnvelope, DomainError> {
        ctx.validate()?;

        let identity = self.resolve_identity(security).await?;
        if identity.is_admin() {
            debug!("admin bypass, granting full permission catalog");
            return Ok(self.admin_envelope(ctx));
        }

        let instruction = self.classifier.classify(ctx, &identity).await?;
        self.fetch(ctx, &instruction, &identity).await
    }

    /// Drop every cached result for `form_id`, including its visibility.
    pub async fn invalidate_form(&self, form_id: FormId) {
        self.cache.invalidate_by_tag(&form_tag(form_id)).await;
        self.classifier.invalidate_form(form_id).await;
    }

    pub async fn invalidate_all(&self) {
        self.cache.invalidate_by_tag(PERMISSIONS_TAG).await;
        self.classifier.invalidate_all().await;
    }

    pub(super) async fn resolve_identity(
        &self,
        security: &SecurityContext,
    ) -> Result<AuthorizationData, DomainError> {
        self.identity
            .resolve(security)
            .await
            .map_err(|e| DomainError::from_collaborator("identity_resolver", e))
    }

    pub(super) fn classifier(&self) -> &RouteClassifier {
        &self.classifier
    }

    pub(super) fn cache(&self) -> &dyn AccessCache<AccessEnvelope> {
        self.cache.as_ref()
    }

    /// Full catalog for the resources present in `ctx`. Never cached.
    pub(super) fn admin_envelope(&self, ctx: &AccessContext) -> AccessEnvelope {
        let data = AccessData::new(ctx.form_id, ctx.submission_id).with_form_permissions(
            permissions::all_permissions_for_resource_type(ResourceType::Form),
        );
        let data = if ctx.submission_id.is_some() {
            data.with_submission_permissions(permissions::all_permissions_for_resource_type(
                ResourceType::Submission,
            ))
        } else {
            data.with_submission_permissions(CREATE_SUBMISSION_SET)
        };
        CachedEnvelope::new(data, self.config.admin_ttl())
    }

    /// Get-or-create the envelope described by `instruction`.
    pub(super) async fn fetch(
        &self,
        ctx: &AccessContext,
        instruction: &CacheInstruction,
        identity: &AuthorizationData,
    ) -> Result<AccessEnvelope, DomainError> {
        let factory = self
            .compute(ctx, &instruction.route, identity, instruction.ttl)
            .boxed();
        let mut envelope = self
            .cache
            .get_or_create(&instruction.key, instruction.entry_options(), factory)
            .await?;

        // Token keys carry neither the form nor the submission. The binding
        // is checked on every hit and the result is scoped to the caller's form.
        if let Route::SignedToken { .. } | Route::OpaqueToken { .. } = instruction.route {
            if let Some(submission_id) = ctx.submission_id {
                if !envelope.data.is_for_submission(submission_id) {
                    return Err(DomainError::invalid_token(
                        "token is bound to another submission",
                    ));
                }
            }
            let form_id = ctx.form_id.to_string();
            if envelope.data.form_id != form_id {
                envelope.data.form_id = form_id;
            }
        }
        Ok(envelope)
    }

    async fn compute(
        &self,
        ctx: &AccessContext,
        route: &Route,
        identity: &AuthorizationData,
        default_ttl: Duration,
    ) -> Result<Computed<AccessEnvelope>, DomainError> {
        let Resolved { data, ttl } = match route {
            Route::SignedToken { token } => {
                resolvers::resolve_signed_token(
                    self.signed_tokens.as_ref(),
                    ctx,
                    token,
                    self.config.token_safety_margin(),
                )
                .await?
            }
            Route::OpaqueToken { token } => {
                resolvers::resolve_opaque_token(self.submission_tokens.as_ref(), ctx, token).await?
            }
            Route::PublicForm => resolvers::resolve_public_form(ctx),
            Route::PrivateForm { .. } => resolvers::resolve_private_form(ctx, identity)?,
        };
        let ttl = ttl.unwrap_or(default_ttl).max(MIN_TTL);
        Ok(Computed::with_ttl(CachedEnvelope::new(data, ttl), ttl))
    }
}
