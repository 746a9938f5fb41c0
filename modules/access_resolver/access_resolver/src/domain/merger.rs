//! Composite merger: union of public-form and RBAC access.

use access_resolver_sdk::{
    AccessContext, AccessData, AuthorizationData, CachedEnvelope, SecurityContext,
};
use futures::FutureExt;
use time::OffsetDateTime;
use tracing::debug;

use super::cache::{CacheEntryOptions, Computed, MIN_TTL};
use super::error::DomainError;
use super::route::cache_tags;
use super::service::{AccessEnvelope, Service};

fn merged_key(public_key: &str, private_key: &str) -> String {
    format!("auth:sub:merged:{public_key}+{private_key}")
}

impl Service {
    /// Resolve the union of public and authenticated access for `ctx`.
    ///
    /// Tokens in `ctx` are not consulted. Anonymous callers get the public
    /// result alone. A `Forbidden` RBAC branch contributes nothing instead of
    /// failing the call.
    ///
    /// # Errors
    ///
    /// - `InvalidContext` if the context is malformed
    /// - `Upstream` if a collaborator failed
    #[tracing::instrument(
        skip_all,
        fields(form_id = ctx.form_id, submission_id = ctx.submission_id)
    )]
    pub async fn get_merged_access_data(
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
        if identity.is_anonymous() {
            return self.public_branch(ctx, &identity).await;
        }

        let public_route = self.classifier().public_form_instruction(ctx);
        let private_route =
            self.classifier()
                .private_form_instruction(ctx, &identity, cache_tags(ctx.form_id))?;
        let key = merged_key(&public_route.key, &private_route.key);
        let options = CacheEntryOptions {
            ttl: public_route.ttl.min(private_route.ttl),
            tags: cache_tags(ctx.form_id),
        };

        let factory = async {
            let (public, private) = tokio::join!(
                self.public_branch(ctx, &identity),
                self.fetch(ctx, &private_route, &identity)
            );
            let public = public?;
            let private = match private {
                Ok(envelope) => Some(envelope),
                Err(e) if e.is_forbidden() => {
                    debug!(error = %e, "rbac branch denied, using public access only");
                    None
                }
                Err(e) => return Err(e),
            };

            let now = OffsetDateTime::now_utc();
            let public_ttl = public.remaining_ttl(now);
            let (data, ttl) = match private {
                Some(private) => (
                    public.data.merge(&private.data),
                    public_ttl.min(private.remaining_ttl(now)),
                ),
                None => (public.data, public_ttl),
            };
            let ttl = ttl.max(MIN_TTL);
            Ok::<_, DomainError>(Computed::with_ttl(CachedEnvelope::new(data, ttl), ttl))
        }
        .boxed();

        self.cache().get_or_create(&key, options, factory).await
    }

    /// Public-form access, or an empty grant when the form is not public.
    async fn public_branch(
        &self,
        ctx: &AccessContext,
        identity: &AuthorizationData,
    ) -> Result<AccessEnvelope, DomainError> {
        if self.classifier().is_form_public(ctx.form_id).await? {
            let instruction = self.classifier().public_form_instruction(ctx);
            return self.fetch(ctx, &instruction, identity).await;
        }
        Ok(CachedEnvelope::new(
            AccessData::new(ctx.form_id, ctx.submission_id),
            self.classifier().visibility_ttl(),
        ))
    }
}
