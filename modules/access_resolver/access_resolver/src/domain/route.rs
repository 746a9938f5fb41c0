//! Route classification.
//!
//! Maps an [`AccessContext`] to exactly one resolution [`Route`] together with
//! the cache key, default TTL and tags its result is stored under. Decision
//! order, first match wins:
//!
//! | # | condition                        | route         | key                          |
//! |---|----------------------------------|---------------|------------------------------|
//! | 1 | token + `AccessToken`            | `SignedToken` | `auth:sub:jwt:{token}`       |
//! | 2 | token + `SubmissionToken`        | `OpaqueToken` | `auth:sub:token:{token}`     |
//! | 3 | no token, public form            | `PublicForm`  | `auth:sub:form:{f}:public`   |
//! | 4 | no token, private, authenticated | `PrivateForm` | `auth:sub:form:{f}:user:{u}` |
//! | - | no token, private, anonymous     | error         | `Unauthenticated`            |
//!
//! Form-route keys get a `:submission:{id}` suffix when the context names a
//! submission. Every entry is tagged `permissions` and `form:{form}`.

use std::sync::Arc;
use std::time::Duration;

use access_resolver_sdk::{AccessContext, AuthorizationData, FormId, FormMetadataClient, TokenType};
use futures::FutureExt;
use tracing::debug;

use super::cache::{AccessCache, CacheEntryOptions, Computed};
use super::error::DomainError;
use crate::config::AccessResolverConfig;

/// Tag carried by every permission entry.
pub const PERMISSIONS_TAG: &str = "permissions";

/// Resolution route selected for a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    SignedToken { token: String },
    OpaqueToken { token: String },
    PublicForm,
    PrivateForm { user_id: String },
}

impl Route {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedToken { .. } => "signed_token",
            Self::OpaqueToken { .. } => "opaque_token",
            Self::PublicForm => "public_form",
            Self::PrivateForm { .. } => "private_form",
        }
    }
}

/// Where and for how long the result of a route is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInstruction {
    pub route: Route,
    pub key: String,
    pub ttl: Duration,
    pub tags: Vec<String>,
}

impl CacheInstruction {
    #[must_use]
    pub fn entry_options(&self) -> CacheEntryOptions {
        CacheEntryOptions {
            ttl: self.ttl,
            tags: self.tags.clone(),
        }
    }
}

#[must_use]
pub fn form_tag(form_id: FormId) -> String {
    format!("form:{form_id}")
}

#[must_use]
pub fn cache_tags(form_id: FormId) -> Vec<String> {
    vec![PERMISSIONS_TAG.to_owned(), form_tag(form_id)]
}

#[must_use]
pub fn signed_token_key(token: &str) -> String {
    format!("auth:sub:jwt:{token}")
}

#[must_use]
pub fn opaque_token_key(token: &str) -> String {
    format!("auth:sub:token:{token}")
}

#[must_use]
pub fn public_form_key(ctx: &AccessContext) -> String {
    with_submission_suffix(format!("auth:sub:form:{}:public", ctx.form_id), ctx)
}

#[must_use]
pub fn private_form_key(ctx: &AccessContext, user_id: &str) -> String {
    with_submission_suffix(
        format!("auth:sub:form:{}:user:{user_id}", ctx.form_id),
        ctx,
    )
}

fn with_submission_suffix(key: String, ctx: &AccessContext) -> String {
    match ctx.submission_id {
        Some(submission_id) => format!("{key}:submission:{submission_id}"),
        None => key,
    }
}

fn form_visibility_key(form_id: FormId) -> String {
    format!("form:{form_id}:is_public")
}

/// Route classifier.
///
/// Holds the form-metadata collaborator and the cache for its "is public"
/// answer; everything else is a pure function of the context and identity.
pub struct RouteClassifier {
    forms: Arc<dyn FormMetadataClient>,
    visibility: Arc<dyn AccessCache<bool>>,
    config: AccessResolverConfig,
}

impl RouteClassifier {
    #[must_use]
    pub fn new(
        forms: Arc<dyn FormMetadataClient>,
        visibility: Arc<dyn AccessCache<bool>>,
        config: AccessResolverConfig,
    ) -> Self {
        Self {
            forms,
            visibility,
            config,
        }
    }

    /// Select the route for `ctx`.
    ///
    /// `identity` is only consulted for non-public forms without a token.
    ///
    /// # Errors
    ///
    /// - `InvalidContext` if the context is malformed (before any I/O)
    /// - `Unauthenticated` for a private form and an anonymous caller
    /// - `Upstream` if the form-metadata lookup fails
    #[tracing::instrument(skip_all, fields(form_id = ctx.form_id, route))]
    pub async fn classify(
        &self,
        ctx: &AccessContext,
        identity: &AuthorizationData,
    ) -> Result<CacheInstruction, DomainError> {
        ctx.validate()?;

        let tags = cache_tags(ctx.form_id);
        let instruction = match (ctx.token.as_deref(), ctx.token_type) {
            (Some(token), Some(TokenType::AccessToken)) => CacheInstruction {
                route: Route::SignedToken {
                    token: token.to_owned(),
                },
                key: signed_token_key(token),
                ttl: self.config.signed_token_ttl(),
                tags,
            },
            (Some(token), Some(TokenType::SubmissionToken)) => CacheInstruction {
                route: Route::OpaqueToken {
                    token: token.to_owned(),
                },
                key: opaque_token_key(token),
                ttl: self.config.opaque_token_ttl(),
                tags,
            },
            _ => self.classify_form(ctx, identity, tags).await?,
        };

        tracing::Span::current().record("route", instruction.route.name());
        debug!(route = instruction.route.name(), "classified access route");
        Ok(instruction)
    }

    async fn classify_form(
        &self,
        ctx: &AccessContext,
        identity: &AuthorizationData,
        tags: Vec<String>,
    ) -> Result<CacheInstruction, DomainError> {
        if self.is_form_public(ctx.form_id).await? {
            return Ok(CacheInstruction {
                route: Route::PublicForm,
                key: public_form_key(ctx),
                ttl: self.config.public_form_ttl(),
                tags,
            });
        }
        self.private_form_instruction(ctx, identity, tags)
    }

    /// Instruction for the RBAC route, independent of form visibility.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` for an anonymous identity.
    pub fn private_form_instruction(
        &self,
        ctx: &AccessContext,
        identity: &AuthorizationData,
        tags: Vec<String>,
    ) -> Result<CacheInstruction, DomainError> {
        if identity.is_anonymous() {
            return Err(DomainError::Unauthenticated);
        }
        Ok(CacheInstruction {
            route: Route::PrivateForm {
                user_id: identity.user_id.clone(),
            },
            key: private_form_key(ctx, &identity.user_id),
            ttl: self.config.private_form_ttl(),
            tags,
        })
    }

    /// Instruction for the public route, independent of form visibility.
    #[must_use]
    pub fn public_form_instruction(&self, ctx: &AccessContext) -> CacheInstruction {
        CacheInstruction {
            route: Route::PublicForm,
            key: public_form_key(ctx),
            ttl: self.config.public_form_ttl(),
            tags: cache_tags(ctx.form_id),
        }
    }

    /// Cached form visibility lookup (tags `permissions`, `form:{form_id}`).
    ///
    /// # Errors
    ///
    /// Returns `Upstream` if the form-metadata collaborator fails.
    pub async fn is_form_public(&self, form_id: FormId) -> Result<bool, DomainError> {
        let key = form_visibility_key(form_id);
        let options = CacheEntryOptions {
            ttl: self.config.form_visibility_ttl(),
            tags: cache_tags(form_id),
        };
        let forms = Arc::clone(&self.forms);
        let factory = async move {
            forms
                .is_public(form_id)
                .await
                .map(Computed::new)
                .map_err(|e| DomainError::from_collaborator("form_metadata", e))
        }
        .boxed();
        self.visibility.get_or_create(&key, options, factory).await
    }

    /// Drop the cached visibility of `form_id`.
    pub async fn invalidate_form(&self, form_id: FormId) {
        self.visibility.invalidate_by_tag(&form_tag(form_id)).await;
    }

    /// Drop every cached visibility answer.
    pub async fn invalidate_all(&self) {
        self.visibility.invalidate_by_tag(PERMISSIONS_TAG).await;
    }

    /// Default TTL used for the visibility lookup.
    #[must_use]
    pub fn visibility_ttl(&self) -> Duration {
        self.config.form_visibility_ttl()
    }
}
