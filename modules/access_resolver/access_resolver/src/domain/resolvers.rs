//! Route resolvers.
//!
//! One function per [`Route`](super::route::Route). They never touch the
//! permission cache; the orchestrator calls them from a cache factory on miss.

use std::time::Duration;

use access_resolver_sdk::permissions::{
    self, CREATE_SUBMISSION_SET, REVIEW_SUBMISSION_SET, form, rbac,
};
use access_resolver_sdk::{
    AccessContext, AccessData, AccessResolverError, AuthorizationData, SignedTokenValidatorClient,
    SubmissionTokenResolverClient,
};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::cache::MIN_TTL;
use super::error::DomainError;

/// Output of a resolver: the granted permissions and, for routes whose
/// lifetime is dictated by the input, a TTL that replaces the route default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub data: AccessData,
    pub ttl: Option<Duration>,
}

impl Resolved {
    fn with_default_ttl(data: AccessData) -> Self {
        Self { data, ttl: None }
    }
}

/// Cache lifetime of a signed-token grant: `max(1s, expires_at - now - margin)`.
#[must_use]
pub fn signed_token_ttl(
    expires_at: OffsetDateTime,
    now: OffsetDateTime,
    margin: Duration,
) -> Duration {
    Duration::try_from(expires_at - now)
        .unwrap_or(Duration::ZERO)
        .saturating_sub(margin)
        .max(MIN_TTL)
}

/// Verify a signed access token and expand its claims.
///
/// # Errors
///
/// - `InvalidToken` if verification fails or the claims are already expired
/// - `Upstream` if verification keys cannot be obtained
pub async fn resolve_signed_token(
    validator: &dyn SignedTokenValidatorClient,
    ctx: &AccessContext,
    token: &str,
    margin: Duration,
) -> Result<Resolved, DomainError> {
    let claims = validator.validate(token).await.map_err(|e| match e {
        AccessResolverError::CacheComputationFailed(_) => {
            DomainError::from_collaborator("signed_token_validator", e)
        }
        other => DomainError::invalid_token(other.to_string()),
    })?;

    let now = OffsetDateTime::now_utc();
    if claims.expires_at <= now {
        return Err(DomainError::invalid_token("signed token has expired"));
    }

    let mut grants: Vec<&'static str> = Vec::new();
    for name in &claims.permissions {
        match permissions::submission_set_for_claim(name) {
            Some(set) => grants.extend_from_slice(set),
            None => warn!(claim = %name, "ignoring unknown signed-token permission"),
        }
    }

    let data = AccessData::new(ctx.form_id, Some(claims.submission_id))
        .with_submission_permissions(&grants);
    let ttl = signed_token_ttl(claims.expires_at, now, margin);
    debug!(ttl_secs = ttl.as_secs(), "signed token grant ttl");

    Ok(Resolved {
        data,
        ttl: Some(ttl),
    })
}

/// Resolve an opaque submission token to a review grant.
///
/// # Errors
///
/// - `InvalidToken` if the token is unknown or bound to another submission
/// - `Upstream` if the token registry fails
pub async fn resolve_opaque_token(
    tokens: &dyn SubmissionTokenResolverClient,
    ctx: &AccessContext,
    token: &str,
) -> Result<Resolved, DomainError> {
    let submission_id = tokens
        .resolve(token)
        .await
        .map_err(|e| DomainError::from_collaborator("submission_token_resolver", e))?
        .ok_or_else(|| DomainError::invalid_token("submission token is unknown or revoked"))?;

    if ctx
        .submission_id
        .is_some_and(|requested| requested != submission_id)
    {
        return Err(DomainError::invalid_token(
            "submission token is bound to another submission",
        ));
    }

    Ok(Resolved::with_default_ttl(
        AccessData::new(ctx.form_id, Some(submission_id))
            .with_submission_permissions(REVIEW_SUBMISSION_SET),
    ))
}

/// Grants of an anonymous visitor on a public form.
#[must_use]
pub fn resolve_public_form(ctx: &AccessContext) -> Resolved {
    let data = AccessData::new(ctx.form_id, ctx.submission_id).with_form_permissions(&[form::VIEW]);
    let data = if ctx.submission_id.is_none() {
        data.with_submission_permissions(CREATE_SUBMISSION_SET)
    } else {
        data
    };
    Resolved::with_default_ttl(data)
}

/// RBAC grants of an authenticated caller on a private form.
///
/// Grants only submission creation and upload. Form visibility comes from
/// the public branch of a merged lookup, never from RBAC.
///
/// # Errors
///
/// Returns `Forbidden` if the identity lacks `forms.view`.
pub fn resolve_private_form(
    ctx: &AccessContext,
    identity: &AuthorizationData,
) -> Result<Resolved, DomainError> {
    if !identity.has_permission(rbac::FORMS_VIEW) {
        return Err(DomainError::Forbidden {
            permission: rbac::FORMS_VIEW.to_owned(),
        });
    }
    Ok(Resolved::with_default_ttl(
        AccessData::new(ctx.form_id, ctx.submission_id)
            .with_submission_permissions(CREATE_SUBMISSION_SET),
    ))
}
