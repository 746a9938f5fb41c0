//! Service implementation for the static access plugin.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use access_resolver_sdk::{
    AuthorizationData, FormId, SecurityContext, SignedAccessTokenClaims, SubmissionId,
};
use anyhow::bail;
use time::OffsetDateTime;

use crate::config::{IdentityConfig, SignedTokenConfig, StaticAccessPluginConfig};

/// Static access service.
///
/// All lookups are answered from maps built once from configuration.
pub struct Service {
    identity_ttl: Duration,
    default_identity: IdentityConfig,
    identities: HashMap<String, IdentityConfig>,
    public_forms: HashSet<FormId>,
    submission_tokens: HashMap<String, SubmissionId>,
    signed_tokens: HashMap<String, SignedAccessTokenClaims>,
}

impl Service {
    /// Create a service from plugin configuration.
    ///
    /// Relative signed-token expiries are fixed at this point.
    ///
    /// # Errors
    ///
    /// Returns an error if a signed token has no expiry or two of them.
    pub fn from_config(cfg: &StaticAccessPluginConfig) -> anyhow::Result<Self> {
        let now = OffsetDateTime::now_utc();
        let signed_tokens = cfg
            .signed_tokens
            .iter()
            .map(|t| Ok((t.token.clone(), claims_from_config(t, now)?)))
            .collect::<anyhow::Result<HashMap<_, _>>>()?;

        Ok(Self {
            identity_ttl: Duration::from_secs(cfg.identity_ttl_secs),
            default_identity: cfg.default_identity.clone(),
            identities: cfg
                .identities
                .iter()
                .map(|m| (m.token.clone(), m.identity.clone()))
                .collect(),
            public_forms: cfg.public_forms.iter().copied().collect(),
            submission_tokens: cfg
                .submission_tokens
                .iter()
                .map(|m| (m.token.clone(), m.submission_id))
                .collect(),
            signed_tokens,
        })
    }

    /// Identity for the caller.
    ///
    /// Callers without a bearer token get the default identity. Returns
    /// `None` for an unrecognized token.
    #[must_use]
    pub fn identity(&self, ctx: &SecurityContext) -> Option<AuthorizationData> {
        let identity = match ctx.bearer_token() {
            None | Some("") => &self.default_identity,
            Some(token) => self.identities.get(token)?,
        };
        Some(build_identity(identity, self.identity_ttl))
    }

    #[must_use]
    pub fn submission_for_token(&self, token: &str) -> Option<SubmissionId> {
        self.submission_tokens.get(token).copied()
    }

    #[must_use]
    pub fn claims_for_token(&self, token: &str) -> Option<SignedAccessTokenClaims> {
        self.signed_tokens.get(token).cloned()
    }

    #[must_use]
    pub fn is_public(&self, form_id: FormId) -> bool {
        self.public_forms.contains(&form_id)
    }
}

fn claims_from_config(
    cfg: &SignedTokenConfig,
    now: OffsetDateTime,
) -> anyhow::Result<SignedAccessTokenClaims> {
    let expires_at = match (cfg.expires_at, cfg.expires_in_secs) {
        (Some(at), None) => at,
        (None, Some(secs)) => now + Duration::from_secs(secs),
        (Some(_), Some(_)) => bail!(
            "signed token for submission {} sets both expires_at and expires_in_secs",
            cfg.submission_id
        ),
        (None, None) => bail!(
            "signed token for submission {} has no expiry",
            cfg.submission_id
        ),
    };
    Ok(SignedAccessTokenClaims {
        submission_id: cfg.submission_id,
        permissions: cfg.permissions.iter().cloned().collect(),
        expires_at,
    })
}

fn build_identity(identity: &IdentityConfig, ttl: Duration) -> AuthorizationData {
    AuthorizationData::new(identity.user_id.clone(), identity.tenant_id, ttl)
        .with_roles(identity.roles.iter().cloned())
        .with_permissions(identity.permissions.iter().cloned())
}
