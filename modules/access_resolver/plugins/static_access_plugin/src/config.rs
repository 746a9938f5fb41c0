//! Configuration for the static access plugin.

use access_resolver_sdk::models::ANONYMOUS_USER_ID;
use access_resolver_sdk::{FormId, SubmissionId};
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticAccessPluginConfig {
    /// Lifetime stamped on resolved identities.
    pub identity_ttl_secs: u64,

    /// Bearer token to identity mappings.
    pub identities: Vec<IdentityMapping>,

    /// Identity of callers without a bearer token.
    pub default_identity: IdentityConfig,

    /// Forms that accept anonymous visitors.
    pub public_forms: Vec<FormId>,

    /// Registered opaque submission tokens.
    pub submission_tokens: Vec<SubmissionTokenMapping>,

    /// Signed access tokens accepted as valid, with their claims.
    pub signed_tokens: Vec<SignedTokenConfig>,
}

impl Default for StaticAccessPluginConfig {
    fn default() -> Self {
        Self {
            identity_ttl_secs: 300,
            identities: Vec::new(),
            default_identity: IdentityConfig::default(),
            public_forms: Vec::new(),
            submission_tokens: Vec::new(),
            signed_tokens: Vec::new(),
        }
    }
}

/// Maps a bearer token to an identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityMapping {
    pub token: String,
    pub identity: IdentityConfig,
}

/// Identity returned for a caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    pub user_id: String,
    pub tenant_id: Option<Uuid>,
    pub roles: Vec<String>,
    /// RBAC permissions, e.g. `forms.view`.
    pub permissions: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id: ANONYMOUS_USER_ID.to_owned(),
            tenant_id: None,
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionTokenMapping {
    pub token: String,
    pub submission_id: SubmissionId,
}

/// A signed token and the claims it carries.
///
/// Expiry is either absolute (`expires_at`, RFC 3339) or relative to plugin
/// start (`expires_in_secs`). Exactly one must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignedTokenConfig {
    pub token: String,
    pub submission_id: SubmissionId,
    /// Short permission names: `view`, `edit`, `export`.
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub expires_in_secs: Option<u64>,
}
