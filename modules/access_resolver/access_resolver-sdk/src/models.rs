//! Domain models for the access resolver module.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AccessResolverError;
use crate::permissions::{self, ResourceType};

pub type FormId = i64;
pub type SubmissionId = i64;

/// Well-known `user_id` of [`AuthorizationData`] for callers without identity.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// Kind of token carried by an [`AccessContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    /// Self-contained signed token; permissions and expiry are embedded.
    AccessToken,
    /// Opaque token registered server-side and resolved by lookup.
    SubmissionToken,
}

/// What the caller is trying to reach.
///
/// `token` and `token_type` are either both set or both absent; see
/// [`AccessContext::validate`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessContext {
    pub form_id: FormId,
    #[serde(default)]
    pub submission_id: Option<SubmissionId>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_type: Option<TokenType>,
}

impl AccessContext {
    /// Context for a form without submission or token.
    #[must_use]
    pub fn for_form(form_id: FormId) -> Self {
        Self {
            form_id,
            submission_id: None,
            token: None,
            token_type: None,
        }
    }

    #[must_use]
    pub fn with_submission(mut self, submission_id: SubmissionId) -> Self {
        self.submission_id = Some(submission_id);
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, token_type: TokenType) -> Self {
        self.token = Some(token.into());
        self.token_type = Some(token_type);
        self
    }

    /// Check the structural invariants of the context.
    ///
    /// # Errors
    ///
    /// Returns [`AccessResolverError::InvalidContext`] when an id is not
    /// positive, the token is empty, or only one of `token` / `token_type`
    /// is set.
    pub fn validate(&self) -> Result<(), AccessResolverError> {
        if self.form_id <= 0 {
            return Err(AccessResolverError::InvalidContext(format!(
                "form id must be positive, got {}",
                self.form_id
            )));
        }
        if let Some(submission_id) = self.submission_id.filter(|id| *id <= 0) {
            return Err(AccessResolverError::InvalidContext(format!(
                "submission id must be positive, got {submission_id}"
            )));
        }
        match (&self.token, self.token_type) {
            (Some(token), Some(_)) if token.is_empty() => Err(
                AccessResolverError::InvalidContext("token must not be empty".to_owned()),
            ),
            (Some(_), Some(_)) | (None, None) => Ok(()),
            (Some(_), None) => Err(AccessResolverError::InvalidContext(
                "token supplied without token type".to_owned(),
            )),
            (None, Some(_)) => Err(AccessResolverError::InvalidContext(
                "token type supplied without token".to_owned(),
            )),
        }
    }
}

impl std::fmt::Debug for AccessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessContext")
            .field("form_id", &self.form_id)
            .field("submission_id", &self.submission_id)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Normalized permission set for one form and, optionally, one submission.
///
/// An empty set means "no access". Permission strings come from
/// [`permissions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessData {
    pub form_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(default)]
    pub form_permissions: HashSet<String>,
    #[serde(default)]
    pub submission_permissions: HashSet<String>,
}

impl AccessData {
    /// Empty (no access) result for the given ids.
    #[must_use]
    pub fn new(form_id: FormId, submission_id: Option<SubmissionId>) -> Self {
        Self {
            form_id: form_id.to_string(),
            submission_id: submission_id.map(|id| id.to_string()),
            form_permissions: HashSet::new(),
            submission_permissions: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_form_permissions(mut self, grants: &[&str]) -> Self {
        extend_checked(&mut self.form_permissions, ResourceType::Form, grants);
        self
    }

    #[must_use]
    pub fn with_submission_permissions(mut self, grants: &[&str]) -> Self {
        extend_checked(
            &mut self.submission_permissions,
            ResourceType::Submission,
            grants,
        );
        self
    }

    /// Union of form and submission permissions.
    #[must_use]
    pub fn all_permissions(&self) -> HashSet<&str> {
        self.form_permissions
            .iter()
            .chain(&self.submission_permissions)
            .map(String::as_str)
            .collect()
    }

    #[must_use]
    pub fn has(&self, permission: &str) -> bool {
        self.form_permissions.contains(permission)
            || self.submission_permissions.contains(permission)
    }

    #[must_use]
    pub fn has_any(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has(p))
    }

    /// `true` for an empty slice.
    #[must_use]
    pub fn has_all(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.has(p))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.form_permissions.is_empty() && self.submission_permissions.is_empty()
    }

    /// Set union of both permission sets. Ids are taken from `self`, falling
    /// back to `other` when `self` has no submission id.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            form_id: self.form_id.clone(),
            submission_id: self
                .submission_id
                .clone()
                .or_else(|| other.submission_id.clone()),
            form_permissions: self
                .form_permissions
                .union(&other.form_permissions)
                .cloned()
                .collect(),
            submission_permissions: self
                .submission_permissions
                .union(&other.submission_permissions)
                .cloned()
                .collect(),
        }
    }

    /// Whether this result was computed for `submission_id`.
    #[must_use]
    pub fn is_for_submission(&self, submission_id: SubmissionId) -> bool {
        self.submission_id.as_deref() == Some(submission_id.to_string().as_str())
    }
}

fn extend_checked(target: &mut HashSet<String>, resource_type: ResourceType, grants: &[&str]) {
    for grant in grants {
        debug_assert!(
            permissions::is_known(resource_type, grant),
            "permission {grant} is not in the {resource_type:?} catalog"
        );
        target.insert((*grant).to_owned());
    }
}

/// A computed value plus the metadata clients need to cooperate with caching.
///
/// Created once per computation and never mutated; a new computation yields a
/// new `e_tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEnvelope<T> {
    #[serde(flatten)]
    pub data: T,
    #[serde(with = "time::serde::rfc3339")]
    pub cached_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(rename = "eTag")]
    pub e_tag: String,
}

impl<T> CachedEnvelope<T> {
    /// Wrap `data` computed now, valid for `ttl`.
    #[must_use]
    pub fn new(data: T, ttl: Duration) -> Self {
        Self::computed_at(data, OffsetDateTime::now_utc(), ttl)
    }

    #[must_use]
    pub fn computed_at(data: T, cached_at: OffsetDateTime, ttl: Duration) -> Self {
        Self {
            data,
            cached_at,
            expires_at: cached_at + ttl,
            e_tag: new_etag(),
        }
    }

    /// Time left until expiry; zero once expired.
    #[must_use]
    pub fn remaining_ttl(&self, now: OffsetDateTime) -> Duration {
        Duration::try_from(self.expires_at - now).unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Evaluate an `If-None-Match` header value against this envelope.
    ///
    /// Accepts `*`, quoted or bare tags, weak (`W/`) tags and comma-separated
    /// lists.
    #[must_use]
    pub fn matches_etag(&self, if_none_match: &str) -> bool {
        if_none_match.split(',').map(str::trim).any(|candidate| {
            if candidate == "*" {
                return true;
            }
            let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
            candidate.trim_matches('"') == self.e_tag
        })
    }
}

/// Fresh opaque entity tag.
#[must_use]
pub fn new_etag() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Identity of the caller as reported by the identity collaborator.
///
/// Read-only input to the engine; the collaborator owns its caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationData {
    pub user_id: String,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub roles: HashSet<String>,
    #[serde(default)]
    pub permissions: HashSet<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub cached_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(rename = "eTag")]
    pub e_tag: String,
}

impl AuthorizationData {
    /// Identity with no roles or permissions, valid for `ttl`.
    #[must_use]
    pub fn new(user_id: impl Into<String>, tenant_id: Option<Uuid>, ttl: Duration) -> Self {
        let cached_at = OffsetDateTime::now_utc();
        Self {
            user_id: user_id.into(),
            tenant_id,
            roles: HashSet::new(),
            permissions: HashSet::new(),
            cached_at,
            expires_at: cached_at + ttl,
            e_tag: new_etag(),
        }
    }

    #[must_use]
    pub fn anonymous(ttl: Duration) -> Self {
        Self::new(ANONYMOUS_USER_ID, None, ttl)
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANONYMOUS_USER_ID
    }

    /// Holds the `Admin` or `PlatformAdmin` role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(permissions::roles::ADMIN)
            || self.roles.contains(permissions::roles::PLATFORM_ADMIN)
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Claims embedded in a verified signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAccessTokenClaims {
    pub submission_id: SubmissionId,
    /// Short names: `view`, `edit`, `export`.
    #[serde(default)]
    pub permissions: HashSet<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}
