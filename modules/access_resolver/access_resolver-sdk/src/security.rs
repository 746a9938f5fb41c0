//! Caller security context handed to the identity collaborator.

use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

/// Who is calling, as far as the transport layer knows.
///
/// The access resolver never interprets the bearer token itself; it forwards
/// this context to the [`IdentityResolverClient`](crate::IdentityResolverClient)
/// which turns it into [`AuthorizationData`](crate::AuthorizationData).
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    tenant_id: Option<Uuid>,
    bearer_token: Option<SecretString>,
}

impl SecurityContext {
    #[must_use]
    pub fn builder() -> SecurityContextBuilder {
        SecurityContextBuilder::default()
    }

    /// Context for a caller that presented no credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Tenant the request was routed to, if known.
    #[must_use]
    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_ref().map(ExposeSecret::expose_secret)
    }

    /// `true` when no bearer token was presented.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.bearer_token().is_none_or(str::is_empty)
    }
}

/// Builder for [`SecurityContext`].
#[derive(Debug, Default)]
pub struct SecurityContextBuilder {
    tenant_id: Option<Uuid>,
    bearer_token: Option<SecretString>,
}

impl SecurityContextBuilder {
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(SecretString::from(token.into()));
        self
    }

    #[must_use]
    pub fn build(self) -> SecurityContext {
        SecurityContext {
            tenant_id: self.tenant_id,
            bearer_token: self.bearer_token,
        }
    }
}
