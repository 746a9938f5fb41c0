//! Local (in-process) client for the access resolver.

use std::sync::Arc;

use access_resolver_sdk::{
    AccessContext, AccessData, AccessResolverClient, AccessResolverError, CachedEnvelope, FormId,
    SecurityContext,
};
use async_trait::async_trait;

use super::{DomainError, Service};

/// Local client wrapping the access service.
pub struct AccessResolverLocalClient {
    svc: Arc<Service>,
}

impl AccessResolverLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> AccessResolverError {
    if e.is_forbidden() || matches!(e, DomainError::Unauthenticated) {
        tracing::debug!(operation = op, error = %e, "access_resolver call denied");
    } else {
        tracing::error!(operation = op, error = ?e, "access_resolver call failed");
    }
    e.into()
}

#[async_trait]
impl AccessResolverClient for AccessResolverLocalClient {
    async fn get_access_data(
        &self,
        security: &SecurityContext,
        ctx: &AccessContext,
    ) -> Result<CachedEnvelope<AccessData>, AccessResolverError> {
        self.svc
            .get_access_data(security, ctx)
            .await
            .map_err(|e| log_and_convert("get_access_data", e))
    }

    async fn get_merged_access_data(
        &self,
        security: &SecurityContext,
        ctx: &AccessContext,
    ) -> Result<CachedEnvelope<AccessData>, AccessResolverError> {
        self.svc
            .get_merged_access_data(security, ctx)
            .await
            .map_err(|e| log_and_convert("get_merged_access_data", e))
    }

    async fn invalidate_form(&self, form_id: FormId) {
        self.svc.invalidate_form(form_id).await;
    }

    async fn invalidate_all(&self) {
        self.svc.invalidate_all().await;
    }
}
