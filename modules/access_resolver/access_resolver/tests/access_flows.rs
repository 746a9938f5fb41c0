#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end access flows through the module-built client, backed by the
//! static access plugin.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use access_resolver::domain::InProcessTier;
use access_resolver::{AccessResolverConfig, AccessResolverModule};
use access_resolver_sdk::permissions::{form, submission};
use access_resolver_sdk::{
    AccessContext, AccessResolverClient, AccessResolverError, AuthorizationData, FormId,
    FormMetadataClient, IdentityResolverClient, SecurityContext, SignedAccessTokenClaims,
    SignedTokenValidatorClient, SubmissionId, SubmissionTokenResolverClient, TokenType,
};
use async_trait::async_trait;
use static_access_plugin::config::{
    IdentityConfig, IdentityMapping, SignedTokenConfig, SubmissionTokenMapping,
};
use static_access_plugin::{StaticAccessPlugin, StaticAccessPluginConfig};
use tracing_test::traced_test;

const PUBLIC_FORM: FormId = 42;
const PRIVATE_FORM: FormId = 50;

#[derive(Default)]
struct Calls {
    identity: AtomicUsize,
    submission_tokens: AtomicUsize,
    signed_tokens: AtomicUsize,
    forms: AtomicUsize,
}

impl Calls {
    fn non_identity(&self) -> usize {
        self.submission_tokens.load(Ordering::SeqCst)
            + self.signed_tokens.load(Ordering::SeqCst)
            + self.forms.load(Ordering::SeqCst)
    }
}

#[derive(Default, Clone, Copy)]
struct Delays {
    forms: Duration,
    submission_tokens: Duration,
}

/// Static plugin wrapped with call counters and artificial latency.
struct Counting {
    inner: StaticAccessPlugin,
    calls: Arc<Calls>,
    delays: Delays,
}

#[async_trait]
impl IdentityResolverClient for Counting {
    async fn resolve(
        &self,
        ctx: &SecurityContext,
    ) -> Result<AuthorizationData, AccessResolverError> {
        self.calls.identity.fetch_add(1, Ordering::SeqCst);
        IdentityResolverClient::resolve(&self.inner, ctx).await
    }
}

#[async_trait]
impl SubmissionTokenResolverClient for Counting {
    async fn resolve(&self, token: &str) -> Result<Option<SubmissionId>, AccessResolverError> {
        self.calls.submission_tokens.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delays.submission_tokens).await;
        SubmissionTokenResolverClient::resolve(&self.inner, token).await
    }
}

#[async_trait]
impl SignedTokenValidatorClient for Counting {
    async fn validate(&self, token: &str) -> Result<SignedAccessTokenClaims, AccessResolverError> {
        self.calls.signed_tokens.fetch_add(1, Ordering::SeqCst);
        self.inner.validate(token).await
    }
}

#[async_trait]
impl FormMetadataClient for Counting {
    async fn is_public(&self, form_id: FormId) -> Result<bool, AccessResolverError> {
        self.calls.forms.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delays.forms).await;
        FormMetadataClient::is_public(&self.inner, form_id).await
    }
}

fn identity(token: &str, user_id: &str, roles: &[&str], permissions: &[&str]) -> IdentityMapping {
    IdentityMapping {
        token: token.to_owned(),
        identity: IdentityConfig {
            user_id: user_id.to_owned(),
            tenant_id: None,
            roles: roles.iter().map(|r| (*r).to_owned()).collect(),
            permissions: permissions.iter().map(|p| (*p).to_owned()).collect(),
        },
    }
}

fn signed(
    token: &str,
    submission_id: SubmissionId,
    names: &[&str],
    secs: u64,
) -> SignedTokenConfig {
    SignedTokenConfig {
        token: token.to_owned(),
        submission_id,
        permissions: names.iter().map(|n| (*n).to_owned()).collect(),
        expires_at: None,
        expires_in_secs: Some(secs),
    }
}

fn plugin_config() -> StaticAccessPluginConfig {
    StaticAccessPluginConfig {
        identities: vec![
            identity("admin-token", "root", &["Admin"], &[]),
            identity("reviewer-token", "reviewer", &["Reviewer"], &["forms.view"]),
            identity("guest-token", "guest", &[], &[]),
        ],
        public_forms: vec![PUBLIC_FORM],
        submission_tokens: vec![SubmissionTokenMapping {
            token: "opaque-7".to_owned(),
            submission_id: 7,
        }],
        signed_tokens: vec![
            signed("jwt-edit-7", 7, &["edit"], 5),
            signed("jwt-view-7", 7, &["view"], 3600),
        ],
        ..StaticAccessPluginConfig::default()
    }
}

struct Harness {
    client: Arc<dyn AccessResolverClient>,
    calls: Arc<Calls>,
}

fn build(delays: Delays, tier: Option<Arc<InProcessTier>>) -> Harness {
    let calls = Arc::new(Calls::default());
    let collaborators = Arc::new(Counting {
        inner: StaticAccessPlugin::from_config(&plugin_config()).unwrap(),
        calls: calls.clone(),
        delays,
    });
    let mut module =
        AccessResolverModule::new(AccessResolverConfig::default()).collaborators(collaborators);
    if let Some(tier) = tier {
        module = module.distributed_tier(tier);
    }
    Harness {
        client: module.build().unwrap(),
        calls,
    }
}

fn harness() -> Harness {
    build(Delays::default(), None)
}

fn caller(token: &str) -> SecurityContext {
    SecurityContext::builder().bearer_token(token).build()
}

fn sorted(perms: &HashSet<String>) -> Vec<&str> {
    let mut v: Vec<&str> = perms.iter().map(String::as_str).collect();
    v.sort_unstable();
    v
}

#[tokio::test]
async fn public_form_new_submission_grants_view_and_create() {
    let h = harness();

    let envelope = h
        .client
        .get_access_data(&SecurityContext::anonymous(), &AccessContext::for_form(PUBLIC_FORM))
        .await
        .unwrap();

    assert_eq!(sorted(&envelope.data.form_permissions), vec![form::VIEW]);
    assert_eq!(
        sorted(&envelope.data.submission_permissions),
        vec![submission::CREATE, submission::FILE_UPLOAD]
    );
    assert_eq!(envelope.data.form_id, "42");
}

#[tokio::test]
async fn opaque_token_grants_review_of_its_submission() {
    let h = harness();
    let ctx = AccessContext::for_form(PUBLIC_FORM)
        .with_submission(7)
        .with_token("opaque-7", TokenType::SubmissionToken);

    let envelope = h
        .client
        .get_access_data(&SecurityContext::anonymous(), &ctx)
        .await
        .unwrap();

    assert!(envelope.data.form_permissions.is_empty());
    assert_eq!(
        sorted(&envelope.data.submission_permissions),
        vec![submission::FILE_VIEW, submission::VIEW]
    );
    assert_eq!(h.calls.forms.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cached_token_result_reports_the_requested_form() {
    let h = harness();
    let anonymous = SecurityContext::anonymous();
    let other_form =
        AccessContext::for_form(999).with_token("opaque-7", TokenType::SubmissionToken);
    let public_form =
        AccessContext::for_form(PUBLIC_FORM).with_token("opaque-7", TokenType::SubmissionToken);

    let first = h.client.get_access_data(&anonymous, &other_form).await.unwrap();
    let second = h.client.get_access_data(&anonymous, &public_form).await.unwrap();

    assert_eq!(first.data.form_id, "999");
    assert_eq!(second.data.form_id, "42");
    assert_eq!(second.data.submission_id.as_deref(), Some("7"));
    assert_eq!(h.calls.submission_tokens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn signed_token_near_expiry_is_cached_for_one_second() {
    let h = harness();
    let ctx = AccessContext::for_form(PUBLIC_FORM).with_token("jwt-edit-7", TokenType::AccessToken);
    let anonymous = SecurityContext::anonymous();

    let first = h.client.get_access_data(&anonymous, &ctx).await.unwrap();
    assert_eq!(first.expires_at - first.cached_at, time::Duration::seconds(1));
    assert!(first.data.has_all(&[
        submission::VIEW,
        submission::EDIT,
        submission::FILE_UPLOAD,
        submission::FILE_DELETE
    ]));

    let cached = h.client.get_access_data(&anonymous, &ctx).await.unwrap();
    assert_eq!(cached.e_tag, first.e_tag);
    assert_eq!(h.calls.signed_tokens.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let recomputed = h.client.get_access_data(&anonymous, &ctx).await.unwrap();
    assert_eq!(recomputed.data, first.data);
    assert_ne!(recomputed.e_tag, first.e_tag);
    assert_eq!(h.calls.signed_tokens.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn private_form_without_rbac_permission_is_forbidden_but_merge_succeeds() {
    let h = harness();
    let ctx = AccessContext::for_form(PRIVATE_FORM);
    let guest = caller("guest-token");

    let err = h.client.get_access_data(&guest, &ctx).await.unwrap_err();
    assert!(matches!(err, AccessResolverError::Forbidden { .. }));
    assert_eq!(err.code(), "access_denied");

    let merged = h.client.get_merged_access_data(&guest, &ctx).await.unwrap();
    assert!(merged.data.is_empty());
}

#[tokio::test]
async fn private_form_anonymous_caller_must_sign_in() {
    let h = harness();

    let err = h
        .client
        .get_access_data(&SecurityContext::anonymous(), &AccessContext::for_form(PRIVATE_FORM))
        .await
        .unwrap_err();

    assert_eq!(err, AccessResolverError::Unauthenticated);
    assert_eq!(err.code(), "authentication_required");
}

#[tokio::test]
async fn private_form_reviewer_can_create_but_not_view_submissions() {
    let h = harness();
    let ctx = AccessContext::for_form(PRIVATE_FORM).with_submission(9);

    let envelope = h
        .client
        .get_access_data(&caller("reviewer-token"), &ctx)
        .await
        .unwrap();

    assert!(envelope.data.form_permissions.is_empty());
    assert!(envelope.data.has(submission::CREATE));
    assert!(!envelope.data.has(submission::VIEW));
}

#[tokio::test]
async fn unknown_bearer_token_is_unauthenticated() {
    let h = harness();

    let err = h
        .client
        .get_access_data(&caller("forged"), &AccessContext::for_form(PUBLIC_FORM))
        .await
        .unwrap_err();

    assert_eq!(err, AccessResolverError::Unauthenticated);
}

#[tokio::test]
#[traced_test]
async fn admin_gets_full_catalog_without_touching_collaborators() {
    let h = harness();
    let ctx = AccessContext::for_form(PRIVATE_FORM)
        .with_submission(7)
        .with_token("opaque-unknown", TokenType::SubmissionToken);

    let envelope = h
        .client
        .get_access_data(&caller("admin-token"), &ctx)
        .await
        .unwrap();

    assert!(envelope.data.has_all(&[form::VIEW, form::DESIGN]));
    assert!(envelope.data.has_all(&[
        submission::CREATE,
        submission::VIEW,
        submission::EDIT,
        submission::FILE_UPLOAD,
        submission::FILE_DELETE,
        submission::FILE_VIEW,
        submission::EXPORT
    ]));
    assert_eq!(h.calls.identity.load(Ordering::SeqCst), 1);
    assert_eq!(h.calls.non_identity(), 0);
    assert!(logs_contain("admin bypass"));
}

#[tokio::test]
async fn invalid_context_is_rejected_before_any_lookup() {
    let h = harness();
    let mut ctx = AccessContext::for_form(PUBLIC_FORM);
    ctx.token = Some("opaque-7".to_owned());

    let err = h
        .client
        .get_access_data(&SecurityContext::anonymous(), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, AccessResolverError::InvalidContext(_)));
    assert_eq!(h.calls.identity.load(Ordering::SeqCst), 0);
    assert_eq!(h.calls.non_identity(), 0);
}

#[tokio::test]
async fn token_used_for_another_submission_is_rejected() {
    let h = harness();
    let anonymous = SecurityContext::anonymous();
    let bound = AccessContext::for_form(PUBLIC_FORM)
        .with_submission(7)
        .with_token("jwt-view-7", TokenType::AccessToken);
    let elsewhere = AccessContext::for_form(PUBLIC_FORM)
        .with_submission(8)
        .with_token("jwt-view-7", TokenType::AccessToken);

    h.client.get_access_data(&anonymous, &bound).await.unwrap();
    let err = h.client.get_access_data(&anonymous, &elsewhere).await.unwrap_err();

    assert!(matches!(err, AccessResolverError::InvalidToken(_)));
    assert_eq!(err.code(), "link_expired");
}

#[tokio::test]
async fn invalid_signed_token_is_never_cached() {
    let h = harness();
    let ctx = AccessContext::for_form(PUBLIC_FORM).with_token("jwt-forged", TokenType::AccessToken);

    for _ in 0..2 {
        let err = h
            .client
            .get_access_data(&SecurityContext::anonymous(), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessResolverError::InvalidToken(_)));
    }
    assert_eq!(h.calls.signed_tokens.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_misses_share_one_computation() {
    let h = build(
        Delays {
            submission_tokens: Duration::from_millis(100),
            ..Delays::default()
        },
        None,
    );
    let ctx =
        AccessContext::for_form(PUBLIC_FORM).with_token("opaque-7", TokenType::SubmissionToken);
    let anonymous = SecurityContext::anonymous();

    let results = futures::future::join_all(
        (0..16).map(|_| h.client.get_access_data(&anonymous, &ctx)),
    )
    .await;

    let etags: HashSet<String> = results.into_iter().map(|r| r.unwrap().e_tag).collect();
    assert_eq!(etags.len(), 1);
    assert_eq!(h.calls.submission_tokens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_computation_leaves_no_entry() {
    let h = build(
        Delays {
            submission_tokens: Duration::from_millis(300),
            ..Delays::default()
        },
        None,
    );
    let ctx =
        AccessContext::for_form(PUBLIC_FORM).with_token("opaque-7", TokenType::SubmissionToken);
    let anonymous = SecurityContext::anonymous();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        h.client.get_access_data(&anonymous, &ctx),
    )
    .await;
    assert!(timed_out.is_err());

    h.client.get_access_data(&anonymous, &ctx).await.unwrap();
    assert_eq!(h.calls.submission_tokens.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidating_a_form_forces_recomputation() {
    let h = harness();
    let ctx = AccessContext::for_form(PUBLIC_FORM);
    let anonymous = SecurityContext::anonymous();

    let first = h.client.get_access_data(&anonymous, &ctx).await.unwrap();
    let cached = h.client.get_access_data(&anonymous, &ctx).await.unwrap();
    assert_eq!(first.e_tag, cached.e_tag);

    h.client.invalidate_form(PUBLIC_FORM).await;
    let fresh = h.client.get_access_data(&anonymous, &ctx).await.unwrap();
    assert_ne!(fresh.e_tag, first.e_tag);
    assert_eq!(h.calls.forms.load(Ordering::SeqCst), 2);

    h.client.invalidate_all().await;
    let again = h.client.get_access_data(&anonymous, &ctx).await.unwrap();
    assert_ne!(again.e_tag, fresh.e_tag);
    assert_eq!(h.calls.forms.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn merged_access_unions_public_and_rbac_grants() {
    let h = harness();
    let ctx = AccessContext::for_form(PUBLIC_FORM).with_submission(7);
    let reviewer = caller("reviewer-token");

    let merged = h.client.get_merged_access_data(&reviewer, &ctx).await.unwrap();

    assert_eq!(sorted(&merged.data.form_permissions), vec![form::VIEW]);
    assert_eq!(
        sorted(&merged.data.submission_permissions),
        vec![submission::CREATE, submission::FILE_UPLOAD]
    );

    let cached = h.client.get_merged_access_data(&reviewer, &ctx).await.unwrap();
    assert_eq!(cached.e_tag, merged.e_tag);
}

#[tokio::test]
async fn merged_access_does_not_depend_on_branch_order() {
    let ctx = AccessContext::for_form(PUBLIC_FORM).with_submission(7);
    let reviewer = caller("reviewer-token");

    let public_slow = build(
        Delays {
            forms: Duration::from_millis(50),
            ..Delays::default()
        },
        None,
    );
    let public_fast = harness();

    let a = public_slow
        .client
        .get_merged_access_data(&reviewer, &ctx)
        .await
        .unwrap();
    let b = public_fast
        .client
        .get_merged_access_data(&reviewer, &ctx)
        .await
        .unwrap();

    assert_eq!(a.data, b.data);
}

#[tokio::test]
async fn merged_access_for_anonymous_is_public_only() {
    let h = harness();
    let anonymous = SecurityContext::anonymous();

    let public = h
        .client
        .get_merged_access_data(&anonymous, &AccessContext::for_form(PUBLIC_FORM))
        .await
        .unwrap();
    assert!(public.data.has(form::VIEW));

    let private = h
        .client
        .get_merged_access_data(&anonymous, &AccessContext::for_form(PRIVATE_FORM))
        .await
        .unwrap();
    assert!(private.data.is_empty());
}

#[tokio::test]
async fn distributed_tier_shares_results_between_instances() {
    let tier = Arc::new(InProcessTier::new());
    let first = build(Delays::default(), Some(tier.clone()));
    let second = build(Delays::default(), Some(tier.clone()));
    let ctx = AccessContext::for_form(PUBLIC_FORM)
        .with_submission(7)
        .with_token("opaque-7", TokenType::SubmissionToken);
    let anonymous = SecurityContext::anonymous();

    let a = first.client.get_access_data(&anonymous, &ctx).await.unwrap();
    let b = second.client.get_access_data(&anonymous, &ctx).await.unwrap();

    assert_eq!(a.data, b.data);
    assert_eq!(a.e_tag, b.e_tag);
    assert_eq!(second.calls.submission_tokens.load(Ordering::SeqCst), 0);
    assert!(!tier.is_empty());
}

#[test]
fn module_requires_every_collaborator() {
    let plugin = Arc::new(StaticAccessPlugin::from_config(&plugin_config()).unwrap());

    let result = AccessResolverModule::new(AccessResolverConfig::default())
        .identity(plugin.clone())
        .forms(plugin)
        .build();

    assert!(result.is_err());
}
