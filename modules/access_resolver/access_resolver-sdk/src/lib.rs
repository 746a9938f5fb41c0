#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Access Resolver SDK
//!
//! This crate provides the public API for the `access_resolver` module:
//!
//! - [`AccessResolverClient`] - Public API trait for endpoints
//! - [`IdentityResolverClient`], [`SubmissionTokenResolverClient`],
//!   [`SignedTokenValidatorClient`], [`FormMetadataClient`] - Collaborator
//!   traits the engine consumes (implemented by plugins)
//! - [`AccessContext`], [`AccessData`], [`CachedEnvelope`] - Request and result models
//! - [`AuthorizationData`], [`SignedAccessTokenClaims`] - Collaborator outputs
//! - [`permissions`] - Static permission vocabulary and named permission sets
//! - [`AccessResolverError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use access_resolver_sdk::{AccessContext, AccessResolverClient, permissions};
//!
//! let ctx = AccessContext::for_form(42).with_submission(7);
//! let envelope = access.get_access_data(&security_ctx, &ctx).await?;
//!
//! if envelope.data.has(permissions::submission::VIEW) {
//!     // render the submission
//! }
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod permissions;
pub mod plugin_api;
pub mod security;

// Re-export main types at crate root
pub use api::AccessResolverClient;
pub use error::AccessResolverError;
pub use models::{
    AccessContext, AccessData, AuthorizationData, CachedEnvelope, FormId, SignedAccessTokenClaims,
    SubmissionId, TokenType,
};
pub use permissions::ResourceType;
pub use plugin_api::{
    FormMetadataClient, IdentityResolverClient, SignedTokenValidatorClient,
    SubmissionTokenResolverClient,
};
pub use security::SecurityContext;
