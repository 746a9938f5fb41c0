//! Access Resolver Module
//!
//! Computes what a caller may do with a form and its submissions. Four trust
//! contexts (admin, RBAC user, signed access token, opaque submission token)
//! plus anonymous public access are reduced to one normalized permission set,
//! cached per context in a tiered, tag-invalidated cache.
//!
//! The module exposes [`access_resolver_sdk::AccessResolverClient`], built by
//! [`AccessResolverModule`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod module;

pub use config::AccessResolverConfig;
pub use module::AccessResolverModule;
