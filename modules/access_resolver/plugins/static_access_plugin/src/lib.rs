//! Static access plugin.
//!
//! Implements every collaborator the access resolver consumes (identity,
//! submission-token registry, signed-token validation, form metadata) from a
//! static configuration. Intended for development and tests.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

pub use config::StaticAccessPluginConfig;
pub use domain::Service as StaticAccessPlugin;
