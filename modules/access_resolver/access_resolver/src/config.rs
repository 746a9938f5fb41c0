//! Configuration for the access resolver.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

/// Environment variable prefix for overrides, e.g. `ACCESS_RESOLVER__MAX_CAPACITY`.
pub const ENV_PREFIX: &str = "ACCESS_RESOLVER__";

/// Module configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessResolverConfig {
    /// Default TTL of signed-token results, before the per-token override.
    pub signed_token_ttl_secs: u64,

    /// TTL of opaque submission-token results.
    pub opaque_token_ttl_secs: u64,

    /// TTL of public-form results.
    pub public_form_ttl_secs: u64,

    /// TTL of private-form (RBAC) results.
    pub private_form_ttl_secs: u64,

    /// TTL of the cached "is this form public" lookup.
    pub form_visibility_ttl_secs: u64,

    /// Lifetime advertised on admin envelopes. Admin results are not cached.
    pub admin_ttl_secs: u64,

    /// Subtracted from a signed token's expiry when deriving its cache TTL.
    pub token_safety_margin_secs: u64,

    /// Maximum number of entries in the local cache tier.
    pub max_capacity: u64,
}

impl Default for AccessResolverConfig {
    fn default() -> Self {
        Self {
            signed_token_ttl_secs: 600,
            opaque_token_ttl_secs: 900,
            public_form_ttl_secs: 600,
            private_form_ttl_secs: 300,
            form_visibility_ttl_secs: 3600,
            admin_ttl_secs: 60,
            token_safety_margin_secs: 10,
            max_capacity: 10_000,
        }
    }
}

impl AccessResolverConfig {
    /// Load from a YAML file with `ACCESS_RESOLVER__*` environment overrides.
    ///
    /// Missing fields fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or contains unknown keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    #[must_use]
    pub fn signed_token_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_token_ttl_secs)
    }

    #[must_use]
    pub fn opaque_token_ttl(&self) -> Duration {
        Duration::from_secs(self.opaque_token_ttl_secs)
    }

    #[must_use]
    pub fn public_form_ttl(&self) -> Duration {
        Duration::from_secs(self.public_form_ttl_secs)
    }

    #[must_use]
    pub fn private_form_ttl(&self) -> Duration {
        Duration::from_secs(self.private_form_ttl_secs)
    }

    #[must_use]
    pub fn form_visibility_ttl(&self) -> Duration {
        Duration::from_secs(self.form_visibility_ttl_secs)
    }

    #[must_use]
    pub fn admin_ttl(&self) -> Duration {
        Duration::from_secs(self.admin_ttl_secs)
    }

    #[must_use]
    pub fn token_safety_margin(&self) -> Duration {
        Duration::from_secs(self.token_safety_margin_secs)
    }
}
