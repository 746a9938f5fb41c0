//! Domain layer for the access resolver.

pub mod cache;
pub mod error;
pub mod local_client;
pub mod merger;
pub mod resolvers;
pub mod route;
pub mod service;

pub use cache::{AccessCache, DistributedCacheTier, InProcessTier, NoCache, TieredCache};
pub use error::DomainError;
pub use local_client::AccessResolverLocalClient;
pub use route::{CacheInstruction, Route, RouteClassifier};
pub use service::{AccessEnvelope, Collaborators, Service};
