//! Client-side query cache for the dashboard.
//!
//! - [`keys`]: hierarchical key factory per [`Resource`].
//! - [`invalidation`]: which keys a [`Mutation`] makes stale.
//! - [`QueryCache`]: the store those keys address.
//!
//! [`Resource`]: api_types::Resource
pub use cache::{CacheConfig, QueryCache};
pub use invalidation::{Mutation, dependents_closure, derived};
pub use keys::{Filters, KeyFactory, QueryKey, ResourceKeys, Segment};

mod cache;
pub mod invalidation;
pub mod keys;
