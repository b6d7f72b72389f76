//! Keyed query cache with stale-while-revalidate reads, request
//! de-duplication and optimistic mutations.
//!
//! A query is identified by its [`QueryKey`]. For a single key at most one
//! fetch is in flight, and among overlapping writes (fetch results and
//! optimistic writes alike) the last one issued wins.

pub mod cache;
pub mod key;
pub mod mutation;

pub use cache::{CacheEntry, QueryCache, QueryDescriptor, QueryStatus, QuerySubscription, Snapshot};
pub use key::{KeyPart, QueryKey};
