//! Content-addressed blob storage and per-bundle indexes.
//!
//! See [`blobs::BlobStore`] for the immutable, deduplicated blob layer and
//! [`index::IndexStore`] for the bundle-scoped metadata layer built on top
//! of it. Neither module knows about the other; composing them into a
//! single cache-hit/miss decision is `dcp-core`'s job.

mod atomic;
mod blobs;
mod error;
mod index;
mod layout;
mod manager_version;

pub use blobs::BlobStore;
pub use error::StoreError;
pub use index::{Index, IndexStore};
pub use layout::CacheRoot;
pub use manager_version::describe as describe_manager_version;
