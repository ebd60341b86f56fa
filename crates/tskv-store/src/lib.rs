//! Versioned object storage drivers for tskv.
//!
//! A driver stores opaque byte blobs under hierarchical keys. Saving under
//! an [`AddressPath`](tskv_types::AddressPath) writes the mutable `latest`
//! record and an immutable tagged copy in one atomic write; the tags of a key
//! can be listed, and any of them restored.
//!
//! # Backends
//!
//! All backends implement the [`StorageDriver`] trait:
//!
//! - [`EtcdDriver`] -- an etcd v3 cluster; saves are etcd transactions
//!   guarded by a lease-bound lock
//! - [`EmbeddedDriver`] -- a local redb file for single-node deployments
//!   and tests
//!
//! [`Driver`] selects one of them from a [`BackendConfig`].
//!
//! # Design Rules
//!
//! 1. `latest` and the tagged copy change together or not at all.
//! 2. Reading an absent key is an error (`StoreError::NotFound`), on every backend.
//! 3. Version listings are sets and never descend into nested paths.
//! 4. JSON sniffing and gzip happen client-side; backends see opaque bytes.
//! 5. Backend errors are propagated with the key that failed, never retried.

pub mod codec;
pub mod config;
pub mod distributed;
pub mod driver;
pub mod embedded;
pub mod error;
pub mod keys;
pub mod traits;

#[cfg(test)]
mod contract;

pub use config::{BackendConfig, EmbeddedConfig, EtcdConfig};
pub use distributed::EtcdDriver;
pub use driver::{rollback, Driver};
pub use embedded::EmbeddedDriver;
pub use error::{StoreError, StoreResult};
pub use traits::StorageDriver;
