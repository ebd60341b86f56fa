//! Foundation types for tskv.
//!
//! tskv stores opaque byte blobs under hierarchical keys. Every hierarchical
//! save writes a mutable `latest` record next to an immutable tagged copy, so
//! older values can be listed and restored. This crate holds the pieces that
//! every driver and caller shares.
//!
//! # Key Types
//!
//! - [`AddressPath`] — ordered path segments that render to a `/`-joined prefix
//! - [`Storable`] — the capability set an entity needs in order to be persisted
//! - [`Value`] — raw in-memory byte blob
//! - [`File`] — named, file-like byte blob
//! - [`Document`] — typed JSON payload, stored gzip-compressed

pub mod document;
pub mod entity;
pub mod error;
pub mod path;
pub mod tag;

pub use document::Document;
pub use entity::{File, Storable, Value};
pub use error::{TypeError, TypeResult};
pub use path::{join, AddressPath};
pub use tag::{generate_uuid, timestamp_tag, LATEST};
