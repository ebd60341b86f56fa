//! The storable entity contract and its byte-blob variants.

use crate::error::TypeResult;
use crate::path::AddressPath;

/// Capability set a caller-supplied object needs in order to be persisted.
///
/// Drivers never inspect entity state beyond these methods. The key is the
/// leaf segment under an [`AddressPath`], or the whole physical key when no
/// hierarchy is used.
pub trait Storable {
    /// Caller-chosen identifier of the entity.
    fn key(&self) -> &str;

    /// Prefix of this entity's versioned records under `parent`.
    fn path(&self, parent: &AddressPath) -> String {
        parent.join(self.key())
    }

    /// Byte representation written to the backend.
    fn marshal(&self) -> TypeResult<Vec<u8>>;

    /// Replace the entity's state with a fetched byte representation.
    fn unmarshal(&mut self, bytes: &[u8]) -> TypeResult<()>;

    /// Whether the entity is stored gzip-compressed. Fixed per entity type.
    fn is_compressed(&self) -> bool {
        false
    }

    /// Called once after a successful save with the tag that was written.
    fn save_id(&mut self, _tag: &str) {}
}

/// Raw in-memory byte blob.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Value {
    key: String,
    storage: Vec<u8>,
}

impl Value {
    pub fn new(key: impl Into<String>, storage: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            storage: storage.into(),
        }
    }

    /// A value with no content, ready to be loaded.
    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(key, Vec::new())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.storage
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.storage
    }
}

impl Storable for Value {
    fn key(&self) -> &str {
        &self.key
    }

    fn marshal(&self) -> TypeResult<Vec<u8>> {
        Ok(self.storage.clone())
    }

    fn unmarshal(&mut self, bytes: &[u8]) -> TypeResult<()> {
        self.storage = bytes.to_vec();
        Ok(())
    }
}

/// Named, file-like byte blob.
///
/// Remembers the tag of its most recent save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct File {
    name: String,
    content: Vec<u8>,
    last_tag: Option<String>,
}

impl File {
    /// Create a file. `None` content is the same as empty content.
    pub fn new(name: impl Into<String>, content: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.unwrap_or_default(),
            last_tag: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Tag recorded by the last successful save, if any.
    pub fn last_tag(&self) -> Option<&str> {
        self.last_tag.as_deref()
    }
}

impl Storable for File {
    fn key(&self) -> &str {
        &self.name
    }

    fn marshal(&self) -> TypeResult<Vec<u8>> {
        Ok(self.content.clone())
    }

    fn unmarshal(&mut self, bytes: &[u8]) -> TypeResult<()> {
        self.content = bytes.to_vec();
        Ok(())
    }

    fn save_id(&mut self, tag: &str) {
        self.last_tag = Some(tag.to_string());
    }
}
