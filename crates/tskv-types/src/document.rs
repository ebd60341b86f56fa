use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entity::Storable;
use crate::error::{TypeError, TypeResult};

/// Typed JSON payload.
///
/// Documents are stored gzip-compressed. Drivers pass plain JSON through
/// untouched on read, so records written uncompressed still load.
#[derive(Clone, Debug, PartialEq)]
pub struct Document<T> {
    key: String,
    value: T,
    version: Option<String>,
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(key: impl Into<String>, value: T) -> Self {
        Self {
            key: key.into(),
            value,
            version: None,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Tag of the last successful save.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// A document holding `T::default()`, ready to be loaded.
    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(key, T::default())
    }
}

impl<T> Storable for Document<T>
where
    T: Serialize + DeserializeOwned,
{
    fn key(&self) -> &str {
        &self.key
    }

    fn marshal(&self) -> TypeResult<Vec<u8>> {
        serde_json::to_vec(&self.value).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    fn unmarshal(&mut self, bytes: &[u8]) -> TypeResult<()> {
        self.value =
            serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(())
    }

    fn is_compressed(&self) -> bool {
        true
    }

    fn save_id(&mut self, tag: &str) {
        self.version = Some(tag.to_string());
    }
}
