//! Client-side content handling: gzip on write, JSON sniffing on read.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use tskv_types::Storable;

use crate::error::{StoreError, StoreResult};

/// Marshal `entity` and compress it if it asks to be.
pub(crate) fn marshal(entity: &dyn Storable) -> StoreResult<Vec<u8>> {
    let raw = entity.marshal().map_err(|source| StoreError::Entity {
        key: entity.key().to_string(),
        source,
    })?;
    encode(raw, entity.is_compressed())
}

/// Decode the record fetched from `key` and load it into `entity`.
pub(crate) fn unmarshal(entity: &mut dyn Storable, key: &str, stored: Vec<u8>) -> StoreResult<()> {
    let bytes = decode(key, stored, entity.is_compressed())?;
    entity
        .unmarshal(&bytes)
        .map_err(|source| StoreError::Entity {
            key: key.to_string(),
            source,
        })
}

/// Bytes to write for a marshalled entity.
pub fn encode(raw: Vec<u8>, compressed: bool) -> StoreResult<Vec<u8>> {
    if !compressed {
        return Ok(raw);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// Bytes to hand to `unmarshal` for a fetched record.
///
/// Valid JSON passes through unchanged. Anything else is gunzipped when the
/// entity is compressed, and passed through as-is when it is not.
pub fn decode(key: &str, stored: Vec<u8>, compressed: bool) -> StoreResult<Vec<u8>> {
    if is_json(&stored) || !compressed {
        return Ok(stored);
    }
    let mut out = Vec::new();
    GzDecoder::new(stored.as_slice())
        .read_to_end(&mut out)
        .map_err(|e| StoreError::Decode {
            key: key.to_string(),
            reason: format!("invalid gzip or json: {e}"),
        })?;
    Ok(out)
}

fn is_json(bytes: &[u8]) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(bytes).is_ok()
}
