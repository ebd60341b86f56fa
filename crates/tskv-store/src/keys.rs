//! Physical key layout and the prefix-scan enumeration shared by every backend.
//!
//! ```text
//! <path>/<key>/latest   current value of a versioned entity
//! <path>/<key>/<tag>    copy written by the save tagged <tag>
//! <key>                 bare value when no hierarchy is used
//! lock/<key>            advisory lock record
//! savelock/<key>        transient lock held while a save is in flight
//! ```

use std::collections::BTreeSet;

use tskv_types::{join, AddressPath, Storable, LATEST};

use crate::error::{StoreError, StoreResult};

/// Namespace of advisory lock records.
pub const LOCK_PREFIX: &str = "lock";

/// Namespace of the transient locks taken by `save_tag`.
pub const SAVE_LOCK_PREFIX: &str = "savelock";

/// Key read by `get_version`.
pub fn read_key(entity: &dyn Storable, path: Option<&AddressPath>, tag: &str) -> String {
    match path {
        Some(path) => join(&entity.path(path), tag),
        None => entity.key().to_string(),
    }
}

/// Keys written together by `save_tag`: `latest` and the tag under a
/// hierarchy, otherwise just the bare entity key.
pub fn write_keys(entity: &dyn Storable, path: Option<&AddressPath>, tag: &str) -> Vec<String> {
    match path {
        Some(path) => {
            let prefix = entity.path(path);
            vec![join(&prefix, LATEST), join(&prefix, tag)]
        }
        None => vec![entity.key().to_string()],
    }
}

/// Prefix whose direct children are the versions of `entity`.
pub fn version_prefix(entity: &dyn Storable, path: Option<&AddressPath>) -> String {
    match path {
        Some(path) => entity.path(path),
        None => entity.key().to_string(),
    }
}

pub fn lock_key(key: &str) -> String {
    format!("{LOCK_PREFIX}/{key}")
}

pub fn save_lock_key(key: &str) -> String {
    format!("{SAVE_LOCK_PREFIX}/{key}")
}

/// Tags address a single level below the entity prefix. Only checked for
/// saves under a hierarchy; a bare save never writes its tag.
pub fn validate_tag(tag: &str) -> StoreResult<()> {
    if tag.is_empty() {
        return Err(StoreError::InvalidArgument("tag must not be empty".into()));
    }
    if tag.contains('/') {
        return Err(StoreError::InvalidArgument(format!(
            "tag {tag:?} must not contain '/'"
        )));
    }
    if tag == LATEST {
        return Err(StoreError::InvalidArgument(format!(
            "tag {LATEST:?} is reserved"
        )));
    }
    Ok(())
}

/// Version names directly below `prefix`.
///
/// Keeps the first segment after `prefix/` only when nothing nests beneath
/// it, so `a/k/v1` yields `v1` while `a/k/sub/v1` and `a/k2/v1` yield nothing.
pub fn versions_under<'a, I>(prefix: &str, keys: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let dir = format!("{}/", prefix.trim_end_matches('/'));
    keys.into_iter()
        .filter_map(|key| key.strip_prefix(dir.as_str()))
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
        .map(str::to_string)
        .collect()
}

/// One-level folders directly below `prefix`, rendered as
/// `prefix + name + separator`.
///
/// A key counts when its remainder after `prefix` splits into exactly two
/// pieces on `separator`.
pub fn folders_under<'a, I>(prefix: &str, separator: &str, keys: I) -> StoreResult<BTreeSet<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    if separator.is_empty() {
        return Err(StoreError::InvalidArgument(
            "separator must not be empty".into(),
        ));
    }
    Ok(keys
        .into_iter()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter_map(|rest| {
            let mut pieces = rest.split(separator);
            let name = pieces.next()?;
            pieces.next()?;
            if pieces.next().is_some() {
                return None;
            }
            Some(format!("{prefix}{name}{separator}"))
        })
        .collect())
}
