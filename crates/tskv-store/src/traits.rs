use std::collections::BTreeSet;

use tskv_types::{timestamp_tag, AddressPath, Storable, LATEST};

use crate::error::StoreResult;
use crate::keys;

/// Versioned object storage driver.
///
/// All implementations must satisfy these invariants:
/// - A save under a hierarchy writes `<path>/latest` and `<path>/<tag>`
///   with identical bytes in one atomic write. Both change or neither does.
/// - A save without a hierarchy writes exactly one record at the bare key.
/// - Reading an absent physical key fails with `StoreError::NotFound` and
///   leaves the entity untouched.
/// - Version listings have set semantics and never contain nested paths.
/// - `lock` is an atomic create-if-absent on `lock/<key>`; `unlock` is
///   idempotent.
/// - Backend errors are propagated with the physical key that failed.
pub trait StorageDriver: Send + Sync {
    /// Create the backing namespace if absent. Safe to call repeatedly.
    fn setup(&self) -> StoreResult<()>;

    /// Release held resources.
    fn teardown(&self) -> StoreResult<()>;

    /// Load a specific version of `entity` into it.
    ///
    /// Without a hierarchy the bare entity key is read and `tag` is ignored.
    fn get_version(
        &self,
        entity: &mut dyn Storable,
        path: Option<&AddressPath>,
        tag: &str,
    ) -> StoreResult<()>;

    /// Every physical key starting with `prefix`, in key order.
    fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Write `entity` as `latest` and as `tag`, then report `tag` to it.
    fn save_tag(
        &self,
        entity: &mut dyn Storable,
        path: Option<&AddressPath>,
        tag: &str,
    ) -> StoreResult<()>;

    /// Remove the record at `prefix` and every record below `prefix/`.
    fn delete_keys(&self, prefix: &str) -> StoreResult<()>;

    /// Take the advisory lock `lock/<key>`, failing if it is already held.
    fn lock(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Release the advisory lock. Releasing an absent lock succeeds.
    fn unlock(&self, key: &str) -> StoreResult<()>;

    /// Load the `latest` version of `entity`.
    fn get(&self, entity: &mut dyn Storable, path: Option<&AddressPath>) -> StoreResult<()> {
        self.get_version(entity, path, LATEST)
    }

    /// Every version name stored directly below the entity's prefix,
    /// including `latest`.
    fn get_versions(
        &self,
        entity: &dyn Storable,
        path: Option<&AddressPath>,
    ) -> StoreResult<BTreeSet<String>> {
        let prefix = keys::version_prefix(entity, path);
        let found = self.scan_keys(&format!("{prefix}/"))?;
        Ok(keys::versions_under(&prefix, found.iter().map(String::as_str)))
    }

    /// One-level folders below `prefix`, split on `separator`.
    fn get_keys(&self, prefix: &str, separator: &str) -> StoreResult<BTreeSet<String>> {
        let found = self.scan_keys(prefix)?;
        keys::folders_under(prefix, separator, found.iter().map(String::as_str))
    }

    /// Save `entity` tagged with the current time in nanoseconds. Returns
    /// the tag used.
    fn save(&self, entity: &mut dyn Storable, path: Option<&AddressPath>) -> StoreResult<String> {
        let tag = timestamp_tag();
        self.save_tag(entity, path, &tag)?;
        Ok(tag)
    }
}
