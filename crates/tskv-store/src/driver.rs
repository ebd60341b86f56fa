use std::collections::BTreeSet;

use tracing::debug;

use tskv_types::{AddressPath, Storable};

use crate::config::BackendConfig;
use crate::distributed::EtcdDriver;
use crate::embedded::EmbeddedDriver;
use crate::error::StoreResult;
use crate::traits::StorageDriver;

/// A driver for whichever backend the configuration selects.
#[derive(Debug)]
pub enum Driver {
    Etcd(EtcdDriver),
    Embedded(EmbeddedDriver),
}

impl Driver {
    /// Open the configured backend. Does not call [`StorageDriver::setup`].
    pub fn open(config: &BackendConfig) -> StoreResult<Self> {
        match config {
            BackendConfig::Etcd(etcd) => Ok(Self::Etcd(EtcdDriver::connect(etcd.clone())?)),
            BackendConfig::Embedded(embedded) => {
                Ok(Self::Embedded(EmbeddedDriver::open(embedded.clone())?))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Etcd(_) => "etcd",
            Self::Embedded(_) => "embedded",
        }
    }

    fn inner(&self) -> &dyn StorageDriver {
        match self {
            Self::Etcd(d) => d,
            Self::Embedded(d) => d,
        }
    }
}

impl StorageDriver for Driver {
    fn setup(&self) -> StoreResult<()> {
        self.inner().setup()
    }

    fn teardown(&self) -> StoreResult<()> {
        self.inner().teardown()
    }

    fn get_version(
        &self,
        entity: &mut dyn Storable,
        path: Option<&AddressPath>,
        tag: &str,
    ) -> StoreResult<()> {
        self.inner().get_version(entity, path, tag)
    }

    fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner().scan_keys(prefix)
    }

    fn get_versions(
        &self,
        entity: &dyn Storable,
        path: Option<&AddressPath>,
    ) -> StoreResult<BTreeSet<String>> {
        self.inner().get_versions(entity, path)
    }

    fn get_keys(&self, prefix: &str, separator: &str) -> StoreResult<BTreeSet<String>> {
        self.inner().get_keys(prefix, separator)
    }

    fn save_tag(
        &self,
        entity: &mut dyn Storable,
        path: Option<&AddressPath>,
        tag: &str,
    ) -> StoreResult<()> {
        self.inner().save_tag(entity, path, tag)
    }

    fn delete_keys(&self, prefix: &str) -> StoreResult<()> {
        self.inner().delete_keys(prefix)
    }

    fn lock(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner().lock(key, value)
    }

    fn unlock(&self, key: &str) -> StoreResult<()> {
        self.inner().unlock(key)
    }
}

/// Make the value saved as `tag` current again, saving it as `new_tag`.
///
/// `entity` ends up holding the restored value. Fails with `NotFound` if
/// `tag` was never written under `path`.
pub fn rollback(
    driver: &dyn StorageDriver,
    entity: &mut dyn Storable,
    path: &AddressPath,
    tag: &str,
    new_tag: &str,
) -> StoreResult<()> {
    driver.get_version(entity, Some(path), tag)?;
    driver.save_tag(entity, Some(path), new_tag)?;
    debug!(key = entity.key(), from = tag, to = new_tag, "rolled back");
    Ok(())
}
