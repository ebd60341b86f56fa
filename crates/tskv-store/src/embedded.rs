//! Embedded backend on a local redb database.
//!
//! Every record lives in one table named after the configured namespace.
//! Reads run in their own read transaction. Every write, including the
//! dual-key save, is a single write transaction, so a failure on any key
//! rolls back the whole save. redb admits one write transaction at a time,
//! which serializes concurrent saves to the same entity.

use std::fmt;

use redb::{Database, ReadOnlyTable, ReadableTable, Table, TableDefinition};
use tracing::{debug, info, warn};

use tskv_types::{AddressPath, Storable};

use crate::codec;
use crate::config::EmbeddedConfig;
use crate::error::{StoreError, StoreResult};
use crate::keys;
use crate::traits::StorageDriver;

type Records<'a> = TableDefinition<'a, &'static str, &'static [u8]>;

/// Single-process driver backed by a redb file.
pub struct EmbeddedDriver {
    db: Database,
    table: String,
    config: EmbeddedConfig,
}

impl EmbeddedDriver {
    /// Open (or create) the database file at `config.path`.
    pub fn open(config: EmbeddedConfig) -> StoreResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(&config.path).map_err(|e| {
            StoreError::embedded(format!("open {}", config.path.display()), e)
        })?;
        info!(path = %config.path.display(), table = %config.namespace, "embedded store opened");
        Ok(Self {
            db,
            table: config.namespace.clone(),
            config,
        })
    }

    pub fn config(&self) -> &EmbeddedConfig {
        &self.config
    }

    fn records(&self) -> Records<'_> {
        TableDefinition::new(&self.table)
    }

    /// Run `f` against the table inside a fresh read transaction.
    fn view<T>(
        &self,
        context: &str,
        f: impl FnOnce(&ReadOnlyTable<&'static str, &'static [u8]>) -> Result<T, redb::StorageError>,
    ) -> StoreResult<T> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::embedded(context, e))?;
        let table = txn
            .open_table(self.records())
            .map_err(|e| StoreError::embedded(context, e))?;
        f(&table).map_err(|e| StoreError::embedded(context, e))
    }

    /// Run `f` against the table inside one write transaction and commit.
    ///
    /// Returning `Err` from `f` drops the transaction uncommitted.
    fn update<T>(
        &self,
        context: &str,
        f: impl FnOnce(&mut Table<'_, &'static str, &'static [u8]>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::embedded(context, e))?;
        let out = {
            let mut table = txn
                .open_table(self.records())
                .map_err(|e| StoreError::embedded(context, e))?;
            f(&mut table)?
        };
        txn.commit().map_err(|e| StoreError::embedded(context, e))?;
        Ok(out)
    }
}

impl StorageDriver for EmbeddedDriver {
    fn setup(&self) -> StoreResult<()> {
        self.update("create table", |_| Ok(()))?;
        debug!(table = %self.table, "embedded table ready");
        Ok(())
    }

    fn teardown(&self) -> StoreResult<()> {
        debug!(table = %self.table, "embedded teardown");
        Ok(())
    }

    fn get_version(
        &self,
        entity: &mut dyn Storable,
        path: Option<&AddressPath>,
        tag: &str,
    ) -> StoreResult<()> {
        let key = keys::read_key(entity, path, tag);
        let stored = self.view(&format!("get {key}"), |table| {
            Ok(table.get(key.as_str())?.map(|v| v.value().to_vec()))
        })?;
        let Some(stored) = stored else {
            return Err(StoreError::NotFound { key });
        };
        debug!(key = %key, bytes = stored.len(), "embedded get");
        codec::unmarshal(entity, &key, stored)
    }

    fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let found = self.view(&format!("scan {prefix}"), |table| {
            let mut found = Vec::new();
            for entry in table.range(prefix..)? {
                let (k, _) = entry?;
                let k = k.value();
                if !k.starts_with(prefix) {
                    break;
                }
                found.push(k.to_string());
            }
            Ok(found)
        })?;
        debug!(prefix, count = found.len(), "embedded scan");
        Ok(found)
    }

    fn save_tag(
        &self,
        entity: &mut dyn Storable,
        path: Option<&AddressPath>,
        tag: &str,
    ) -> StoreResult<()> {
        if path.is_some() {
            keys::validate_tag(tag)?;
        }
        let value = codec::marshal(entity)?;
        let items = keys::write_keys(entity, path, tag);

        let written = self.update(&format!("save {}", entity.key()), |table| {
            for key in &items {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(|e| StoreError::TransactionAborted {
                        keys: items.clone(),
                        reason: e.to_string(),
                    })?;
            }
            Ok(())
        });
        if let Err(err) = written {
            warn!(keys = ?items, error = %err, "embedded save rolled back");
            return Err(match err {
                StoreError::Embedded { source, .. } => StoreError::TransactionAborted {
                    keys: items,
                    reason: source.to_string(),
                },
                other => other,
            });
        }

        debug!(keys = ?items, tag, bytes = value.len(), "embedded save");
        entity.save_id(tag);
        Ok(())
    }

    fn delete_keys(&self, prefix: &str) -> StoreResult<()> {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return Err(StoreError::InvalidArgument(
                "delete prefix must not be empty".into(),
            ));
        }
        let dir = format!("{prefix}/");
        let removed = self.update(&format!("delete {prefix}"), |table| {
            let mut doomed = Vec::new();
            for entry in table.range(prefix..).map_err(|e| StoreError::embedded("range", e))? {
                let (k, _) = entry.map_err(|e| StoreError::embedded("range", e))?;
                let k = k.value();
                if !k.starts_with(prefix) {
                    break;
                }
                if k == prefix || k.starts_with(dir.as_str()) {
                    doomed.push(k.to_string());
                }
            }
            for k in &doomed {
                table
                    .remove(k.as_str())
                    .map_err(|e| StoreError::embedded(format!("remove {k}"), e))?;
            }
            Ok(doomed.len())
        })?;
        debug!(prefix, removed, "embedded delete");
        Ok(())
    }

    fn lock(&self, key: &str, value: &str) -> StoreResult<()> {
        let lock = keys::lock_key(key);
        self.update(&format!("lock {lock}"), |table| {
            let held = table
                .get(lock.as_str())
                .map_err(|e| StoreError::embedded("read lock", e))?
                .is_some();
            if held {
                warn!(key = %lock, "lock already held");
                return Err(StoreError::LockHeld { key: lock.clone() });
            }
            table
                .insert(lock.as_str(), value.as_bytes())
                .map_err(|e| StoreError::embedded("write lock", e))?;
            Ok(())
        })?;
        debug!(key = %lock, "embedded lock acquired");
        Ok(())
    }

    fn unlock(&self, key: &str) -> StoreResult<()> {
        let lock = keys::lock_key(key);
        self.update(&format!("unlock {lock}"), |table| {
            table
                .remove(lock.as_str())
                .map_err(|e| StoreError::embedded("remove lock", e))?;
            Ok(())
        })?;
        debug!(key = %lock, "embedded lock released");
        Ok(())
    }
}

impl fmt::Debug for EmbeddedDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedDriver")
            .field("path", &self.config.path)
            .field("table", &self.table)
            .finish()
    }
}
