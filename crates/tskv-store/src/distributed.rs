//! Distributed backend on an etcd cluster.
//!
//! The driver is synchronous: it owns a small tokio runtime and blocks on
//! the async etcd client for every call, so it must not be used from inside
//! another tokio runtime.
//!
//! A save runs as:
//!
//! 1. grant a lease (the session) with `session_ttl_secs`
//! 2. take the native lock `savelock/<entity key>` bound to that lease,
//!    waiting at most `lock_timeout_ms`
//! 3. put every target key in one etcd transaction
//! 4. release the lock and revoke the lease, whatever happened in step 3
//!
//! If the process dies mid-save the lease expires and etcd drops the lock.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use etcd_client::{
    Client, Compare, CompareOp, ConnectOptions, DeleteOptions, GetOptions, LockOptions, Txn,
    TxnOp,
};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use tskv_types::{AddressPath, Storable};

use crate::codec;
use crate::config::EtcdConfig;
use crate::error::{StoreError, StoreResult};
use crate::keys;
use crate::traits::StorageDriver;

/// Driver backed by an etcd v3 cluster.
pub struct EtcdDriver {
    client: Client,
    runtime: Runtime,
    config: EtcdConfig,
}

impl EtcdDriver {
    /// Build the runtime and connect to `config.endpoints`.
    pub fn connect(config: EtcdConfig) -> StoreResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("tskv-etcd")
            .enable_all()
            .build()?;

        let mut options = ConnectOptions::new().with_connect_timeout(config.connect_timeout());
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            options = options.with_user(user.clone(), password.clone());
        }

        let client = runtime
            .block_on(Client::connect(config.endpoints.clone(), Some(options)))
            .map_err(|e| StoreError::etcd(format!("connect {:?}", config.endpoints), e))?;

        info!(endpoints = ?config.endpoints, namespace = %config.namespace, "etcd driver connected");
        Ok(Self {
            client,
            runtime,
            config,
        })
    }

    pub fn config(&self) -> &EtcdConfig {
        &self.config
    }

    fn physical(&self, key: &str) -> String {
        physical_key(&self.config.namespace, key)
    }

    fn logical<'a>(&self, key: &'a str) -> Option<&'a str> {
        logical_key(&self.config.namespace, key)
    }

    /// Block on one client call, tagging failures with `context`.
    fn run<T, F, Fut>(&self, context: impl FnOnce() -> String, call: F) -> StoreResult<T>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T, etcd_client::Error>>,
    {
        self.runtime
            .block_on(call(self.client.clone()))
            .map_err(|e| StoreError::etcd(context(), e))
    }
}

/// Physical etcd key for a logical key. The logical key is kept verbatim.
fn physical_key(namespace: &str, key: &str) -> String {
    let ns = namespace.trim_end_matches('/');
    if ns.is_empty() {
        key.to_string()
    } else {
        format!("{ns}/{key}")
    }
}

/// Logical key for a physical etcd key, if it belongs to `namespace`.
/// Inverse of [`physical_key`].
fn logical_key<'a>(namespace: &str, key: &'a str) -> Option<&'a str> {
    let ns = namespace.trim_end_matches('/');
    if ns.is_empty() {
        Some(key)
    } else {
        key.strip_prefix(ns)?.strip_prefix('/')
    }
}

/// Hold `lock_name` under `lease` while committing `txn`.
async fn commit_locked(
    client: &mut Client,
    lease: i64,
    lock_name: &str,
    timeout: Duration,
    txn: Txn,
    items: &[String],
) -> StoreResult<()> {
    let options = LockOptions::new().with_lease(lease);
    let lock = match tokio::time::timeout(timeout, client.lock(lock_name, Some(options))).await {
        Ok(Ok(lock)) => lock,
        Ok(Err(e)) => return Err(StoreError::etcd(format!("lock {lock_name}"), e)),
        Err(_) => {
            warn!(key = lock_name, ?timeout, "save lock timed out");
            return Err(StoreError::LockTimeout {
                key: lock_name.to_string(),
            });
        }
    };

    let committed = client.txn(txn).await;

    if let Err(e) = client.unlock(lock.key()).await {
        warn!(key = lock_name, error = %e, "failed to release save lock; lease revoke will drop it");
    }

    match committed {
        Ok(resp) if resp.succeeded() => Ok(()),
        Ok(_) => Err(StoreError::TransactionAborted {
            keys: items.to_vec(),
            reason: "etcd reported the transaction as failed".into(),
        }),
        Err(e) => Err(StoreError::etcd(format!("commit {items:?}"), e)),
    }
}

impl StorageDriver for EtcdDriver {
    fn setup(&self) -> StoreResult<()> {
        let status = self.run(|| "status".to_string(), |mut c| async move { c.status().await })?;
        info!(version = status.version(), "etcd cluster reachable");
        Ok(())
    }

    fn teardown(&self) -> StoreResult<()> {
        debug!("etcd teardown");
        Ok(())
    }

    fn get_version(
        &self,
        entity: &mut dyn Storable,
        path: Option<&AddressPath>,
        tag: &str,
    ) -> StoreResult<()> {
        let key = keys::read_key(entity, path, tag);
        let physical = self.physical(&key);
        let resp = self.run(
            || format!("cannot fetch object for {key}"),
            |mut c| async move { c.get(physical, None).await },
        )?;
        let Some(kv) = resp.kvs().first() else {
            return Err(StoreError::NotFound { key });
        };
        let stored = kv.value().to_vec();
        debug!(key = %key, bytes = stored.len(), "etcd get");
        codec::unmarshal(entity, &key, stored)
    }

    fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let physical = self.physical(prefix);
        let resp = self.run(
            || format!("cannot list {prefix}"),
            |mut c| async move {
                c.get(physical, Some(GetOptions::new().with_prefix().with_keys_only()))
                    .await
            },
        )?;

        let mut found = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            let raw = kv
                .key_str()
                .map_err(|e| StoreError::etcd(format!("decode key under {prefix}"), e))?;
            if let Some(logical) = self.logical(raw) {
                if logical.starts_with(prefix) {
                    found.push(logical.to_string());
                }
            }
        }
        debug!(prefix, count = found.len(), "etcd scan");
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

        let ops: Vec<TxnOp> = items
            .iter()
            .map(|key| TxnOp::put(self.physical(key), value.clone(), None))
            .collect();
        let txn = Txn::new().and_then(ops);

        let lock_name = self.physical(&keys::save_lock_key(entity.key()));
        let ttl = self.config.session_ttl_secs;
        let timeout = self.config.lock_timeout();
        let mut client = self.client.clone();

        self.runtime.block_on(async {
            let lease = client
                .lease_grant(ttl, None)
                .await
                .map_err(|e| StoreError::etcd(format!("grant session for {lock_name}"), e))?;

            let outcome =
                commit_locked(&mut client, lease.id(), &lock_name, timeout, txn, &items).await;

            if let Err(e) = client.lease_revoke(lease.id()).await {
                warn!(lease = lease.id(), error = %e, "failed to revoke session lease; it will expire");
            }
            outcome
        })?;

        debug!(keys = ?items, tag, bytes = value.len(), "etcd save");
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
        let exact = self.physical(prefix);
        let dir = format!("{exact}/");
        let txn = Txn::new().and_then(vec![
            TxnOp::delete(exact, None),
            TxnOp::delete(dir, Some(DeleteOptions::new().with_prefix())),
        ]);
        self.run(
            || format!("delete tree {prefix}"),
            |mut c| async move { c.txn(txn).await },
        )?;
        debug!(prefix, "etcd delete");
        Ok(())
    }

    fn lock(&self, key: &str, value: &str) -> StoreResult<()> {
        let lock = keys::lock_key(key);
        let physical = self.physical(&lock);
        let txn = Txn::new()
            .when(vec![Compare::create_revision(
                physical.clone(),
                CompareOp::Equal,
                0,
            )])
            .and_then(vec![TxnOp::put(physical, value, None)]);

        let resp = self.run(
            || format!("cannot write lock {lock}"),
            |mut c| async move { c.txn(txn).await },
        )?;
        if !resp.succeeded() {
            warn!(key = %lock, "lock already held");
            return Err(StoreError::LockHeld { key: lock });
        }
        debug!(key = %lock, "etcd lock acquired");
        Ok(())
    }

    fn unlock(&self, key: &str) -> StoreResult<()> {
        let lock = keys::lock_key(key);
        let physical = self.physical(&lock);
        self.run(
            || format!("cannot release lock {lock}"),
            |mut c| async move { c.delete(physical, None).await },
        )?;
        debug!(key = %lock, "etcd lock released");
        Ok(())
    }
}

impl fmt::Debug for EtcdDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtcdDriver")
            .field("endpoints", &self.config.endpoints)
            .field("namespace", &self.config.namespace)
            .finish()
    }
}
