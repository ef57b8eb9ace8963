//! # Storage Backends
//!
//! Transactions over the store [`Tables`].
//!
//! A write transaction holds the exclusive lock for its whole lifetime and
//! works on a copy of the tables. Commit swaps the copy in; rollback, or
//! dropping the transaction, discards it. Read transactions share the lock
//! and see the last committed state.
//!
//! Once started, a commit runs to completion on its own task, so dropping
//! the future that awaits it cannot leave the file and the memory state
//! apart.
//!
//! Lock acquisition is bounded by the configured timeout and fails with
//! `StoreUnavailable`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::tables::Tables;

/// A read-only view of the committed tables.
pub trait ReadTransaction: Send + Sync {
    /// Get the tables.
    fn tables(&self) -> &Tables;
}

/// An all-or-nothing change to the tables.
#[async_trait]
pub trait WriteTransaction: Send {
    /// Get the working tables.
    fn tables(&self) -> &Tables;

    /// Get the working tables for mutation.
    fn tables_mut(&mut self) -> &mut Tables;

    /// Make the working tables the committed state.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard the working tables.
    fn rollback(self: Box<Self>);
}

/// Source of transactions.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Open a write transaction.
    async fn begin_write(&self) -> StoreResult<Box<dyn WriteTransaction>>;

    /// Open a read transaction.
    async fn begin_read(&self) -> StoreResult<Box<dyn ReadTransaction>>;
}

/// In-memory backend, optionally writing a JSON snapshot on every commit.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    tables: Arc<RwLock<Tables>>,
    timeout: Duration,
    snapshot: Option<PathBuf>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new(timeout: Duration) -> Self {
        Self::with_tables(Tables::new(), timeout)
    }

    /// Create a backend holding `tables`.
    pub fn with_tables(tables: Tables, timeout: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(tables)),
            timeout,
            snapshot: None,
        }
    }

    /// Copy of the committed tables.
    pub async fn snapshot(&self) -> Tables {
        self.tables.read().await.clone()
    }

    async fn write_guard(&self) -> StoreResult<OwnedRwLockWriteGuard<Tables>> {
        tokio::time::timeout(self.timeout, self.tables.clone().write_owned())
            .await
            .map_err(|_| {
                StoreError::StoreUnavailable(format!(
                    "write transaction not available after {}ms",
                    self.timeout.as_millis()
                ))
            })
    }

    async fn read_guard(&self) -> StoreResult<OwnedRwLockReadGuard<Tables>> {
        tokio::time::timeout(self.timeout, self.tables.clone().read_owned())
            .await
            .map_err(|_| {
                StoreError::StoreUnavailable(format!(
                    "read transaction not available after {}ms",
                    self.timeout.as_millis()
                ))
            })
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn begin_write(&self) -> StoreResult<Box<dyn WriteTransaction>> {
        let guard = self.write_guard().await?;
        let working = (*guard).clone();
        Ok(Box::new(MemoryWrite {
            guard,
            working,
            snapshot: self.snapshot.clone(),
        }))
    }

    async fn begin_read(&self) -> StoreResult<Box<dyn ReadTransaction>> {
        Ok(Box::new(MemoryRead {
            guard: self.read_guard().await?,
        }))
    }
}

struct MemoryRead {
    guard: OwnedRwLockReadGuard<Tables>,
}

impl ReadTransaction for MemoryRead {
    fn tables(&self) -> &Tables {
        &self.guard
    }
}

struct MemoryWrite {
    guard: OwnedRwLockWriteGuard<Tables>,
    working: Tables,
    snapshot: Option<PathBuf>,
}

#[async_trait]
impl WriteTransaction for MemoryWrite {
    fn tables(&self) -> &Tables {
        &self.working
    }

    fn tables_mut(&mut self) -> &mut Tables {
        &mut self.working
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryWrite {
            mut guard,
            working,
            snapshot,
        } = *self;

        // The file write and the swap complete together even if the caller
        // stops polling.
        let swap = tokio::spawn(async move {
            if let Some(path) = snapshot {
                write_snapshot(&path, &working).await?;
            }
            *guard = working;
            Ok::<(), StoreError>(())
        });
        swap.await
            .map_err(|e| StoreError::StoreUnavailable(format!("commit task failed: {}", e)))?
    }

    fn rollback(self: Box<Self>) {
        debug!("Discarding write transaction");
    }
}

/// Backend persisting the tables to a JSON file.
///
/// The file is rewritten on every commit through a temporary file and a
/// rename. A failed write fails the commit and leaves the committed state
/// unchanged.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    inner: MemoryBackend,
    path: PathBuf,
}

impl JsonFileBackend {
    /// Open the store at `path`, loading it if the file exists.
    pub async fn open(path: impl Into<PathBuf>, timeout: Duration) -> StoreResult<Self> {
        let path = path.into();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::StoreUnavailable(format!("corrupt store file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::new(),
            Err(e) => {
                return Err(StoreError::StoreUnavailable(format!(
                    "cannot read store file {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        info!(
            path = %path.display(),
            roles = tables.role_count(),
            privileges = tables.privilege_count(),
            "Opened JSON store"
        );

        let mut inner = MemoryBackend::with_tables(tables, timeout);
        inner.snapshot = Some(path.clone());
        Ok(Self { inner, path })
    }

    /// Get the store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the committed tables.
    pub async fn snapshot(&self) -> Tables {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl StoreBackend for JsonFileBackend {
    async fn begin_write(&self) -> StoreResult<Box<dyn WriteTransaction>> {
        self.inner.begin_write().await
    }

    async fn begin_read(&self) -> StoreResult<Box<dyn ReadTransaction>> {
        self.inner.begin_read().await
    }
}

async fn write_snapshot(path: &Path, tables: &Tables) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(tables)
        .map_err(|e| StoreError::StoreUnavailable(format!("cannot serialize store: {}", e)))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
        StoreError::StoreUnavailable(format!("cannot write {}: {}", tmp.display(), e))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        StoreError::StoreUnavailable(format!("cannot replace {}: {}", path.display(), e))
    })?;
    Ok(())
}
