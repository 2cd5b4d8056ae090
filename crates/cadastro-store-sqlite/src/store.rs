//! [`SqliteStore`]: connection handling, schema initialisation and
//! transactions. The store trait implementations live in sibling modules.

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use cadastro_core::store::{Backend, Transactional};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
  Error, Result,
  schema::{SCHEMA, SEED, register_functions},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The Cadastro stores backed by a single SQLite file.
///
/// Cloning is cheap; clones share the connection. A handle returned by
/// [`Transactional::begin`] holds the connection exclusively until it is
/// committed, rolled back or dropped.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  gate: Gate,
}

/// Who may run statements on the connection right now.
#[derive(Clone)]
enum Gate {
  /// Ordinary handle: shares the connection unless a transaction is open.
  Shared(Arc<RwLock<()>>),
  /// Transaction handle: already holds the connection exclusively.
  Held(Arc<OpenTransaction>),
}

struct OpenTransaction {
  conn:     tokio_rusqlite::Connection,
  guard:    Option<OwnedRwLockWriteGuard<()>>,
  finished: AtomicBool,
}

impl Drop for OpenTransaction {
  fn drop(&mut self) {
    if self.finished.load(Ordering::Acquire) {
      return;
    }
    // Keep the write guard until the rollback has run so no other handle
    // sees the abandoned transaction.
    let guard = self.guard.take();
    let conn = self.conn.clone();
    match tokio::runtime::Handle::try_current() {
      Ok(runtime) => {
        runtime.spawn(async move {
          if let Err(e) = conn
            .call(|conn| {
              conn.execute_batch("ROLLBACK")?;
              Ok(())
            })
            .await
          {
            tracing::error!(error = %e, "rollback of abandoned transaction failed");
          }
          drop(guard);
        });
      }
      Err(_) => tracing::error!("transaction dropped outside a runtime"),
    }
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open a private in-memory store, as used by the tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(SEED)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, gate: Gate::Shared(Arc::new(RwLock::new(()))) })
  }

  /// Run `f` on the connection thread, waiting for any open transaction on
  /// another handle to finish first.
  pub(crate) async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R>
      + Send
      + 'static,
    R: Send + 'static,
  {
    match &self.gate {
      Gate::Shared(lock) => {
        let _shared = lock.read().await;
        Ok(self.conn.call(f).await?)
      }
      Gate::Held(_) => Ok(self.conn.call(f).await?),
    }
  }

  async fn finish(self, statement: &'static str) -> Result<()> {
    let Gate::Held(txn) = &self.gate else {
      return Err(Error::NoTransaction);
    };
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(statement)?;
        Ok(())
      })
      .await?;
    txn.finished.store(true, Ordering::Release);
    Ok(())
  }
}

// ─── Trait impls ─────────────────────────────────────────────────────────────

impl Backend for SqliteStore {
  type Error = Error;
}

impl Transactional for SqliteStore {
  async fn begin(&self) -> Result<Self> {
    let Gate::Shared(lock) = &self.gate else {
      return Err(Error::NestedTransaction);
    };
    let guard = lock.clone().write_owned().await;
    self
      .conn
      .call(|conn| {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
      })
      .await?;

    Ok(Self {
      conn: self.conn.clone(),
      gate: Gate::Held(Arc::new(OpenTransaction {
        conn:     self.conn.clone(),
        guard:    Some(guard),
        finished: AtomicBool::new(false),
      })),
    })
  }

  async fn commit(self) -> Result<()> { self.finish("COMMIT").await }

  async fn rollback(self) -> Result<()> { self.finish("ROLLBACK").await }
}
