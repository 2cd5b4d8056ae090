//! Error type for `cadastro-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] cadastro_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("a transaction is already open on this handle")]
  NestedTransaction,

  #[error("this handle is not inside a transaction")]
  NoTransaction,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
