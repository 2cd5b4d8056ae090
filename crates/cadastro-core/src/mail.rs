//! Outbound mail, kept behind a trait so the transport can be swapped or
//! faked in tests.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
  pub email: String,
  pub name:  String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
  pub subject: String,
  pub html:    String,
  pub to:      Vec<Recipient>,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct MailError(pub String);

/// A synchronous mail transport. Callers on the async runtime should run it
/// through `spawn_blocking`.
pub trait Mailer: Send + Sync {
  fn send(&self, mail: &Mail) -> Result<(), MailError>;
}
