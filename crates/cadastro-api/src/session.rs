//! Token-keyed session state.
//!
//! A session is created for every request that does not present a known
//! token. Only sessions carrying an identity are kept between requests.

use std::{
  collections::HashMap,
  sync::{PoisonError, RwLock},
};

use cadastro_core::permission::PermissionSet;
use rand_core::{OsRng, RngCore as _};

pub const TOKEN_LEN: usize = 26;

const TOKEN_ALPHABET: &[u8] =
  b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Snapshot of the authenticated identity taken at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
  pub id:            i64,
  pub name:          String,
  /// Compared against the stored hash on every request; a mismatch means
  /// the password changed since login.
  pub password_hash: String,
  pub category:      Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
  pub identity:    Option<SessionIdentity>,
  pub permissions: PermissionSet,
}

impl Session {
  pub fn is_authenticated(&self) -> bool { self.identity.is_some() }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Where sessions live between requests.
pub trait SessionStore: Send + Sync {
  fn load(&self, token: &str) -> Option<Session>;
  fn save(&self, token: &str, session: Session);
  /// Removing an unknown token is not an error.
  fn destroy(&self, token: &str);
}

/// Process-local sessions; lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessions {
  inner: RwLock<HashMap<String, Session>>,
}

impl SessionStore for MemorySessions {
  fn load(&self, token: &str) -> Option<Session> {
    let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    map.get(token).cloned()
  }

  fn save(&self, token: &str, session: Session) {
    let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    map.insert(token.to_owned(), session);
  }

  fn destroy(&self, token: &str) {
    let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    map.remove(token);
  }
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

pub fn generate_token() -> String { random_string(TOKEN_ALPHABET, TOKEN_LEN) }

pub fn is_valid_token(token: &str) -> bool {
  token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// `len` characters drawn uniformly from `alphabet` using the OS RNG.
pub fn random_string(alphabet: &[u8], len: usize) -> String {
  let n = alphabet.len() as u32;
  // Largest multiple of n that fits in u32; values above it are redrawn.
  let zone = u32::MAX - (u32::MAX % n);
  let mut out = String::with_capacity(len);
  while out.len() < len {
    let v = OsRng.next_u32();
    if v < zone {
      out.push(alphabet[(v % n) as usize] as char);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generated_tokens_are_valid_and_distinct() {
    let a = generate_token();
    let b = generate_token();
    assert!(is_valid_token(&a));
    assert!(is_valid_token(&b));
    assert_ne!(a, b);
  }

  #[test]
  fn malformed_tokens_are_rejected() {
    assert!(!is_valid_token(""));
    assert!(!is_valid_token("short"));
    assert!(!is_valid_token("abcdefghijklmnopqrstuvwxy!"));
    assert!(!is_valid_token(&"a".repeat(27)));
  }

  #[test]
  fn memory_sessions_round_trip() {
    let store = MemorySessions::default();
    let session = Session {
      identity:    Some(SessionIdentity {
        id:            1,
        name:          "Ana".into(),
        password_hash: "h".into(),
        category:      None,
      }),
      permissions: ["pessoas".to_string()].into(),
    };

    store.save("t", session.clone());
    assert_eq!(store.load("t"), Some(session));

    store.destroy("t");
    store.destroy("t");
    assert_eq!(store.load("t"), None);
  }
}
