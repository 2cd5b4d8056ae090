//! Permission expressions and their evaluation against a granted key set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::store::AccessStore;

/// The permission keys held by a session.
pub type PermissionSet = BTreeSet<String>;

// ─── Expressions ─────────────────────────────────────────────────────────────

/// A parsed permission requirement.
///
/// Mixed operators are not supported: an expression containing `||` is split
/// on `||` only, otherwise on `&&`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  Key(String),
  Any(Vec<String>),
  All(Vec<String>),
}

impl Expr {
  pub fn parse(expr: &str) -> Self {
    let split = |sep: &str| expr.split(sep).map(|k| k.trim().to_owned()).collect();
    if expr.contains("||") {
      Expr::Any(split("||"))
    } else if expr.contains("&&") {
      Expr::All(split("&&"))
    } else {
      Expr::Key(expr.trim().to_owned())
    }
  }

  pub fn eval(&self, granted: &PermissionSet) -> bool {
    if granted.is_empty() {
      return false;
    }
    match self {
      Expr::Key(k) => granted.contains(k),
      Expr::Any(keys) => keys.iter().any(|k| granted.contains(k)),
      Expr::All(keys) => keys.iter().all(|k| granted.contains(k)),
    }
  }
}

/// Parse and evaluate `expr` in one go.
pub fn check(expr: &str, granted: &PermissionSet) -> bool {
  Expr::parse(expr).eval(granted)
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Identity ids that hold every permission regardless of category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Developers(pub Vec<i64>);

impl Default for Developers {
  fn default() -> Self { Self(vec![1]) }
}

impl Developers {
  pub fn contains(&self, id: i64) -> bool { self.0.contains(&id) }
}

/// The permission set of identity `id` belonging to `category`.
pub async fn resolve<S: AccessStore>(
  store: &S,
  developers: &Developers,
  id: i64,
  category: Option<i64>,
) -> Result<PermissionSet, S::Error> {
  let keys = if developers.contains(id) {
    store.permission_keys().await?
  } else if let Some(category) = category {
    store.category_keys(category).await?
  } else {
    Vec::new()
  };
  Ok(keys.into_iter().collect())
}
