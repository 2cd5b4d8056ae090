//! Access-control records: categories, their permission grants, permission
//! points, modules and the login identity attached to a person.

use serde::{Deserialize, Serialize};

use crate::{person::NamedRef, store::Child};

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id:   i64,
  #[serde(rename = "nome")]
  pub name: String,
}

/// A category's grant of one permission point. Grants are children of a
/// category and are reconciled keyed by `permission`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
  #[serde(rename = "permissao")]
  pub permission: i64,
}

impl Child for Grant {
  type View = GrantView;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantView {
  #[serde(rename = "permissao")]
  pub permission: i64,
  #[serde(rename = "chave")]
  pub key:        String,
}

// ─── Permission points ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
  pub id:     i64,
  #[serde(rename = "modulo")]
  pub module: NamedRef,
  #[serde(rename = "nome")]
  pub name:   String,
  #[serde(rename = "chave")]
  pub key:    String,
}

/// Parameters for [`AccessStore::list_permissions`](crate::store::AccessStore::list_permissions).
#[derive(Debug, Clone, Default)]
pub struct PermissionQuery {
  pub id:       Option<i64>,
  pub module:   Option<i64>,
  /// Restrict to the points granted to this category.
  pub category: Option<i64>,
}

/// A grouping of permission points shown together in the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
  pub id:   i64,
  #[serde(rename = "nome")]
  pub name: String,
  #[serde(rename = "icone")]
  pub icon: Option<String>,
}

// ─── Identities ──────────────────────────────────────────────────────────────

/// The login attached to a person. Its id is the person id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub id:    i64,
  pub login: String,
}

/// Everything needed to authenticate an identity and build its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub id:            i64,
  pub name:          String,
  pub password_hash: String,
  pub active:        bool,
  pub category:      Option<i64>,
}
