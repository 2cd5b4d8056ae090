//! Store traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `cadastro-store-sqlite`). The HTTP layer depends on the [`Store`]
//! supertrait, never on a concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use serde::Serialize;

use crate::{
  access::{Category, Credentials, Grant, Identity, Module, Permission, PermissionQuery},
  location::{City, State},
  person::{
    Address, Document, Employee, NamedRef, PersonQuery, PersonRecord, PersonRow,
    Phone,
  },
  reconcile::Stored,
};

// ─── Backend ─────────────────────────────────────────────────────────────────

/// Shared error type for every store trait of one backend.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Children ────────────────────────────────────────────────────────────────

/// A record owned by a parent row and synchronised as a collection.
///
/// `View` is what reads return; it may carry resolved references that the
/// written value only holds as ids.
pub trait Child: Clone + PartialEq + Send + Sync + 'static {
  type View: Serialize + Send + Sync + 'static;
}

/// Parameters for [`ChildStore::list_views`]. Empty `owners` means any owner.
#[derive(Debug, Clone, Default)]
pub struct ChildFilter {
  pub id:     Option<i64>,
  pub owners: Vec<i64>,
}

impl ChildFilter {
  pub fn by_id(id: i64) -> Self { Self { id: Some(id), owners: Vec::new() } }

  pub fn by_owners(owners: Vec<i64>) -> Self { Self { id: None, owners } }
}

/// Storage for one kind of child record.
pub trait ChildStore<C: Child>: Backend {
  /// Current children of `owner`, in id order.
  fn list_children(
    &self,
    owner: i64,
  ) -> impl Future<Output = Result<Vec<Stored<C>>, Self::Error>> + Send + '_;

  /// Read-side projection, batched over every owner in the filter.
  fn list_views<'a>(
    &'a self,
    filter: &'a ChildFilter,
  ) -> impl Future<Output = Result<Vec<Stored<C::View>>, Self::Error>> + Send + 'a;

  /// Insert `value` under `owner` and return the new id.
  fn insert_child(
    &self,
    owner: i64,
    value: C,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Overwrite child `id` of `owner`. Returns `false` if no such child.
  fn update_child(
    &self,
    owner: i64,
    id: i64,
    value: C,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete child `id` of `owner`. Returns `false` if no such child.
  fn delete_child(
    &self,
    owner: i64,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── People ──────────────────────────────────────────────────────────────────

pub trait PersonStore: Backend {
  fn insert_person(
    &self,
    record: PersonRecord,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Returns `false` if the person does not exist.
  fn update_person(
    &self,
    id: i64,
    record: PersonRecord,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Hard delete; children, employee and identity rows cascade.
  fn delete_person(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Flip the `active` flag. Returns `false` if the person does not exist.
  fn toggle_active(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Active people matching `query`, ordered by name.
  fn search_people<'a>(
    &'a self,
    query: &'a PersonQuery,
  ) -> impl Future<Output = Result<Vec<PersonRow>, Self::Error>> + Send + 'a;

  /// Same filters as [`search_people`](Self::search_people) but only id and
  /// name, without joins.
  fn search_people_minimal<'a>(
    &'a self,
    query: &'a PersonQuery,
  ) -> impl Future<Output = Result<Vec<NamedRef>, Self::Error>> + Send + 'a;

  // ── Employee ──────────────────────────────────────────────────────────

  fn get_employee(
    &self,
    person: i64,
  ) -> impl Future<Output = Result<Option<Employee>, Self::Error>> + Send + '_;

  fn insert_employee(
    &self,
    person: i64,
    employee: Employee,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn update_employee(
    &self,
    person: i64,
    employee: Employee,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_employee(
    &self,
    person: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Identity ──────────────────────────────────────────────────────────

  fn get_identity(
    &self,
    person: i64,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  fn insert_identity(
    &self,
    person: i64,
    login: String,
    password_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn update_login(
    &self,
    person: i64,
    login: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn set_password(
    &self,
    person: i64,
    password_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_identity(
    &self,
    person: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Look an identity up by login or by the owning person's email.
  fn find_credentials(
    &self,
    login_or_email: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  fn credentials_by_id(
    &self,
    person: i64,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  /// Whether an identity other than `except` belongs to a person with this
  /// email.
  fn email_in_use(
    &self,
    email: String,
    except: Option<i64>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Access control ──────────────────────────────────────────────────────────

pub trait AccessStore: Backend {
  fn list_categories(
    &self,
    id: Option<i64>,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  fn insert_category(
    &self,
    name: String,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  fn update_category(
    &self,
    id: i64,
    name: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_category(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Every permission key known to the system.
  fn permission_keys(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// The permission keys granted to `category`.
  fn category_keys(
    &self,
    category: i64,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  fn list_permissions<'a>(
    &'a self,
    query: &'a PermissionQuery,
  ) -> impl Future<Output = Result<Vec<Permission>, Self::Error>> + Send + 'a;

  fn list_modules(
    &self,
    id: Option<i64>,
  ) -> impl Future<Output = Result<Vec<Module>, Self::Error>> + Send + '_;
}

// ─── Locations ───────────────────────────────────────────────────────────────

pub trait LocationStore: Backend {
  fn list_states(
    &self,
    id: Option<i64>,
  ) -> impl Future<Output = Result<Vec<State>, Self::Error>> + Send + '_;

  fn list_cities(
    &self,
    state: i64,
  ) -> impl Future<Output = Result<Vec<City>, Self::Error>> + Send + '_;

  fn city_by_external_id(
    &self,
    external_id: i64,
  ) -> impl Future<Output = Result<Option<City>, Self::Error>> + Send + '_;

  fn insert_state(
    &self,
    name: String,
    abbreviation: String,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  fn insert_city(
    &self,
    state: i64,
    name: String,
    external_id: Option<i64>,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;
}

// ─── Transactions ────────────────────────────────────────────────────────────

/// A backend that can scope a sequence of writes to one transaction.
///
/// [`begin`](Self::begin) returns a handle of the same type whose operations
/// all run inside the transaction. Other handles wait until it is committed
/// or rolled back. A handle dropped without either is rolled back.
pub trait Transactional: Backend + Sized {
  fn begin(
    &self,
  ) -> impl Future<Output = Result<Self, Self::Error>> + Send + '_;

  fn commit(self) -> impl Future<Output = Result<(), Self::Error>> + Send;

  fn rollback(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

// ─── Supertrait ──────────────────────────────────────────────────────────────

/// Everything the HTTP layer needs from a backend.
pub trait Store:
  PersonStore
  + AccessStore
  + LocationStore
  + ChildStore<Document>
  + ChildStore<Address>
  + ChildStore<Phone>
  + ChildStore<Grant>
  + Transactional
  + Clone
  + 'static
{
}

impl<T> Store for T where
  T: PersonStore
    + AccessStore
    + LocationStore
    + ChildStore<Document>
    + ChildStore<Address>
    + ChildStore<Phone>
    + ChildStore<Grant>
    + Transactional
    + Clone
    + 'static
{
}
