//! [`ChildStore`] for documents, addresses, phones and category grants.
//!
//! Every child table has an integer `id` and an owner column. Writes are
//! always scoped to the owner so a client cannot touch another parent's rows
//! by guessing ids.

use cadastro_core::{
  access::{Grant, GrantView},
  person::{Address, AddressView, Document, NamedRef, Phone, StateRef},
  reconcile::Stored,
  store::{ChildFilter, ChildStore},
};

use crate::{Result, SqliteStore};

/// Build a `WHERE` clause for `filter` over alias `t` and owner column
/// `owner`, with positional parameters.
fn filter_clause(owner: &str, filter: &ChildFilter) -> (String, Vec<i64>) {
  let mut clauses = Vec::new();
  let mut params = Vec::new();

  if let Some(id) = filter.id {
    clauses.push("t.id = ?".to_owned());
    params.push(id);
  }
  if !filter.owners.is_empty() {
    let marks = vec!["?"; filter.owners.len()].join(", ");
    clauses.push(format!("t.{owner} IN ({marks})"));
    params.extend(filter.owners.iter().copied());
  }

  let clause = if clauses.is_empty() {
    "1 = 1".to_owned()
  } else {
    clauses.join(" AND ")
  };
  (clause, params)
}

fn delete_owned(
  conn: &rusqlite::Connection,
  table: &str,
  owner_column: &str,
  owner: i64,
  id: i64,
) -> rusqlite::Result<bool> {
  let n = conn.execute(
    &format!("DELETE FROM {table} WHERE id = ?1 AND {owner_column} = ?2"),
    [id, owner],
  )?;
  Ok(n > 0)
}

// ─── Documents ───────────────────────────────────────────────────────────────

fn document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stored<Document>> {
  Ok(Stored {
    id:    row.get(0)?,
    owner: row.get(1)?,
    value: Document { kind: row.get(2)?, value: row.get(3)? },
  })
}

impl ChildStore<Document> for SqliteStore {
  async fn list_children(&self, owner: i64) -> Result<Vec<Stored<Document>>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, person, kind, value FROM person_documents
           WHERE person = ?1 ORDER BY id",
        )?;
        let rows = stmt
          .query_map([owner], document_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_views<'a>(
    &'a self,
    filter: &'a ChildFilter,
  ) -> Result<Vec<Stored<Document>>> {
    let (clause, params) = filter_clause("person", filter);
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT t.id, t.person, t.kind, t.value FROM person_documents t
           WHERE {clause} ORDER BY t.person, t.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), document_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn insert_child(&self, owner: i64, value: Document) -> Result<i64> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO person_documents (person, kind, value) VALUES (?1, ?2, ?3)",
          rusqlite::params![owner, value.kind, value.value],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
  }

  async fn update_child(&self, owner: i64, id: i64, value: Document) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE person_documents SET kind = ?3, value = ?4
           WHERE id = ?1 AND person = ?2",
          rusqlite::params![id, owner, value.kind, value.value],
        )?;
        Ok(n > 0)
      })
      .await
  }

  async fn delete_child(&self, owner: i64, id: i64) -> Result<bool> {
    self
      .call(move |conn| Ok(delete_owned(conn, "person_documents", "person", owner, id)?))
      .await
  }
}

// ─── Addresses ───────────────────────────────────────────────────────────────

const ADDRESS_COLUMNS: &str =
  "t.id, t.person, t.principal, t.postal_code, t.city, t.district, t.street, \
   t.number, t.complement";

fn address_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stored<Address>> {
  Ok(Stored {
    id:    row.get(0)?,
    owner: row.get(1)?,
    value: Address {
      principal:   row.get(2)?,
      postal_code: row.get(3)?,
      city:        row.get(4)?,
      district:    row.get(5)?,
      street:      row.get(6)?,
      number:      row.get(7)?,
      complement:  row.get(8)?,
    },
  })
}

fn address_view_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stored<AddressView>> {
  Ok(Stored {
    id:    row.get(0)?,
    owner: row.get(1)?,
    value: AddressView {
      principal:   row.get(2)?,
      postal_code: row.get(3)?,
      city:        NamedRef { id: row.get(4)?, name: row.get(9)? },
      state:       StateRef { id: row.get(10)?, abbreviation: row.get(11)? },
      district:    row.get(5)?,
      street:      row.get(6)?,
      number:      row.get(7)?,
      complement:  row.get(8)?,
    },
  })
}

impl ChildStore<Address> for SqliteStore {
  async fn list_children(&self, owner: i64) -> Result<Vec<Stored<Address>>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ADDRESS_COLUMNS} FROM person_addresses t
           WHERE t.person = ?1 ORDER BY t.id"
        ))?;
        let rows = stmt
          .query_map([owner], address_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_views<'a>(
    &'a self,
    filter: &'a ChildFilter,
  ) -> Result<Vec<Stored<AddressView>>> {
    let (clause, params) = filter_clause("person", filter);
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ADDRESS_COLUMNS}, c.name, s.id, s.abbreviation
           FROM person_addresses t
           JOIN cities c ON c.id = t.city
           JOIN states s ON s.id = c.state
           WHERE {clause} ORDER BY t.person, t.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), address_view_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn insert_child(&self, owner: i64, value: Address) -> Result<i64> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO person_addresses
             (person, principal, postal_code, city, district, street, number,
              complement)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            owner,
            value.principal,
            value.postal_code,
            value.city,
            value.district,
            value.street,
            value.number,
            value.complement,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
  }

  async fn update_child(&self, owner: i64, id: i64, value: Address) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE person_addresses
           SET principal = ?3, postal_code = ?4, city = ?5, district = ?6,
               street = ?7, number = ?8, complement = ?9
           WHERE id = ?1 AND person = ?2",
          rusqlite::params![
            id,
            owner,
            value.principal,
            value.postal_code,
            value.city,
            value.district,
            value.street,
            value.number,
            value.complement,
          ],
        )?;
        Ok(n > 0)
      })
      .await
  }

  async fn delete_child(&self, owner: i64, id: i64) -> Result<bool> {
    self
      .call(move |conn| Ok(delete_owned(conn, "person_addresses", "person", owner, id)?))
      .await
  }
}

// ─── Phones ──────────────────────────────────────────────────────────────────

fn phone_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stored<Phone>> {
  Ok(Stored {
    id:    row.get(0)?,
    owner: row.get(1)?,
    value: Phone { principal: row.get(2)?, number: row.get(3)? },
  })
}

impl ChildStore<Phone> for SqliteStore {
  async fn list_children(&self, owner: i64) -> Result<Vec<Stored<Phone>>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, person, principal, number FROM person_phones
           WHERE person = ?1 ORDER BY id",
        )?;
        let rows = stmt
          .query_map([owner], phone_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_views<'a>(
    &'a self,
    filter: &'a ChildFilter,
  ) -> Result<Vec<Stored<Phone>>> {
    let (clause, params) = filter_clause("person", filter);
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT t.id, t.person, t.principal, t.number FROM person_phones t
           WHERE {clause} ORDER BY t.person, t.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), phone_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn insert_child(&self, owner: i64, value: Phone) -> Result<i64> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO person_phones (person, principal, number) VALUES (?1, ?2, ?3)",
          rusqlite::params![owner, value.principal, value.number],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
  }

  async fn update_child(&self, owner: i64, id: i64, value: Phone) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE person_phones SET principal = ?3, number = ?4
           WHERE id = ?1 AND person = ?2",
          rusqlite::params![id, owner, value.principal, value.number],
        )?;
        Ok(n > 0)
      })
      .await
  }

  async fn delete_child(&self, owner: i64, id: i64) -> Result<bool> {
    self
      .call(move |conn| Ok(delete_owned(conn, "person_phones", "person", owner, id)?))
      .await
  }
}

// ─── Category grants ─────────────────────────────────────────────────────────

impl ChildStore<Grant> for SqliteStore {
  async fn list_children(&self, owner: i64) -> Result<Vec<Stored<Grant>>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, category, permission FROM category_permissions
           WHERE category = ?1 ORDER BY id",
        )?;
        let rows = stmt
          .query_map([owner], |row| {
            Ok(Stored {
              id:    row.get(0)?,
              owner: row.get(1)?,
              value: Grant { permission: row.get(2)? },
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_views<'a>(
    &'a self,
    filter: &'a ChildFilter,
  ) -> Result<Vec<Stored<GrantView>>> {
    let (clause, params) = filter_clause("category", filter);
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT t.id, t.category, t.permission, p.key
           FROM category_permissions t
           JOIN permissions p ON p.id = t.permission
           WHERE {clause} ORDER BY t.category, t.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(Stored {
              id:    row.get(0)?,
              owner: row.get(1)?,
              value: GrantView { permission: row.get(2)?, key: row.get(3)? },
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn insert_child(&self, owner: i64, value: Grant) -> Result<i64> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO category_permissions (category, permission) VALUES (?1, ?2)",
          [owner, value.permission],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
  }

  async fn update_child(&self, owner: i64, id: i64, value: Grant) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE category_permissions SET permission = ?3
           WHERE id = ?1 AND category = ?2",
          [id, owner, value.permission],
        )?;
        Ok(n > 0)
      })
      .await
  }

  async fn delete_child(&self, owner: i64, id: i64) -> Result<bool> {
    self
      .call(move |conn| {
        Ok(delete_owned(conn, "category_permissions", "category", owner, id)?)
      })
      .await
  }
}
