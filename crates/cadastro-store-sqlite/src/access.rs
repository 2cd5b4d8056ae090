//! [`AccessStore`] and [`LocationStore`] for [`SqliteStore`].

use cadastro_core::{
  access::{Category, Module, Permission, PermissionQuery},
  location::{City, State},
  person::NamedRef,
  store::{AccessStore, LocationStore},
};
use rusqlite::OptionalExtension as _;

use crate::{Result, SqliteStore};

impl AccessStore for SqliteStore {
  async fn list_categories(&self, id: Option<i64>) -> Result<Vec<Category>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name FROM categories
           WHERE ?1 IS NULL OR id = ?1
           ORDER BY name",
        )?;
        let rows = stmt
          .query_map([id], |row| Ok(Category { id: row.get(0)?, name: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn insert_category(&self, name: String) -> Result<i64> {
    self
      .call(move |conn| {
        conn.execute("INSERT INTO categories (name) VALUES (?1)", [name])?;
        Ok(conn.last_insert_rowid())
      })
      .await
  }

  async fn update_category(&self, id: i64, name: String) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE categories SET name = ?2 WHERE id = ?1",
          rusqlite::params![id, name],
        )?;
        Ok(n > 0)
      })
      .await
  }

  async fn delete_category(&self, id: i64) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute("DELETE FROM categories WHERE id = ?1", [id])?;
        Ok(n > 0)
      })
      .await
  }

  async fn permission_keys(&self) -> Result<Vec<String>> {
    self
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT key FROM permissions ORDER BY key")?;
        let keys = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
      })
      .await
  }

  async fn category_keys(&self, category: i64) -> Result<Vec<String>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.key
           FROM category_permissions cp
           JOIN permissions p ON p.id = cp.permission
           WHERE cp.category = ?1
           ORDER BY p.key",
        )?;
        let keys = stmt
          .query_map([category], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
      })
      .await
  }

  async fn list_permissions<'a>(
    &'a self,
    query: &'a PermissionQuery,
  ) -> Result<Vec<Permission>> {
    let PermissionQuery { id, module, category } = query.clone();
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.id, p.module, m.name, p.name, p.key
           FROM permissions p
           JOIN permission_modules m ON m.id = p.module
           WHERE (?1 IS NULL OR p.id = ?1)
             AND (?2 IS NULL OR p.module = ?2)
             AND (?3 IS NULL OR EXISTS (
                   SELECT 1 FROM category_permissions cp
                   WHERE cp.permission = p.id AND cp.category = ?3))
           ORDER BY m.name, p.name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id, module, category], |row| {
            Ok(Permission {
              id:     row.get(0)?,
              module: NamedRef { id: row.get(1)?, name: row.get(2)? },
              name:   row.get(3)?,
              key:    row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_modules(&self, id: Option<i64>) -> Result<Vec<Module>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, icon FROM permission_modules
           WHERE ?1 IS NULL OR id = ?1
           ORDER BY name",
        )?;
        let rows = stmt
          .query_map([id], |row| {
            Ok(Module { id: row.get(0)?, name: row.get(1)?, icon: row.get(2)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }
}

// ─── Locations ───────────────────────────────────────────────────────────────

fn city_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<City> {
  Ok(City { id: row.get(0)?, state: row.get(1)?, name: row.get(2)? })
}

impl LocationStore for SqliteStore {
  async fn list_states(&self, id: Option<i64>) -> Result<Vec<State>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, abbreviation FROM states
           WHERE ?1 IS NULL OR id = ?1
           ORDER BY name",
        )?;
        let rows = stmt
          .query_map([id], |row| {
            Ok(State {
              id:           row.get(0)?,
              name:         row.get(1)?,
              abbreviation: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn list_cities(&self, state: i64) -> Result<Vec<City>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, state, name FROM cities WHERE state = ?1 ORDER BY name",
        )?;
        let rows = stmt
          .query_map([state], city_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn city_by_external_id(&self, external_id: i64) -> Result<Option<City>> {
    self
      .call(move |conn| {
        let city = conn
          .query_row(
            "SELECT id, state, name FROM cities WHERE external_id = ?1",
            [external_id],
            city_row,
          )
          .optional()?;
        Ok(city)
      })
      .await
  }

  async fn insert_state(&self, name: String, abbreviation: String) -> Result<i64> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO states (name, abbreviation) VALUES (?1, ?2)",
          [name, abbreviation],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
  }

  async fn insert_city(
    &self,
    state: i64,
    name: String,
    external_id: Option<i64>,
  ) -> Result<i64> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cities (state, name, external_id) VALUES (?1, ?2, ?3)",
          rusqlite::params![state, name, external_id],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
  }
}
