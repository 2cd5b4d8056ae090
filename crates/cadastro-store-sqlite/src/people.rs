//! [`PersonStore`] for [`SqliteStore`].

use cadastro_core::{
  access::{Credentials, Identity},
  person::{Employee, NamedRef, PersonQuery, PersonRecord, PersonRow},
  store::PersonStore,
};
use rusqlite::OptionalExtension as _;

use crate::{
  Result, SqliteStore,
  encode::{
    PERSON_COLUMNS, PERSON_JOINS, RawEmployee, RawPerson, encode_date,
    like_pattern,
  },
};

/// Filters shared by the full and minimal person searches.
/// Parameters: ?1 id, ?2 customers only, ?3 manufacturers only, ?4 pattern,
/// ?5 limit, ?6 offset, ?7 raw text (matched against the id).
const PERSON_FILTER: &str = "
    WHERE p.active = 1
      AND (?1 IS NULL OR p.id = ?1)
      AND (?2 = 0 OR p.customer = 1)
      AND (?3 = 0 OR p.manufacturer = 1)";

const TEXT_FILTER: &str = "
      AND (?4 IS NULL
        OR CAST(p.id AS TEXT) = ?7
        OR str_normalize(p.name) LIKE ?4
        OR str_normalize(p.email) LIKE ?4
        OR str_normalize(p.corporate_name) LIKE ?4
        OR str_normalize(c.name) LIKE ?4
        OR str_normalize(u.login) LIKE ?4
        OR str_normalize(r.name) LIKE ?4
        OR EXISTS (SELECT 1 FROM person_phones ph
                   WHERE ph.person = p.id AND ph.number LIKE ?4)
        OR EXISTS (SELECT 1 FROM person_documents d
                   WHERE d.person = p.id AND str_normalize(d.value) LIKE ?4))";

const MINIMAL_TEXT_FILTER: &str = "
      AND (?4 IS NULL
        OR CAST(p.id AS TEXT) = ?7
        OR str_normalize(p.name) LIKE ?4)";

const CREDENTIAL_COLUMNS: &str = "
    SELECT p.id, p.name, u.password_hash, p.active, p.category
    FROM users u
    JOIN people p ON p.id = u.id";

type QueryParams =
  (Option<i64>, bool, bool, Option<String>, i64, i64, Option<String>);

fn query_params(query: &PersonQuery) -> QueryParams {
  let text = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
  (
    query.id,
    query.customers_only,
    query.manufacturers_only,
    text.map(like_pattern),
    query.limit,
    query.offset,
    text.map(str::to_owned),
  )
}

fn credentials_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Credentials> {
  Ok(Credentials {
    id:            row.get(0)?,
    name:          row.get(1)?,
    password_hash: row.get(2)?,
    active:        row.get(3)?,
    category:      row.get(4)?,
  })
}

impl PersonStore for SqliteStore {
  async fn insert_person(&self, record: PersonRecord) -> Result<i64> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO people
             (name, category, email, corporate_name, related, kind,
              supplier, customer, manufacturer, note)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            record.name,
            record.category,
            record.email,
            record.corporate_name,
            record.related,
            record.kind.as_str(),
            record.supplier,
            record.customer,
            record.manufacturer,
            record.note,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
  }

  async fn update_person(&self, id: i64, record: PersonRecord) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE people
           SET name = ?2, category = ?3, email = ?4, corporate_name = ?5,
               related = ?6, kind = ?7, supplier = ?8, customer = ?9,
               manufacturer = ?10, note = ?11
           WHERE id = ?1",
          rusqlite::params![
            id,
            record.name,
            record.category,
            record.email,
            record.corporate_name,
            record.related,
            record.kind.as_str(),
            record.supplier,
            record.customer,
            record.manufacturer,
            record.note,
          ],
        )?;
        Ok(n > 0)
      })
      .await
  }

  async fn delete_person(&self, id: i64) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute("DELETE FROM people WHERE id = ?1", [id])?;
        Ok(n > 0)
      })
      .await
  }

  async fn toggle_active(&self, id: i64) -> Result<bool> {
    self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE people SET active = NOT active WHERE id = ?1",
          [id],
        )?;
        Ok(n > 0)
      })
      .await
  }

  async fn search_people<'a>(
    &'a self,
    query: &'a PersonQuery,
  ) -> Result<Vec<PersonRow>> {
    let params = query_params(query);
    let raws: Vec<RawPerson> = self
      .call(move |conn| {
        let sql = format!(
          "SELECT {PERSON_COLUMNS} {PERSON_JOINS} {PERSON_FILTER} {TEXT_FILTER}
           ORDER BY p.name, p.id
           LIMIT ?5 OFFSET ?6"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![
            params.0, params.1, params.2, params.3, params.4, params.5, params.6
          ], RawPerson::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::decode).collect()
  }

  async fn search_people_minimal<'a>(
    &'a self,
    query: &'a PersonQuery,
  ) -> Result<Vec<NamedRef>> {
    let params = query_params(query);
    self
      .call(move |conn| {
        let sql = format!(
          "SELECT p.id, p.name FROM people p {PERSON_FILTER} {MINIMAL_TEXT_FILTER}
           ORDER BY p.name, p.id
           LIMIT ?5 OFFSET ?6"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              params.0, params.1, params.2, params.3, params.4, params.5,
              params.6
            ],
            |row| Ok(NamedRef { id: row.get(0)?, name: row.get(1)? }),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  // ── Employee ──────────────────────────────────────────────────────────

  async fn get_employee(&self, person: i64) -> Result<Option<Employee>> {
    let raw = self
      .call(move |conn| {
        let raw = conn
          .query_row(
            "SELECT mother_name, father_name, admission_date, termination_date
             FROM employees WHERE person = ?1",
            [person],
            |row| {
              Ok(RawEmployee {
                mother_name:      row.get(0)?,
                father_name:      row.get(1)?,
                admission_date:   row.get(2)?,
                termination_date: row.get(3)?,
              })
            },
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawEmployee::decode).transpose()
  }

  async fn insert_employee(&self, person: i64, employee: Employee) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO employees
             (person, mother_name, father_name, admission_date, termination_date)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            person,
            employee.mother_name,
            employee.father_name,
            encode_date(employee.admission_date),
            employee.termination_date.map(encode_date),
          ],
        )?;
        Ok(())
      })
      .await
  }

  async fn update_employee(&self, person: i64, employee: Employee) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute(
          "UPDATE employees
           SET mother_name = ?2, father_name = ?3,
               admission_date = ?4, termination_date = ?5
           WHERE person = ?1",
          rusqlite::params![
            person,
            employee.mother_name,
            employee.father_name,
            encode_date(employee.admission_date),
            employee.termination_date.map(encode_date),
          ],
        )?;
        Ok(())
      })
      .await
  }

  async fn delete_employee(&self, person: i64) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute("DELETE FROM employees WHERE person = ?1", [person])?;
        Ok(())
      })
      .await
  }

  // ── Identity ──────────────────────────────────────────────────────────

  async fn get_identity(&self, person: i64) -> Result<Option<Identity>> {
    self
      .call(move |conn| {
        let identity = conn
          .query_row(
            "SELECT id, login FROM users WHERE id = ?1",
            [person],
            |row| Ok(Identity { id: row.get(0)?, login: row.get(1)? }),
          )
          .optional()?;
        Ok(identity)
      })
      .await
  }

  async fn insert_identity(
    &self,
    person: i64,
    login: String,
    password_hash: String,
  ) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (id, login, password_hash) VALUES (?1, ?2, ?3)",
          rusqlite::params![person, login, password_hash],
        )?;
        Ok(())
      })
      .await
  }

  async fn update_login(&self, person: i64, login: String) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute(
          "UPDATE users SET login = ?2 WHERE id = ?1",
          rusqlite::params![person, login],
        )?;
        Ok(())
      })
      .await
  }

  async fn set_password(&self, person: i64, password_hash: String) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute(
          "UPDATE users SET password_hash = ?2 WHERE id = ?1",
          rusqlite::params![person, password_hash],
        )?;
        Ok(())
      })
      .await
  }

  async fn delete_identity(&self, person: i64) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute("DELETE FROM users WHERE id = ?1", [person])?;
        Ok(())
      })
      .await
  }

  async fn find_credentials(
    &self,
    login_or_email: String,
  ) -> Result<Option<Credentials>> {
    self
      .call(move |conn| {
        let sql = format!(
          "{CREDENTIAL_COLUMNS}
           WHERE u.login = ?1 OR p.email = ?1
           ORDER BY u.login = ?1 DESC
           LIMIT 1"
        );
        let found = conn
          .query_row(&sql, [login_or_email], credentials_from_row)
          .optional()?;
        Ok(found)
      })
      .await
  }

  async fn credentials_by_id(&self, person: i64) -> Result<Option<Credentials>> {
    self
      .call(move |conn| {
        let sql = format!("{CREDENTIAL_COLUMNS} WHERE u.id = ?1");
        let found = conn
          .query_row(&sql, [person], credentials_from_row)
          .optional()?;
        Ok(found)
      })
      .await
  }

  async fn email_in_use(&self, email: String, except: Option<i64>) -> Result<bool> {
    self
      .call(move |conn| {
        let in_use = conn
          .query_row(
            "SELECT 1
             FROM users u
             JOIN people p ON p.id = u.id
             WHERE p.email = ?1 AND (?2 IS NULL OR u.id <> ?2)
             LIMIT 1",
            rusqlite::params![email, except],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        Ok(in_use)
      })
      .await
  }
}
