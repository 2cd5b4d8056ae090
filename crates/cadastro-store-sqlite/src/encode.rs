//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Dates are stored as `YYYY-MM-DD` text and person kinds as their one-letter
//! code. Rows are first read into `Raw*` structs inside the connection
//! closure and decoded afterwards, so decoding errors surface as
//! [`Error::Core`](crate::Error::Core) instead of a database error.

use cadastro_core::person::{
  Employee, NamedRef, PersonKind, PersonRow, parse_date,
};
use chrono::NaiveDate;

use crate::Result;

// ─── Text ────────────────────────────────────────────────────────────────────

/// Lower-case `s` and strip the diacritics used in Portuguese.
pub fn normalize(s: &str) -> String {
  s.chars()
    .flat_map(char::to_lowercase)
    .map(|c| match c {
      'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
      'é' | 'è' | 'ê' | 'ë' => 'e',
      'í' | 'ì' | 'î' | 'ï' => 'i',
      'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
      'ú' | 'ù' | 'û' | 'ü' => 'u',
      'ç' => 'c',
      'ñ' => 'n',
      other => other,
    })
    .collect()
}

/// `LIKE` pattern for a free-text filter, already normalised.
pub fn like_pattern(text: &str) -> String { format!("%{}%", normalize(text.trim())) }

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> { Ok(parse_date(s)?) }

// ─── Raw row types ───────────────────────────────────────────────────────────

/// An employee row exactly as read from the `employees` table.
pub struct RawEmployee {
  pub mother_name:      Option<String>,
  pub father_name:      Option<String>,
  pub admission_date:   String,
  pub termination_date: Option<String>,
}

impl RawEmployee {
  pub fn decode(self) -> Result<Employee> {
    Ok(Employee {
      mother_name:      self.mother_name,
      father_name:      self.father_name,
      admission_date:   decode_date(&self.admission_date)?,
      termination_date: self
        .termination_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
    })
  }
}

/// Column list matching [`RawPerson::from_row`].
pub const PERSON_COLUMNS: &str = "
    p.id, p.name, p.email, p.corporate_name, p.kind,
    p.supplier, p.customer, p.manufacturer, p.note,
    u.login, c.id, c.name,
    e.mother_name, e.father_name, e.admission_date, e.termination_date,
    r.id, r.name";

/// Joins matching [`PERSON_COLUMNS`].
pub const PERSON_JOINS: &str = "
    FROM people p
    LEFT JOIN users u      ON u.id = p.id
    LEFT JOIN categories c ON c.id = p.category
    LEFT JOIN employees e  ON e.person = p.id
    LEFT JOIN people r     ON r.id = p.related";

/// A joined person row exactly as read from SQLite.
pub struct RawPerson {
  pub id:             i64,
  pub name:           String,
  pub email:          Option<String>,
  pub corporate_name: Option<String>,
  pub kind:           String,
  pub supplier:       bool,
  pub customer:       bool,
  pub manufacturer:   bool,
  pub note:           Option<String>,
  pub login:          Option<String>,
  pub category_id:    Option<i64>,
  pub category_name:  Option<String>,
  pub employee:       Option<RawEmployee>,
  pub related_id:     Option<i64>,
  pub related_name:   Option<String>,
}

impl RawPerson {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let admission: Option<String> = row.get(14)?;
    let employee = match admission {
      Some(admission_date) => Some(RawEmployee {
        mother_name: row.get(12)?,
        father_name: row.get(13)?,
        admission_date,
        termination_date: row.get(15)?,
      }),
      None => None,
    };

    Ok(Self {
      id: row.get(0)?,
      name: row.get(1)?,
      email: row.get(2)?,
      corporate_name: row.get(3)?,
      kind: row.get(4)?,
      supplier: row.get(5)?,
      customer: row.get(6)?,
      manufacturer: row.get(7)?,
      note: row.get(8)?,
      login: row.get(9)?,
      category_id: row.get(10)?,
      category_name: row.get(11)?,
      employee,
      related_id: row.get(16)?,
      related_name: row.get(17)?,
    })
  }

  pub fn decode(self) -> Result<PersonRow> {
    let named = |id: Option<i64>, name: Option<String>| match (id, name) {
      (Some(id), Some(name)) => Some(NamedRef { id, name }),
      _ => None,
    };

    Ok(PersonRow {
      id:             self.id,
      name:           self.name,
      email:          self.email,
      corporate_name: self.corporate_name,
      kind:           PersonKind::parse(&self.kind)?,
      supplier:       self.supplier,
      customer:       self.customer,
      manufacturer:   self.manufacturer,
      note:           self.note,
      login:          self.login,
      category:       named(self.category_id, self.category_name),
      employee:       self.employee.map(RawEmployee::decode).transpose()?,
      related:        named(self.related_id, self.related_name),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_folds_case_and_accents() {
    assert_eq!(normalize("João Conceição"), "joao conceicao");
    assert_eq!(normalize("ÁGUA"), "agua");
  }

  #[test]
  fn like_pattern_wraps_normalised_text() {
    assert_eq!(like_pattern("  Pão "), "%pao%");
  }

  #[test]
  fn dates_round_trip() {
    let d = NaiveDate::from_ymd_opt(2021, 12, 31).unwrap();
    assert_eq!(decode_date(&encode_date(d)).unwrap(), d);
    assert!(decode_date("31/12/2021").is_err());
  }
}
