//! People and their child records.
//!
//! A person is the party entity of the system: an individual or a company
//! that may be a customer, supplier, manufacturer, employee and/or user.
//! Documents, addresses and phones hang off a person and are kept in sync by
//! the [`reconcile`](crate::reconcile) routine.
//!
//! Field names on the wire are Portuguese; the serde attributes below are the
//! single source of truth for that mapping.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use crate::{Error, Result, store::Child};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Legal nature of a person.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  EnumString,
  IntoStaticStr,
)]
pub enum PersonKind {
  /// Pessoa física.
  #[default]
  #[serde(rename = "F")]
  #[strum(serialize = "F")]
  Individual,
  /// Pessoa jurídica.
  #[serde(rename = "J")]
  #[strum(serialize = "J")]
  Corporate,
}

impl PersonKind {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::InvalidPersonKind(s.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// The writable columns of a person row.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRecord {
  pub name:           String,
  pub category:       Option<i64>,
  pub email:          Option<String>,
  pub corporate_name: Option<String>,
  /// Parent company for a branch, or related company for an individual.
  pub related:        Option<i64>,
  pub kind:           PersonKind,
  pub supplier:       bool,
  pub customer:       bool,
  pub manufacturer:   bool,
  pub note:           Option<String>,
}

/// `{id, nome}` pair used wherever a row references another by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
  pub id:   i64,
  #[serde(rename = "nome")]
  pub name: String,
}

/// A person as listed by the full (non-minimal) projection.
#[derive(Debug, Clone, Serialize)]
pub struct PersonRow {
  pub id:             i64,
  #[serde(rename = "nome")]
  pub name:           String,
  pub email:          Option<String>,
  #[serde(rename = "razaoSocial")]
  pub corporate_name: Option<String>,
  #[serde(rename = "tipo")]
  pub kind:           PersonKind,
  #[serde(rename = "fornecedor")]
  pub supplier:       bool,
  #[serde(rename = "cliente")]
  pub customer:       bool,
  #[serde(rename = "fabricante")]
  pub manufacturer:   bool,
  #[serde(rename = "observacao")]
  pub note:           Option<String>,
  pub login:          Option<String>,
  #[serde(rename = "categoria", skip_serializing_if = "Option::is_none")]
  pub category:       Option<NamedRef>,
  #[serde(rename = "funcionario", skip_serializing_if = "Option::is_none")]
  pub employee:       Option<Employee>,
  #[serde(rename = "pessoa", skip_serializing_if = "Option::is_none")]
  pub related:        Option<NamedRef>,
}

/// Parameters for [`PersonStore::search_people`](crate::store::PersonStore::search_people).
#[derive(Debug, Clone)]
pub struct PersonQuery {
  pub id:                 Option<i64>,
  /// Free text matched against names, email, login, phones and documents.
  pub text:               Option<String>,
  pub customers_only:     bool,
  pub manufacturers_only: bool,
  pub limit:              i64,
  pub offset:             i64,
}

impl Default for PersonQuery {
  fn default() -> Self {
    Self {
      id:                 None,
      text:               None,
      customers_only:     false,
      manufacturers_only: false,
      limit:              25,
      offset:             0,
    }
  }
}

// ─── Employee ────────────────────────────────────────────────────────────────

/// Employment record attached 1:1 to a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
  #[serde(rename = "nomeMae")]
  pub mother_name:      Option<String>,
  #[serde(rename = "nomePai")]
  pub father_name:      Option<String>,
  #[serde(rename = "dataAdmissao")]
  pub admission_date:   NaiveDate,
  #[serde(rename = "dataDemissao")]
  pub termination_date: Option<NaiveDate>,
}

/// Parse a `YYYY-MM-DD` date as stored in the database.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|_| Error::InvalidDate(s.to_owned()))
}

// ─── Children ────────────────────────────────────────────────────────────────

/// An identity document. The reconciler keys documents by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  #[serde(rename = "documento")]
  pub kind:  String,
  #[serde(rename = "valor")]
  pub value: String,
}

impl Child for Document {
  type View = Document;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
  pub principal: bool,
  #[serde(rename = "telefone")]
  pub number:    String,
}

impl Child for Phone {
  type View = Phone;
}

/// An address as written; `city` is a city id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  pub principal:   bool,
  #[serde(rename = "codigoPostal")]
  pub postal_code: Option<String>,
  #[serde(rename = "cidade")]
  pub city:        i64,
  #[serde(rename = "bairro")]
  pub district:    String,
  #[serde(rename = "logradouro")]
  pub street:      String,
  #[serde(rename = "numero")]
  pub number:      String,
  #[serde(rename = "complemento")]
  pub complement:  Option<String>,
}

impl Child for Address {
  type View = AddressView;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRef {
  pub id:           i64,
  #[serde(rename = "sigla")]
  pub abbreviation: String,
}

/// An address as read back, with its city and state resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressView {
  pub principal:   bool,
  #[serde(rename = "codigoPostal")]
  pub postal_code: Option<String>,
  #[serde(rename = "cidade")]
  pub city:        NamedRef,
  #[serde(rename = "estado")]
  pub state:       StateRef,
  #[serde(rename = "bairro")]
  pub district:    String,
  #[serde(rename = "logradouro")]
  pub street:      String,
  #[serde(rename = "numero")]
  pub number:      String,
  #[serde(rename = "complemento")]
  pub complement:  Option<String>,
}
