//! States and cities referenced by addresses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
  pub id:           i64,
  #[serde(rename = "nome")]
  pub name:         String,
  #[serde(rename = "sigla")]
  pub abbreviation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
  pub id:    i64,
  #[serde(rename = "estado")]
  pub state: i64,
  #[serde(rename = "nome")]
  pub name:  String,
}
