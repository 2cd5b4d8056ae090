//! Loosely-typed access to a JSON request body.
//!
//! Clients send numbers as strings and empty strings for "not set", so
//! fields are read leniently: `""`, `null` and `0` ids all count as absent.

use serde_json::{Map, Value};

use crate::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body(Map<String, Value>);

impl Body {
  /// An empty payload is an empty object; anything but an object is invalid.
  pub fn parse(bytes: &[u8]) -> Result<Self, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
      return Ok(Self::default());
    }
    match serde_json::from_slice(bytes) {
      Ok(Value::Object(map)) => Ok(Self(map)),
      _ => Err(ApiError::validation("JSON inválido")),
    }
  }

  pub fn get(&self, key: &str) -> Option<&Value> { self.0.get(key) }

  pub fn str(&self, key: &str) -> Option<String> { self.get(key).and_then(text) }

  pub fn required_str(&self, key: &str, msg: &str) -> Result<String, ApiError> {
    self.str(key).ok_or_else(|| ApiError::validation(msg))
  }

  /// An id or count. `0` is treated as absent.
  pub fn int(&self, key: &str) -> Result<Option<i64>, ApiError> {
    match self.get(key) {
      None => Ok(None),
      Some(v) => int(v)
        .map(|n| n.filter(|n| *n != 0))
        .ok_or_else(|| ApiError::validation(format!("Campo {key} inválido"))),
    }
  }

  /// A reference to another row, sent either as an id or as the `{id, nome}`
  /// object a GET returned.
  pub fn ref_id(&self, key: &str) -> Result<Option<i64>, ApiError> {
    match self.object(key) {
      Some(obj) => obj.int("id"),
      None => self.int(key),
    }
  }

  pub fn bool(&self, key: &str) -> bool {
    match self.get(key) {
      Some(Value::Bool(b)) => *b,
      Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
      Some(Value::String(s)) => matches!(s.trim(), "1" | "true"),
      _ => false,
    }
  }

  pub fn object(&self, key: &str) -> Option<Body> {
    match self.get(key) {
      Some(Value::Object(map)) => Some(Body(map.clone())),
      _ => None,
    }
  }

  /// Object items of the array at `key`. A missing or null key is an empty
  /// list; any other shape is rejected so it cannot read as "no children".
  pub fn list(&self, key: &str) -> Result<Vec<Body>, ApiError> {
    let items = match self.get(key) {
      None | Some(Value::Null) => return Ok(Vec::new()),
      Some(Value::Array(items)) => items,
      Some(_) => return Err(invalid(key)),
    };
    items
      .iter()
      .map(|v| match v {
        Value::Object(map) => Ok(Body(map.clone())),
        _ => Err(invalid(key)),
      })
      .collect()
  }

  /// The array at `key` as ids, skipping blanks.
  pub fn ints(&self, key: &str) -> Result<Vec<i64>, ApiError> {
    let items = match self.get(key) {
      None | Some(Value::Null) => return Ok(Vec::new()),
      Some(Value::Array(items)) => items,
      Some(_) => return Err(invalid(key)),
    };
    items
      .iter()
      .filter(|v| text(v).is_some())
      .map(|v| int(v).ok_or_else(|| invalid(key)))
      .collect::<Result<Vec<_>, _>>()
      .map(|ids| ids.into_iter().flatten().collect())
  }

  /// Entries of the map at `key` with their values read as text. A missing
  /// or null key has no entries; anything but an object is rejected.
  pub fn entries(&self, key: &str) -> Result<Vec<(String, Option<String>)>, ApiError> {
    match self.get(key) {
      None | Some(Value::Null) => Ok(Vec::new()),
      Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), text(v))).collect()),
      Some(_) => Err(invalid(key)),
    }
  }
}

fn invalid(key: &str) -> ApiError { ApiError::validation(format!("Campo {key} inválido")) }

fn text(v: &Value) -> Option<String> {
  match v {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// `Some(None)` for blank values, `None` when the value is not a number.
fn int(v: &Value) -> Option<Option<i64>> {
  match v {
    Value::Null => Some(None),
    Value::Number(n) => n.as_i64().map(Some),
    Value::String(s) if s.trim().is_empty() => Some(None),
    Value::String(s) => s.trim().parse().ok().map(Some),
    _ => None,
  }
}
