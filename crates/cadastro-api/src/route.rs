//! Path resolution: `/resource[/id][/subpath]` to a [`Route`] plus the
//! positional and query [`Filters`] for the handler.

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  Pessoas,
  Documentos,
  Enderecos,
  Telefones,
  Categorias,
  CategoriaPermissoes,
  Autenticacao,
  Permissoes,
  Modulos,
  Estados,
  Cidades,
}

const ROUTES: &[(&str, Route)] = &[
  ("pessoas", Route::Pessoas),
  ("pessoas/documentos", Route::Documentos),
  ("pessoas/enderecos", Route::Enderecos),
  ("pessoas/telefones", Route::Telefones),
  ("pessoas/categorias", Route::Categorias),
  ("pessoas/categorias/permissoes", Route::CategoriaPermissoes),
  ("controleacesso/autenticacao", Route::Autenticacao),
  ("controleacesso/permissoes", Route::Permissoes),
  ("controleacesso/modulos", Route::Modulos),
  ("locais/estados", Route::Estados),
  ("locais/cidades", Route::Cidades),
];

/// A resolved request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
  pub route:      Route,
  /// Numeric segments in the order they appeared.
  pub positional: Vec<i64>,
}

/// Resolve `path`. Numeric segments are lifted out as positional filters;
/// the rest name the resource, matched case-insensitively.
pub fn resolve(path: &str) -> Result<Resolved, ApiError> {
  let mut names = Vec::new();
  let mut positional = Vec::new();

  for segment in path.split('/').filter(|s| !s.is_empty()) {
    match segment.parse::<i64>() {
      Ok(n) => positional.push(n),
      Err(_) => names.push(segment.to_ascii_lowercase()),
    }
  }

  if names.is_empty() {
    return Err(ApiError::validation("Rota não informada"));
  }

  let name = names.join("/");
  ROUTES
    .iter()
    .find(|(n, _)| *n == name)
    .map(|(_, route)| Resolved { route: *route, positional })
    .ok_or(ApiError::RouteNotFound)
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Positional path values (keys `"0"`, `"1"`, …) followed by query pairs.
/// Lookups take the first match, so positional values win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(Vec<(String, String)>);

impl Filters {
  pub fn new(positional: &[i64], query: Vec<(String, String)>) -> Self {
    let mut pairs: Vec<_> = positional
      .iter()
      .enumerate()
      .map(|(i, v)| (i.to_string(), v.to_string()))
      .collect();
    pairs.extend(query);
    Self(pairs)
  }

  /// First non-empty value for `key`.
  pub fn value(&self, key: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|(k, v)| k == key && !v.is_empty())
      .map(|(_, v)| v.as_str())
  }

  pub fn int(&self, key: &str) -> Result<Option<i64>, ApiError> {
    self
      .value(key)
      .map(|v| {
        v.trim()
          .parse()
          .map_err(|_| ApiError::validation(format!("Filtro {key} inválido")))
      })
      .transpose()
  }

  /// Every id given as `key`, `key[]` or a comma separated list.
  pub fn ints(&self, key: &str) -> Result<Vec<i64>, ApiError> {
    let array_key = format!("{key}[]");
    let mut out = Vec::new();
    for (_, v) in self.0.iter().filter(|(k, _)| *k == key || *k == array_key) {
      for part in v.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part
          .parse()
          .map_err(|_| ApiError::validation(format!("Filtro {key} inválido")))?;
        out.push(id);
      }
    }
    Ok(out)
  }

  pub fn flag(&self, key: &str) -> bool {
    matches!(self.value(key), Some("true" | "1"))
  }
}
