//! Resource handlers, one type per route.
//!
//! | Route | Methods |
//! |-------|---------|
//! | `pessoas` | GET, POST, PUT, DELETE (toggle active) |
//! | `pessoas/documentos`, `pessoas/enderecos`, `pessoas/telefones` | GET, POST, PUT, DELETE |
//! | `pessoas/categorias` | GET, POST, PUT, DELETE |
//! | `pessoas/categorias/permissoes` | GET, POST, DELETE |
//! | `controleAcesso/autenticacao` | GET (login), PUT (password), DELETE (logout) |
//! | `controleAcesso/permissoes`, `controleAcesso/modulos` | GET |
//! | `locais/estados`, `locais/cidades` | GET |

pub mod autenticacao;
pub mod categoria_permissoes;
pub mod categorias;
mod children;
pub mod cidades;
pub mod documentos;
pub mod enderecos;
pub mod estados;
pub mod modulos;
pub mod permissoes;
pub mod pessoas;
pub mod telefones;

use std::future::Future;

use axum::http::Method;
use cadastro_core::{permission, store::Store};

use crate::{
  AppState,
  auth::BasicCredentials,
  body::Body,
  error::{ApiError, Reply},
  route::{Filters, Route},
  session::Session,
};

// ─── Context ─────────────────────────────────────────────────────────────────

/// Per-request state handed to every handler.
pub struct Ctx<S: Store> {
  pub state:   AppState<S>,
  pub token:   String,
  pub session: Session,
  /// Basic credentials sent with the request, if any.
  pub basic:   Option<BasicCredentials>,
}

impl<S: Store> Ctx<S> {
  pub fn store(&self) -> &S { self.state.store.as_ref() }

  pub fn granted(&self, expr: &str) -> bool {
    permission::check(expr, &self.session.permissions)
  }

  /// Fail with a permission error carrying `msg` unless `expr` holds.
  pub fn require(&self, expr: &str, msg: &str) -> Result<(), ApiError> {
    if self.granted(expr) {
      Ok(())
    } else {
      Err(ApiError::Permission(msg.to_owned()))
    }
  }

  pub fn identity_id(&self) -> Option<i64> {
    self.session.identity.as_ref().map(|i| i.id)
  }

  pub fn category(&self) -> Option<i64> {
    self.session.identity.as_ref().and_then(|i| i.category)
  }

  pub fn is_developer(&self) -> bool {
    self
      .identity_id()
      .is_some_and(|id| self.state.config.developers.contains(id))
  }
}

// ─── Resource ────────────────────────────────────────────────────────────────

/// A routed resource. Methods a resource does not override answer 405.
pub trait Resource<S: Store> {
  fn get(
    ctx: &mut Ctx<S>,
    filters: Filters,
  ) -> impl Future<Output = Result<Reply, ApiError>> + Send {
    let _ = (ctx, filters);
    async { Err(ApiError::MethodNotAllowed) }
  }

  fn post(
    ctx: &mut Ctx<S>,
    filters: Filters,
    body: Body,
  ) -> impl Future<Output = Result<Reply, ApiError>> + Send {
    let _ = (ctx, filters, body);
    async { Err(ApiError::MethodNotAllowed) }
  }

  fn put(
    ctx: &mut Ctx<S>,
    filters: Filters,
    body: Body,
  ) -> impl Future<Output = Result<Reply, ApiError>> + Send {
    let _ = (ctx, filters, body);
    async { Err(ApiError::MethodNotAllowed) }
  }

  fn delete(
    ctx: &mut Ctx<S>,
    filters: Filters,
  ) -> impl Future<Output = Result<Reply, ApiError>> + Send {
    let _ = (ctx, filters);
    async { Err(ApiError::MethodNotAllowed) }
  }
}

async fn run<S, R>(
  ctx: &mut Ctx<S>,
  method: &Method,
  filters: Filters,
  body: Body,
) -> Result<Reply, ApiError>
where
  S: Store,
  R: Resource<S>,
{
  match method.as_str() {
    "GET" => R::get(ctx, filters).await,
    "POST" => R::post(ctx, filters, body).await,
    "PUT" => R::put(ctx, filters, body).await,
    "DELETE" => R::delete(ctx, filters).await,
    _ => Err(ApiError::MethodNotAllowed),
  }
}

/// Invoke the handler for `route`.
pub async fn handle<S: Store>(
  route: Route,
  ctx: &mut Ctx<S>,
  method: &Method,
  filters: Filters,
  body: Body,
) -> Result<Reply, ApiError> {
  match route {
    Route::Pessoas => run::<S, pessoas::Pessoas>(ctx, method, filters, body).await,
    Route::Documentos => {
      run::<S, documentos::Documentos>(ctx, method, filters, body).await
    }
    Route::Enderecos => {
      run::<S, enderecos::Enderecos>(ctx, method, filters, body).await
    }
    Route::Telefones => {
      run::<S, telefones::Telefones>(ctx, method, filters, body).await
    }
    Route::Categorias => {
      run::<S, categorias::Categorias>(ctx, method, filters, body).await
    }
    Route::CategoriaPermissoes => {
      run::<S, categoria_permissoes::CategoriaPermissoes>(ctx, method, filters, body)
        .await
    }
    Route::Autenticacao => {
      run::<S, autenticacao::Autenticacao>(ctx, method, filters, body).await
    }
    Route::Permissoes => {
      run::<S, permissoes::Permissoes>(ctx, method, filters, body).await
    }
    Route::Modulos => run::<S, modulos::Modulos>(ctx, method, filters, body).await,
    Route::Estados => run::<S, estados::Estados>(ctx, method, filters, body).await,
    Route::Cidades => run::<S, cidades::Cidades>(ctx, method, filters, body).await,
  }
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// The person a child record belongs to: positional `0` or `pessoa`.
pub(crate) fn owner_from(filters: &Filters, body: &Body) -> Result<i64, ApiError> {
  match filters.int("0")? {
    Some(id) => Ok(id),
    None => body
      .int("pessoa")?
      .ok_or_else(|| ApiError::validation("Pessoa não informada")),
  }
}

pub(crate) fn id_from(filters: &Filters) -> Result<i64, ApiError> {
  filters.int("0")?.ok_or_else(|| ApiError::validation("Id não informado"))
}
