//! `controleAcesso/autenticacao`: login, logout and password change.

use cadastro_core::store::Store;
use serde::Serialize;

use super::{Ctx, Resource};
use crate::{
  auth::{authenticate, hash_password, verify_password},
  body::Body,
  error::{ApiError, Reply, storage},
  route::Filters,
  session::Session,
};

pub struct Autenticacao;

#[derive(Debug, Serialize)]
struct LoginView<'a> {
  nome:       &'a str,
  session:    &'a str,
  permissoes: Vec<&'a str>,
}

impl<S: Store> Resource<S> for Autenticacao {
  /// Log in with the request's Basic credentials. The session token is
  /// returned in the body as well as in the `Session` header.
  async fn get(ctx: &mut Ctx<S>, _filters: Filters) -> Result<Reply, ApiError> {
    let Some(creds) = ctx.basic.clone() else {
      return Err(ApiError::validation("Autenticação basic não informada"));
    };
    ctx.session = authenticate(&ctx.state, &creds).await?;

    let name = ctx.session.identity.as_ref().map(|i| i.name.as_str()).unwrap_or_default();
    Reply::data(LoginView {
      nome:       name,
      session:    &ctx.token,
      permissoes: ctx.session.permissions.iter().map(String::as_str).collect(),
    })
  }

  /// Change the caller's own password.
  async fn put(ctx: &mut Ctx<S>, _filters: Filters, body: Body) -> Result<Reply, ApiError> {
    let Some(id) = ctx.identity_id() else {
      return Err(ApiError::Unauthorized("Não autenticado".into()));
    };
    let current = body.required_str("senhaAtual", "Senha atual não informada")?;
    let new = body.required_str("novaSenha", "Nova senha não informada")?;

    let stored = ctx
      .store()
      .credentials_by_id(id)
      .await
      .map_err(storage)?
      .ok_or_else(|| ApiError::Unauthorized("Não autenticado".into()))?;
    if !verify_password(&current, &stored.password_hash) {
      return Err(ApiError::Unauthorized("Senha incorreta".into()));
    }

    let hash = hash_password(&new)?;
    ctx.store().set_password(id, hash.clone()).await.map_err(storage)?;
    if let Some(identity) = ctx.session.identity.as_mut() {
      identity.password_hash = hash;
    }
    tracing::info!(id, "password changed");
    Ok(Reply::Empty)
  }

  /// Log out. Succeeds whether or not a session exists.
  async fn delete(ctx: &mut Ctx<S>, _filters: Filters) -> Result<Reply, ApiError> {
    ctx.state.sessions.destroy(&ctx.token);
    if let Some(id) = ctx.identity_id() {
      tracing::info!(id, "logged out");
    }
    ctx.session = Session::default();
    Ok(Reply::Empty)
  }
}
