//! `controleAcesso/permissoes`: permission points.

use cadastro_core::{
  access::{Permission, PermissionQuery},
  store::Store,
};

use super::{Ctx, Resource};
use crate::{
  error::{ApiError, Reply, storage},
  route::Filters,
};

pub struct Permissoes;

/// Permission points the session may see. Developers see all of them,
/// everyone else only what their category grants.
pub(crate) async fn visible<S: Store>(
  ctx: &Ctx<S>,
  id: Option<i64>,
  module: Option<i64>,
) -> Result<Vec<Permission>, ApiError> {
  let category = if ctx.is_developer() {
    None
  } else {
    match ctx.category() {
      Some(category) => Some(category),
      None => return Ok(Vec::new()),
    }
  };

  let query = PermissionQuery { id, module, category };
  ctx.store().list_permissions(&query).await.map_err(storage)
}

impl<S: Store> Resource<S> for Permissoes {
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require(
      "pessoas/categorias",
      "Sem permissão para pontos de controle de permissão",
    )?;
    let permissions = visible(ctx, filters.int("0")?, filters.int("modulo")?).await?;
    Reply::data(permissions)
  }
}
