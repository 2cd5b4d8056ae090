//! `pessoas/categorias/permissoes`: single grants of a category.

use cadastro_core::{
  access::Grant,
  store::{ChildFilter, ChildStore, Store},
};

use super::{Ctx, Resource, categorias::NO_PERMISSION, children::group_by_owner};
use crate::{
  body::Body,
  error::{ApiError, Reply, storage},
  route::Filters,
};

pub struct CategoriaPermissoes;

impl<S: Store> Resource<S> for CategoriaPermissoes {
  /// Without a category, every grant grouped by category. A session may
  /// always read the grants of its own category.
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    let category = match filters.int("0")? {
      Some(id) => Some(id),
      None => filters.int("categoria")?,
    };

    match category {
      None => {
        ctx.require("pessoas/categorias", NO_PERMISSION)?;
        let rows = ChildStore::<Grant>::list_views(ctx.store(), &ChildFilter::default())
          .await
          .map_err(storage)?;
        Reply::data(group_by_owner(rows))
      }
      Some(category) => {
        if ctx.category() != Some(category) {
          ctx.require("pessoas/categorias", NO_PERMISSION)?;
        }
        let filter = ChildFilter::by_owners(vec![category]);
        let rows = ChildStore::<Grant>::list_views(ctx.store(), &filter)
          .await
          .map_err(storage)?;
        Reply::data(rows)
      }
    }
  }

  async fn post(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas/categorias", NO_PERMISSION)?;
    let category = match filters.int("0")? {
      Some(id) => id,
      None => body
        .int("categoria")?
        .ok_or_else(|| ApiError::validation("Categoria não informada"))?,
    };
    let permission = body
      .int("permissao")?
      .ok_or_else(|| ApiError::validation("Permissão não informada"))?;

    ChildStore::<Grant>::insert_child(ctx.store(), category, Grant { permission })
      .await
      .map_err(storage)?;
    Ok(Reply::Created(None))
  }

  /// Removing a grant the category does not hold succeeds.
  async fn delete(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas/categorias", NO_PERMISSION)?;
    let category = filters
      .int("categoria")?
      .ok_or_else(|| ApiError::validation("Categoria não informada"))?;
    let permission = filters
      .int("permissao")?
      .ok_or_else(|| ApiError::validation("Permissão não informada"))?;

    let store = ctx.store();
    let grants = ChildStore::<Grant>::list_children(store, category)
      .await
      .map_err(storage)?;
    for grant in grants.iter().filter(|g| g.value.permission == permission) {
      ChildStore::<Grant>::delete_child(store, category, grant.id)
        .await
        .map_err(storage)?;
    }
    Ok(Reply::Empty)
  }
}
