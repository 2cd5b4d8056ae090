//! `pessoas/categorias`

use cadastro_core::{
  access::{Grant, GrantView},
  reconcile::{Desired, Stored, reconcile},
  store::{ChildFilter, ChildStore, Store},
};
use serde::Serialize;

use super::{Ctx, Resource, children::group_by_owner, id_from};
use crate::{
  body::Body,
  error::{ApiError, Reply, storage},
  route::Filters,
};

pub struct Categorias;

pub(crate) const NO_PERMISSION: &str = "Sem permissão para categorias de pessoas";

#[derive(Debug, Serialize)]
struct CategoryView {
  id:         i64,
  nome:       String,
  permissoes: Vec<Stored<GrantView>>,
}

fn grants_from(body: &Body) -> Result<Vec<Desired<Grant>>, ApiError> {
  Ok(
    body
      .ints("permissoes")?
      .into_iter()
      .map(|permission| Desired::new(Grant { permission }))
      .collect(),
  )
}

async fn write_grants<S: Store>(
  store: &S,
  category: i64,
  grants: Vec<Desired<Grant>>,
) -> Result<(), ApiError> {
  reconcile(store, category, grants, |g: &Grant| Some(g.permission))
    .await
    .map_err(storage)?;
  Ok(())
}

impl<S: Store> Resource<S> for Categorias {
  /// Anyone who can register people may list categories; grants are only
  /// shown to those who manage them.
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas || pessoas/categorias", NO_PERMISSION)?;
    let store = ctx.store();
    let categories = store.list_categories(filters.int("0")?).await.map_err(storage)?;

    let mut grants = if ctx.granted("pessoas/categorias") && !categories.is_empty() {
      let filter = ChildFilter::by_owners(categories.iter().map(|c| c.id).collect());
      group_by_owner(
        ChildStore::<Grant>::list_views(store, &filter).await.map_err(storage)?,
      )
    } else {
      Default::default()
    };

    let views: Vec<CategoryView> = categories
      .into_iter()
      .map(|c| CategoryView {
        permissoes: grants.remove(&c.id).unwrap_or_default(),
        id:         c.id,
        nome:       c.name,
      })
      .collect();
    Reply::data(views)
  }

  async fn post(ctx: &mut Ctx<S>, _filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas/categorias", NO_PERMISSION)?;
    let name = body.required_str("nome", "Nome não informado")?;
    let grants = grants_from(&body)?;

    let id = ctx.store().insert_category(name).await.map_err(storage)?;
    write_grants(ctx.store(), id, grants).await?;
    Ok(Reply::Created(Some(id)))
  }

  async fn put(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas/categorias", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    let name = body.required_str("nome", "Nome não informado")?;
    let grants = grants_from(&body)?;

    if !ctx.store().update_category(id, name).await.map_err(storage)? {
      return Err(ApiError::not_found("Categoria não encontrada"));
    }
    write_grants(ctx.store(), id, grants).await?;
    Ok(Reply::Empty)
  }

  async fn delete(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas/categorias", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    ctx.store().delete_category(id).await.map_err(storage)?;
    Ok(Reply::Empty)
  }
}
