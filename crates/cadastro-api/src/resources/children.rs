//! Operations shared by the per-person child resources.

use std::collections::BTreeMap;

use cadastro_core::{
  reconcile::Stored,
  store::{Child, ChildFilter, ChildStore, Store},
};

use super::Ctx;
use crate::{
  error::{ApiError, Reply, storage},
  route::Filters,
};

/// GET by positional id, `pessoa`, or a `pessoas` list. With `pessoas` the
/// rows are grouped by person id.
pub(crate) async fn list<S, C>(ctx: &Ctx<S>, filters: &Filters) -> Result<Reply, ApiError>
where
  S: Store + ChildStore<C>,
  C: Child,
{
  let id = filters.int("0")?;
  let owner = filters.int("pessoa")?;
  let owners = filters.ints("pessoas")?;
  if id.is_none() && owner.is_none() && owners.is_empty() {
    return Err(ApiError::validation("Nenhum filtro informado"));
  }

  let grouped = !owners.is_empty();
  let filter = ChildFilter { id, owners: owner.into_iter().chain(owners).collect() };
  let rows = ChildStore::<C>::list_views(ctx.store(), &filter)
    .await
    .map_err(storage)?;

  if grouped {
    Reply::data(group_by_owner(rows))
  } else {
    Reply::data(rows)
  }
}

pub(crate) fn group_by_owner<V>(rows: Vec<Stored<V>>) -> BTreeMap<i64, Vec<Stored<V>>> {
  let mut grouped: BTreeMap<i64, Vec<Stored<V>>> = BTreeMap::new();
  for row in rows {
    grouped.entry(row.owner).or_default().push(row);
  }
  grouped
}

pub(crate) async fn insert<S, C>(ctx: &Ctx<S>, owner: i64, value: C) -> Result<Reply, ApiError>
where
  S: Store + ChildStore<C>,
  C: Child,
{
  let id = ChildStore::<C>::insert_child(ctx.store(), owner, value)
    .await
    .map_err(storage)?;
  Ok(Reply::Created(Some(id)))
}

pub(crate) async fn update<S, C>(
  ctx: &Ctx<S>,
  id: i64,
  value: C,
  missing: &str,
) -> Result<Reply, ApiError>
where
  S: Store + ChildStore<C>,
  C: Child,
{
  let owner = owner_of::<S, C>(ctx.store(), id, missing).await?;
  let found = ChildStore::<C>::update_child(ctx.store(), owner, id, value)
    .await
    .map_err(storage)?;
  if !found {
    return Err(ApiError::not_found(missing));
  }
  Ok(Reply::Empty)
}

pub(crate) async fn delete<S, C>(ctx: &Ctx<S>, id: i64, missing: &str) -> Result<Reply, ApiError>
where
  S: Store + ChildStore<C>,
  C: Child,
{
  let owner = owner_of::<S, C>(ctx.store(), id, missing).await?;
  let found = ChildStore::<C>::delete_child(ctx.store(), owner, id)
    .await
    .map_err(storage)?;
  if !found {
    return Err(ApiError::not_found(missing));
  }
  Ok(Reply::Empty)
}

async fn owner_of<S, C>(store: &S, id: i64, missing: &str) -> Result<i64, ApiError>
where
  S: ChildStore<C>,
  C: Child,
{
  let filter = ChildFilter::by_id(id);
  let rows = ChildStore::<C>::list_views(store, &filter).await.map_err(storage)?;
  rows
    .first()
    .map(|row| row.owner)
    .ok_or_else(|| ApiError::not_found(missing))
}
