//! `locais/cidades`

use cadastro_core::store::Store;

use super::{Ctx, Resource};
use crate::{
  error::{ApiError, Reply, storage},
  route::Filters,
};

pub struct Cidades;

impl<S: Store> Resource<S> for Cidades {
  /// Cities of `estado`, or the single city imported with `idTerceiro`.
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    let store = ctx.store();
    if let Some(state) = filters.int("estado")? {
      let cities = store.list_cities(state).await.map_err(storage)?;
      return Reply::data(cities);
    }
    if let Some(external) = filters.int("idTerceiro")? {
      let city = store.city_by_external_id(external).await.map_err(storage)?;
      return Reply::data(city.into_iter().collect::<Vec<_>>());
    }
    Err(ApiError::validation("Estado nem idTerceiro foram informados"))
  }
}
