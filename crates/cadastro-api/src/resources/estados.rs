//! `locais/estados`

use cadastro_core::store::Store;

use super::{Ctx, Resource};
use crate::{
  error::{ApiError, Reply, storage},
  route::Filters,
};

pub struct Estados;

impl<S: Store> Resource<S> for Estados {
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    let states = ctx.store().list_states(filters.int("0")?).await.map_err(storage)?;
    Reply::data(states)
  }
}
