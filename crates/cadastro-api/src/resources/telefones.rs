//! `pessoas/telefones`

use cadastro_core::{person::Phone, store::Store};

use super::{Ctx, Resource, children, id_from, owner_from};
use crate::{
  body::Body,
  error::{ApiError, Reply},
  route::Filters,
};

pub struct Telefones;

const NO_PERMISSION: &str = "Sem permissão para pessoas";
const MISSING: &str = "Telefone não encontrado";

pub(crate) fn phone_from(body: &Body) -> Result<Phone, ApiError> {
  Ok(Phone {
    principal: body.bool("principal"),
    number:    body.required_str("telefone", "Telefone não informado")?,
  })
}

impl<S: Store> Resource<S> for Telefones {
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    children::list::<S, Phone>(ctx, &filters).await
  }

  async fn post(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let owner = owner_from(&filters, &body)?;
    let phone = phone_from(&body)?;
    children::insert(ctx, owner, phone).await
  }

  async fn put(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    let phone = phone_from(&body)?;
    children::update(ctx, id, phone, MISSING).await
  }

  async fn delete(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    children::delete::<S, Phone>(ctx, id, MISSING).await
  }
}
