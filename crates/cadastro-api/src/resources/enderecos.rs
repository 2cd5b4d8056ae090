//! `pessoas/enderecos`

use cadastro_core::{person::Address, store::Store};

use super::{Ctx, Resource, children, id_from, owner_from};
use crate::{
  body::Body,
  error::{ApiError, Reply},
  route::Filters,
};

pub struct Enderecos;

const NO_PERMISSION: &str = "Sem permissão para pessoas";
const MISSING: &str = "Endereço não encontrado";

/// Validate one address. `cidade` may be an id or a `{id, nome}` object.
pub(crate) fn address_from(body: &Body) -> Result<Address, ApiError> {
  let city = body
    .ref_id("cidade")?
    .ok_or_else(|| ApiError::validation("Cidade não informada"))?;
  Ok(Address {
    principal: body.bool("principal"),
    postal_code: body.str("codigoPostal"),
    city,
    district: body.required_str("bairro", "Bairro não informado")?,
    street: body.required_str("logradouro", "Logradouro não informado")?,
    number: body.required_str("numero", "Número do endereço não informado")?,
    complement: body.str("complemento"),
  })
}

impl<S: Store> Resource<S> for Enderecos {
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    children::list::<S, Address>(ctx, &filters).await
  }

  async fn post(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let owner = owner_from(&filters, &body)?;
    let address = address_from(&body)?;
    children::insert(ctx, owner, address).await
  }

  async fn put(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    let address = address_from(&body)?;
    children::update(ctx, id, address, MISSING).await
  }

  async fn delete(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    children::delete::<S, Address>(ctx, id, MISSING).await
  }
}
