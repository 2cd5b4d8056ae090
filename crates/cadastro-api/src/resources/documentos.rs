//! `pessoas/documentos`

use cadastro_core::{person::Document, store::Store};

use super::{Ctx, Resource, children, id_from, owner_from};
use crate::{
  body::Body,
  error::{ApiError, Reply},
  route::Filters,
};

pub struct Documentos;

const NO_PERMISSION: &str = "Sem permissão para pessoas";
const MISSING: &str = "Documento não encontrado";

pub(crate) fn document_from(body: &Body) -> Result<Document, ApiError> {
  Ok(Document {
    kind:  body.required_str("documento", "Documento não informado")?,
    value: body.required_str("valor", "Valor não informado")?,
  })
}

impl<S: Store> Resource<S> for Documentos {
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    children::list::<S, Document>(ctx, &filters).await
  }

  async fn post(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let owner = owner_from(&filters, &body)?;
    let document = document_from(&body)?;
    children::insert(ctx, owner, document).await
  }

  async fn put(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    let document = document_from(&body)?;
    children::update(ctx, id, document, MISSING).await
  }

  async fn delete(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    children::delete::<S, Document>(ctx, id, MISSING).await
  }
}
