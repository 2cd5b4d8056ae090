//! `controleAcesso/modulos`

use cadastro_core::store::Store;
use serde::Serialize;

use super::{Ctx, Resource, permissoes};
use crate::{
  error::{ApiError, Reply, storage},
  route::Filters,
};

pub struct Modulos;

#[derive(Debug, Serialize)]
struct PermissionItem {
  id:    i64,
  nome:  String,
  chave: String,
}

#[derive(Debug, Serialize)]
struct ModuleView {
  id:         i64,
  nome:       String,
  icone:      Option<String>,
  permissoes: Vec<PermissionItem>,
}

impl<S: Store> Resource<S> for Modulos {
  /// Modules with the permission points visible to the session. Modules
  /// with none are left out.
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas/categorias", "Sem permissão para módulos")?;
    let modules = ctx.store().list_modules(filters.int("0")?).await.map_err(storage)?;
    let permissions = permissoes::visible(ctx, None, None).await?;

    let views: Vec<ModuleView> = modules
      .into_iter()
      .filter_map(|m| {
        let items: Vec<PermissionItem> = permissions
          .iter()
          .filter(|p| p.module.id == m.id)
          .map(|p| PermissionItem { id: p.id, nome: p.name.clone(), chave: p.key.clone() })
          .collect();
        (!items.is_empty()).then(|| ModuleView {
          id:         m.id,
          nome:       m.name,
          icone:      m.icon,
          permissoes: items,
        })
      })
      .collect();
    Reply::data(views)
  }
}
