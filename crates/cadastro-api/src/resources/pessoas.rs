//! `pessoas`: the person aggregate.
//!
//! A write touches the person row and then, strictly in this order, the
//! employee record, documents, addresses, phones and the login identity.
//! How a failure part-way through is undone depends on
//! [`ConsistencyConfig`](crate::config::ConsistencyConfig).

use std::collections::{BTreeMap, HashMap};

use cadastro_core::{
  access::Identity,
  person::{
    Address, AddressView, Document, Employee, PersonKind, PersonQuery,
    PersonRecord, PersonRow, Phone, parse_date,
  },
  reconcile::{Desired, Stored, by_value, reconcile},
  store::{ChildFilter, ChildStore, Store, Transactional as _},
};
use chrono::NaiveDate;
use serde::Serialize;

use super::{Ctx, Resource, enderecos, id_from, telefones};
use crate::{
  AppState,
  auth::{generate_password, hash_password},
  body::Body,
  config::{CreateConsistency, UpdateConsistency},
  error::{ApiError, Reply, storage},
  mail::{deliver, welcome_mail},
  route::Filters,
};

pub struct Pessoas;

const NO_PERMISSION: &str = "Sem permissão para pessoas";
const MISSING: &str = "Pessoa não encontrada";

// ─── Input ───────────────────────────────────────────────────────────────────

/// A validated person write.
#[derive(Debug, Clone)]
struct PersonDraft {
  record:    PersonRecord,
  employee:  Option<Employee>,
  documents: Vec<Desired<Document>>,
  addresses: Vec<Desired<Address>>,
  phones:    Vec<Desired<Phone>>,
  login:     Option<String>,
}

impl PersonDraft {
  fn from_body(body: &Body) -> Result<Self, ApiError> {
    let name = body.required_str("nome", "Nome não informado")?;
    let kind = match body.str("tipo") {
      None => PersonKind::default(),
      Some(t) => PersonKind::parse(&t).map_err(|_| ApiError::validation("Tipo inválido"))?,
    };
    let employee = employee_from(body)?;

    let mut documents = Vec::new();
    for (kind, value) in body.entries("documentos")? {
      let value = value.ok_or_else(|| ApiError::validation("Valor não informado"))?;
      documents.push(Desired::new(Document { kind, value }));
    }

    let addresses = body
      .list("enderecos")?
      .iter()
      .map(|item| {
        Ok(Desired { id: item.int("id")?, value: enderecos::address_from(item)? })
      })
      .collect::<Result<Vec<_>, ApiError>>()?;

    let phones = body
      .list("telefones")?
      .iter()
      .map(|item| {
        Ok(Desired { id: item.int("id")?, value: telefones::phone_from(item)? })
      })
      .collect::<Result<Vec<_>, ApiError>>()?;

    let email = body.str("email");
    let login = body.str("login");
    if login.is_some() && email.is_none() {
      return Err(ApiError::validation("Email não informado"));
    }

    Ok(Self {
      record: PersonRecord {
        name,
        category: body.ref_id("categoria")?,
        email,
        corporate_name: body.str("razaoSocial"),
        related: body.ref_id("pessoa")?,
        kind,
        supplier: body.bool("fornecedor"),
        customer: body.bool("cliente"),
        manufacturer: body.bool("fabricante"),
        note: body.str("observacao"),
      },
      employee,
      documents,
      addresses,
      phones,
      login,
    })
  }

  /// A person with a login must have an email no other identity uses.
  async fn check_email<S: Store>(&self, store: &S, except: Option<i64>) -> Result<(), ApiError> {
    let (Some(_), Some(email)) = (&self.login, &self.record.email) else {
      return Ok(());
    };
    if store.email_in_use(email.clone(), except).await.map_err(storage)? {
      return Err(ApiError::validation("Email já está em uso por outro usuário"));
    }
    Ok(())
  }
}

fn employee_from(body: &Body) -> Result<Option<Employee>, ApiError> {
  let Some(employee) = body.object("funcionario") else {
    return Ok(None);
  };
  let admission =
    employee.required_str("dataAdmissao", "Data de admissao não informada")?;
  let termination = employee
    .str("dataDemissao")
    .map(|d| date(&d, "Data de demissão inválida"))
    .transpose()?;

  Ok(Some(Employee {
    mother_name:      employee.str("nomeMae"),
    father_name:      employee.str("nomePai"),
    admission_date:   date(&admission, "Data de admissão inválida")?,
    termination_date: termination,
  }))
}

/// Accepts `YYYY-MM-DD`, ignoring any time part after it.
fn date(s: &str, msg: &str) -> Result<NaiveDate, ApiError> {
  parse_date(s.get(..10).unwrap_or(s)).map_err(|_| ApiError::validation(msg))
}

// ─── Aspect writes ───────────────────────────────────────────────────────────

/// Bring every aspect of person `id` in line with `draft`, stopping at the
/// first failure.
async fn write_aspects<S: Store>(
  state: &AppState<S>,
  store: &S,
  id: i64,
  draft: PersonDraft,
) -> Result<(), ApiError> {
  sync_employee(store, id, draft.employee).await?;
  reconcile(store, id, draft.documents, |d: &Document| Some(d.kind.clone()))
    .await
    .map_err(storage)?;
  reconcile(store, id, draft.addresses, by_value::<Address>).await.map_err(storage)?;
  reconcile(store, id, draft.phones, by_value::<Phone>).await.map_err(storage)?;
  sync_identity(state, store, id, &draft.record, draft.login).await
}

async fn sync_employee<S: Store>(
  store: &S,
  id: i64,
  employee: Option<Employee>,
) -> Result<(), ApiError> {
  let current = store.get_employee(id).await.map_err(storage)?;
  let written = match (current, employee) {
    (None, Some(wanted)) => store.insert_employee(id, wanted).await,
    (Some(stored), Some(wanted)) if stored != wanted => {
      store.update_employee(id, wanted).await
    }
    (Some(_), None) => store.delete_employee(id).await,
    _ => Ok(()),
  };
  written.map_err(storage)
}

async fn sync_identity<S: Store>(
  state: &AppState<S>,
  store: &S,
  id: i64,
  record: &PersonRecord,
  login: Option<String>,
) -> Result<(), ApiError> {
  let current = store.get_identity(id).await.map_err(storage)?;
  match (current, login) {
    (None, Some(login)) => {
      let email = record
        .email
        .clone()
        .ok_or_else(|| ApiError::validation("Email não informado"))?;
      let password = generate_password();
      store
        .insert_identity(id, login.clone(), hash_password(&password)?)
        .await
        .map_err(storage)?;
      tracing::info!(id, %login, "identity created");

      let mail = welcome_mail(&state.config.mail, &record.name, &email, &login, &password);
      deliver(state.mailer.clone(), mail).await
    }
    (Some(Identity { login: stored, .. }), Some(login)) if stored != login => {
      store.update_login(id, login).await.map_err(storage)
    }
    (Some(_), None) => {
      tracing::info!(id, "identity removed");
      store.delete_identity(id).await.map_err(storage)
    }
    _ => Ok(()),
  }
}

/// Commit `txn` if `result` is a success, roll it back otherwise.
async fn finish<S: Store, T: Send>(txn: S, result: Result<T, ApiError>) -> Result<T, ApiError> {
  match result {
    Ok(value) => {
      txn.commit().await.map_err(storage)?;
      Ok(value)
    }
    Err(e) => {
      tracing::warn!(error = %e, "person write failed, rolling back");
      if let Err(rollback) = txn.rollback().await {
        tracing::error!(error = %rollback, "rollback failed");
      }
      Err(e)
    }
  }
}

async fn update_row<S: Store>(store: &S, id: i64, record: PersonRecord) -> Result<(), ApiError> {
  if store.update_person(id, record).await.map_err(storage)? {
    Ok(())
  } else {
    Err(ApiError::not_found(MISSING))
  }
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PersonView {
  #[serde(flatten)]
  row:        PersonRow,
  documentos: BTreeMap<String, String>,
  enderecos:  Vec<Stored<AddressView>>,
  telefones:  Vec<Stored<Phone>>,
}

fn by_owner<V>(rows: Vec<Stored<V>>) -> HashMap<i64, Vec<Stored<V>>> {
  let mut grouped: HashMap<i64, Vec<Stored<V>>> = HashMap::new();
  for row in rows {
    grouped.entry(row.owner).or_default().push(row);
  }
  grouped
}

fn search_query(filters: &Filters) -> Result<PersonQuery, ApiError> {
  let defaults = PersonQuery::default();
  Ok(PersonQuery {
    id:                 filters.int("0")?,
    text:               filters.value("filter").map(str::to_owned),
    customers_only:     filters.flag("clientes"),
    manufacturers_only: filters.flag("fabricantes"),
    // SQLite reads a negative LIMIT as "no limit".
    limit:              filters.int("limit")?.unwrap_or(defaults.limit).max(1),
    offset:             filters.int("offset")?.unwrap_or(defaults.offset).max(0),
  })
}

// ─── Handlers ────────────────────────────────────────────────────────────────

impl<S: Store> Resource<S> for Pessoas {
  async fn get(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let query = search_query(&filters)?;
    let store = ctx.store();

    if filters.value("props") == Some("min") || filters.flag("minimal") {
      let rows = store.search_people_minimal(&query).await.map_err(storage)?;
      if query.id.is_some() && rows.is_empty() {
        return Err(ApiError::not_found(MISSING));
      }
      return Reply::data(rows);
    }

    let rows = store.search_people(&query).await.map_err(storage)?;
    if query.id.is_some() && rows.is_empty() {
      return Err(ApiError::not_found(MISSING));
    }
    if rows.is_empty() {
      return Reply::data(Vec::<PersonView>::new());
    }

    let filter = ChildFilter::by_owners(rows.iter().map(|r| r.id).collect());
    let mut documents = by_owner(
      ChildStore::<Document>::list_views(store, &filter).await.map_err(storage)?,
    );
    let mut addresses = by_owner(
      ChildStore::<Address>::list_views(store, &filter)
        .await
        .map_err(storage)?,
    );
    let mut phones = by_owner(
      ChildStore::<Phone>::list_views(store, &filter).await.map_err(storage)?,
    );

    let people: Vec<PersonView> = rows
      .into_iter()
      .map(|row| PersonView {
        documentos: documents
          .remove(&row.id)
          .unwrap_or_default()
          .into_iter()
          .map(|d| (d.value.kind, d.value.value))
          .collect(),
        enderecos: addresses.remove(&row.id).unwrap_or_default(),
        telefones: phones.remove(&row.id).unwrap_or_default(),
        row,
      })
      .collect();

    Reply::data(people)
  }

  async fn post(ctx: &mut Ctx<S>, _filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let draft = PersonDraft::from_body(&body)?;
    let state = ctx.state.clone();
    draft.check_email(state.store.as_ref(), None).await?;

    match state.config.consistency.create {
      CreateConsistency::Compensate => {
        let store = state.store.as_ref();
        let id = store.insert_person(draft.record.clone()).await.map_err(storage)?;
        if let Err(e) = write_aspects(&state, store, id, draft).await {
          tracing::warn!(id, error = %e, "person creation failed, removing the row");
          if let Err(cleanup) = store.delete_person(id).await {
            tracing::error!(id, error = %cleanup, "compensating delete failed");
          }
          return Err(e);
        }
        Ok(Reply::Created(Some(id)))
      }
      CreateConsistency::Transaction => {
        let txn = state.store.begin().await.map_err(storage)?;
        let result: Result<i64, ApiError> = async {
          let id = txn.insert_person(draft.record.clone()).await.map_err(storage)?;
          write_aspects(&state, &txn, id, draft).await?;
          Ok(id)
        }
        .await;
        let id = finish(txn, result).await?;
        Ok(Reply::Created(Some(id)))
      }
    }
  }

  async fn put(ctx: &mut Ctx<S>, filters: Filters, body: Body) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    let draft = PersonDraft::from_body(&body)?;
    let state = ctx.state.clone();
    draft.check_email(state.store.as_ref(), Some(id)).await?;

    match state.config.consistency.update {
      UpdateConsistency::None => {
        let store = state.store.as_ref();
        update_row(store, id, draft.record.clone()).await?;
        write_aspects(&state, store, id, draft).await?;
      }
      UpdateConsistency::Transaction => {
        let txn = state.store.begin().await.map_err(storage)?;
        let result: Result<(), ApiError> = async {
          update_row(&txn, id, draft.record.clone()).await?;
          write_aspects(&state, &txn, id, draft).await
        }
        .await;
        finish(txn, result).await?;
      }
    }
    Ok(Reply::Empty)
  }

  /// Flips the active flag; inactive people drop out of listings.
  async fn delete(ctx: &mut Ctx<S>, filters: Filters) -> Result<Reply, ApiError> {
    ctx.require("pessoas", NO_PERMISSION)?;
    let id = id_from(&filters)?;
    if !ctx.store().toggle_active(id).await.map_err(storage)? {
      return Err(ApiError::not_found(MISSING));
    }
    Ok(Reply::Empty)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn draft(json: &str) -> Result<PersonDraft, ApiError> {
    PersonDraft::from_body(&Body::parse(json.as_bytes()).unwrap())
  }

  fn message(json: &str) -> String { draft(json).unwrap_err().to_string() }

  #[test]
  fn validation_messages() {
    assert_eq!(message("{}"), "Nome não informado");
    assert_eq!(message(r#"{"nome":"Ana","tipo":"X"}"#), "Tipo inválido");
    assert_eq!(
      message(r#"{"nome":"Ana","funcionario":{"nomeMae":"M"}}"#),
      "Data de admissao não informada"
    );
    assert_eq!(
      message(r#"{"nome":"Ana","funcionario":{"dataAdmissao":"ontem"}}"#),
      "Data de admissão inválida"
    );
    assert_eq!(message(r#"{"nome":"Ana","documentos":{"cpf":""}}"#), "Valor não informado");
    assert_eq!(message(r#"{"nome":"Ana","enderecos":[{}]}"#), "Cidade não informada");
    assert_eq!(message(r#"{"nome":"Ana","telefones":[{}]}"#), "Telefone não informado");
    assert_eq!(message(r#"{"nome":"Ana","login":"ana"}"#), "Email não informado");
  }

  #[test]
  fn paging_is_clamped() {
    let filters = Filters::new(&[], vec![
      ("limit".into(), "-1".into()),
      ("offset".into(), "-5".into()),
    ]);
    let query = search_query(&filters).unwrap();
    assert_eq!((query.limit, query.offset), (1, 0));

    let query = search_query(&Filters::default()).unwrap();
    assert_eq!((query.limit, query.offset), (25, 0));
  }

  #[test]
  fn misshapen_children_are_rejected() {
    assert_eq!(message(r#"{"nome":"Ana","telefones":["5511"]}"#), "Campo telefones inválido");
    assert_eq!(message(r#"{"nome":"Ana","documentos":[]}"#), "Campo documentos inválido");
  }

  #[test]
  fn full_draft() {
    let d = draft(
      r#"{
        "nome": "Acme", "tipo": "J", "email": "a@acme.com", "cliente": true,
        "categoria": {"id": 2, "nome": "Clientes"},
        "funcionario": {"dataAdmissao": "2020-03-01T00:00:00"},
        "documentos": {"cnpj": "123"},
        "enderecos": [{"id": 9, "cidade": 1, "bairro": "B", "logradouro": "L", "numero": "1"}],
        "telefones": [{"telefone": "5511999"}],
        "login": "acme"
      }"#,
    )
    .unwrap();

    assert_eq!(d.record.kind, PersonKind::Corporate);
    assert_eq!(d.record.category, Some(2));
    assert!(d.record.customer);
    assert!(!d.record.supplier);
    assert_eq!(
      d.employee.unwrap().admission_date,
      NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
    );
    assert_eq!(d.documents, vec![Desired::new(Document {
      kind:  "cnpj".into(),
      value: "123".into(),
    })]);
    assert_eq!(d.addresses[0].id, Some(9));
    assert_eq!(d.phones[0].id, None);
    assert_eq!(d.login.as_deref(), Some("acme"));
  }
}
