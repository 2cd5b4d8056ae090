//! JSON REST API for the registration system.
//!
//! Every path goes through one dispatcher that resolves it against the route
//! table, restores the caller's session, re-checks it against the store and
//! hands a [`Ctx`](resources::Ctx) to the resource handler.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = cadastro_api::router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod body;
pub mod config;
pub mod error;
pub mod mail;
pub mod resources;
pub mod route;
pub mod session;

pub use config::ServerConfig;
pub use error::{ApiError, Reply};

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{Query, Request, State},
  http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, request::Parts},
  response::{IntoResponse, Response},
  routing::any,
};
use bytes::Bytes;
use cadastro_core::{mail::Mailer, store::Store};
use serde_json::json;
use tower_http::{
  cors::{AllowHeaders, AllowOrigin, CorsLayer},
  trace::TraceLayer,
};

use resources::Ctx;
use route::{Filters, Route};
use session::{Session, SessionStore};

/// Request and response header carrying the session token.
pub const SESSION_HEADER: HeaderName = HeaderName::from_static("session");

const MAX_BODY: usize = 8 * 1024 * 1024;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through every request.
#[derive(Clone)]
pub struct AppState<S: Store> {
  pub store:    Arc<S>,
  pub config:   Arc<ServerConfig>,
  pub sessions: Arc<dyn SessionStore>,
  pub mailer:   Arc<dyn Mailer>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

pub fn router<S: Store>(state: AppState<S>) -> Router {
  Router::new()
    .route("/", any(dispatch::<S>))
    .route("/{*path}", any(dispatch::<S>))
    .layer(cors())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Browsers may call from any origin with credentials; the session token
/// header must be readable by them.
fn cors() -> CorsLayer {
  CorsLayer::new()
    .allow_origin(AllowOrigin::mirror_request())
    .allow_credentials(true)
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
    .allow_headers(AllowHeaders::mirror_request())
    .expose_headers([SESSION_HEADER])
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

async fn dispatch<S: Store>(State(state): State<AppState<S>>, req: Request) -> Response {
  let (parts, body) = req.into_parts();

  // Preflights are answered by the CORS layer; a bare OPTIONS still succeeds.
  if parts.method == Method::OPTIONS {
    return Json(json!({})).into_response();
  }

  match axum::body::to_bytes(body, MAX_BODY).await {
    Ok(bytes) => serve(state, &parts, bytes).await,
    Err(_) => (
      StatusCode::PAYLOAD_TOO_LARGE,
      Json(json!({ "error": "Requisição muito grande" })),
    )
      .into_response(),
  }
}

/// Run one request inside its session and persist the session afterwards.
async fn serve<S: Store>(state: AppState<S>, parts: &Parts, bytes: Bytes) -> Response {
  let (token, session) = restore_session(&state, &parts.headers);
  let basic = auth::basic_credentials(&parts.headers);
  let mut ctx = Ctx { state, token, session, basic };

  let mut response = match handle(&mut ctx, parts, &bytes).await {
    Ok(reply) => reply.into_response(),
    Err(e) => {
      tracing::debug!(status = %e.status(), error = %e, "request failed");
      e.into_response()
    }
  };

  if ctx.session.is_authenticated() {
    ctx.state.sessions.save(&ctx.token, ctx.session.clone());
    if let Ok(value) = HeaderValue::from_str(&ctx.token) {
      response.headers_mut().insert(SESSION_HEADER, value);
    }
  } else {
    ctx.state.sessions.destroy(&ctx.token);
  }
  response
}

async fn handle<S: Store>(
  ctx: &mut Ctx<S>,
  parts: &Parts,
  bytes: &[u8],
) -> Result<Reply, ApiError> {
  let resolved = route::resolve(parts.uri.path())?;
  let Query(query) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
    .map_err(|_| ApiError::validation("Parâmetros inválidos"))?;
  let filters = Filters::new(&resolved.positional, query);

  let body = if matches!(parts.method, Method::POST | Method::PUT) {
    body::Body::parse(bytes)?
  } else {
    body::Body::default()
  };

  // Login, logout and password change deal with the session themselves.
  if resolved.route != Route::Autenticacao {
    ensure_session(ctx).await?;
  }

  resources::handle(resolved.route, ctx, &parts.method, filters, body).await
}

/// The presented session if its token is well-formed and known, otherwise a
/// fresh anonymous session under a new token.
fn restore_session<S: Store>(state: &AppState<S>, headers: &HeaderMap) -> (String, Session) {
  let presented = headers
    .get(SESSION_HEADER)
    .and_then(|v| v.to_str().ok())
    .filter(|t| session::is_valid_token(t));

  if let Some(token) = presented
    && let Some(session) = state.sessions.load(token)
  {
    return (token.to_owned(), session);
  }
  (session::generate_token(), Session::default())
}

/// Drop a session whose identity changed since login, and log in with the
/// request's Basic credentials when there is no valid session.
async fn ensure_session<S: Store>(ctx: &mut Ctx<S>) -> Result<(), ApiError> {
  if ctx.session.is_authenticated() {
    if auth::revalidate(&ctx.state, &ctx.session).await? {
      return Ok(());
    }
    tracing::info!(id = ?ctx.identity_id(), "stale session dropped");
    ctx.state.sessions.destroy(&ctx.token);
    ctx.session = Session::default();
  }

  if let Some(creds) = ctx.basic.clone() {
    ctx.session = auth::authenticate(&ctx.state, &creds).await?;
  }
  Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::{path::PathBuf, sync::Mutex};

  use axum::{body::Body, http::header};
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use cadastro_core::{
    mail::{Mail, MailError},
    person::{PersonKind, PersonRecord},
    store::{LocationStore, PersonStore},
  };
  use cadastro_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;

  use super::*;
  use crate::{
    config::{ConsistencyConfig, CreateConsistency, MailConfig},
    session::MemorySessions,
  };

  // ── Doubles ───────────────────────────────────────────────────────────

  #[derive(Default)]
  struct RecordingMailer(Mutex<Vec<Mail>>);

  impl Mailer for RecordingMailer {
    fn send(&self, mail: &Mail) -> Result<(), MailError> {
      self.0.lock().unwrap().push(mail.clone());
      Ok(())
    }
  }

  struct FailingMailer;

  impl Mailer for FailingMailer {
    fn send(&self, _: &Mail) -> Result<(), MailError> {
      Err(MailError("smtp down".into()))
    }
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  fn config(consistency: ConsistencyConfig) -> ServerConfig {
    ServerConfig {
      host: "127.0.0.1".to_string(),
      port: 8080,
      store_path: PathBuf::from(":memory:"),
      developers: Default::default(),
      consistency,
      mail: MailConfig::default(),
    }
  }

  /// A fresh store whose person 1 is the developer `admin` / `secret`.
  async fn make_state_with(
    mailer: Arc<dyn Mailer>,
    consistency: ConsistencyConfig,
  ) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let id = store
      .insert_person(PersonRecord {
        name:           "Admin".into(),
        category:       None,
        email:          Some("admin@example.com".into()),
        corporate_name: None,
        related:        None,
        kind:           PersonKind::Individual,
        supplier:       false,
        customer:       false,
        manufacturer:   false,
        note:           None,
      })
      .await
      .unwrap();
    assert_eq!(id, 1);
    store
      .insert_identity(id, "admin".into(), auth::hash_password("secret").unwrap())
      .await
      .unwrap();

    AppState {
      store: Arc::new(store),
      config: Arc::new(config(consistency)),
      sessions: Arc::new(MemorySessions::default()),
      mailer,
    }
  }

  async fn make_state() -> AppState<SqliteStore> {
    make_state_with(Arc::new(RecordingMailer::default()), ConsistencyConfig::default()).await
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  fn admin() -> Vec<(HeaderName, String)> {
    vec![(header::AUTHORIZATION, auth_header("admin", "secret"))]
  }

  async fn oneshot_raw(
    state: &AppState<SqliteStore>,
    method: &str,
    uri: &str,
    headers: Vec<(HeaderName, String)>,
    body: &str,
  ) -> (StatusCode, HeaderMap, Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
      builder = builder.header(name, value);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    let resp = router(state.clone()).oneshot(req).await.unwrap();

    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
  }

  async fn seed_city(state: &AppState<SqliteStore>) -> i64 {
    let uf = state.store.insert_state("Paraná".into(), "PR".into()).await.unwrap();
    state.store.insert_city(uf, "Curitiba".into(), Some(4106902)).await.unwrap()
  }

  // ── People ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn created_person_reads_back_with_children() {
    let state = make_state().await;
    let (status, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      r#"{"nome":"Ana","documentos":{"cpf":"111"},"telefones":[{"telefone":"5511999"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["newId"].as_i64().unwrap();

    let (status, _, json) =
      oneshot_raw(&state, "GET", &format!("/pessoas/{id}"), admin(), "").await;
    assert_eq!(status, StatusCode::OK);
    let person = &json["data"][0];
    assert_eq!(person["nome"], "Ana");
    assert_eq!(person["tipo"], "F");
    assert_eq!(person["documentos"], json!({ "cpf": "111" }));
    assert_eq!(person["telefones"].as_array().unwrap().len(), 1);
    assert_eq!(person["telefones"][0]["telefone"], "5511999");
    assert_eq!(person["enderecos"], json!([]));
  }

  #[tokio::test]
  async fn login_without_email_is_rejected_before_writing() {
    let state = make_state().await;
    let (status, _, json) =
      oneshot_raw(&state, "POST", "/pessoas", admin(), r#"{"nome":"Bia","login":"bia"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Email não informado");

    let (_, _, json) = oneshot_raw(&state, "GET", "/pessoas?filter=bia", admin(), "").await;
    assert_eq!(json["data"], json!([]));
  }

  #[tokio::test]
  async fn anonymous_listing_is_denied() {
    let state = make_state().await;
    let (status, headers, json) = oneshot_raw(&state, "GET", "/pessoas", vec![], "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Sem permissão para pessoas");
    assert!(headers.get(SESSION_HEADER).is_none());
  }

  #[tokio::test]
  async fn failed_address_removes_the_new_person() {
    let state = make_state().await;
    let (status, _, _) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      r#"{"nome":"Carla","documentos":{"cpf":"222"},
          "enderecos":[{"cidade":999,"bairro":"B","logradouro":"L","numero":"1"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, json) = oneshot_raw(&state, "GET", "/pessoas/2", admin(), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Pessoa não encontrada");
    let (_, _, json) = oneshot_raw(&state, "GET", "/pessoas?filter=carla", admin(), "").await;
    assert_eq!(json["data"], json!([]));
  }

  #[tokio::test]
  async fn transaction_mode_rolls_back_the_whole_creation() {
    let consistency = ConsistencyConfig {
      create: CreateConsistency::Transaction,
      ..Default::default()
    };
    let state =
      make_state_with(Arc::new(RecordingMailer::default()), consistency).await;

    let (status, _, _) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      r#"{"nome":"Carla","enderecos":[{"cidade":999,"bairro":"B","logradouro":"L","numero":"1"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, _, json) = oneshot_raw(&state, "GET", "/pessoas?filter=carla", admin(), "").await;
    assert_eq!(json["data"], json!([]));

    let (status, _, _) =
      oneshot_raw(&state, "POST", "/pessoas", admin(), r#"{"nome":"Carla"}"#).await;
    assert_eq!(status, StatusCode::CREATED);
  }

  #[tokio::test]
  async fn repeating_a_put_leaves_children_unchanged() {
    let state = make_state().await;
    let city = seed_city(&state).await;
    let (_, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      &json!({
        "nome": "Duda",
        "documentos": { "cpf": "333", "rg": "444" },
        "enderecos": [{ "cidade": city, "bairro": "Centro", "logradouro": "Rua XV", "numero": "10" }],
        "telefones": [{ "telefone": "4133333333", "principal": true }],
      })
      .to_string(),
    )
    .await;
    let id = json["newId"].as_i64().unwrap();
    let uri = format!("/pessoas/{id}");

    let (_, _, before) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
    let person = &before["data"][0];
    let edit = json!({
      "nome": "Duda",
      "documentos": person["documentos"],
      "enderecos": person["enderecos"],
      "telefones": person["telefones"],
    })
    .to_string();

    for _ in 0..2 {
      let (status, _, json) = oneshot_raw(&state, "PUT", &uri, admin(), &edit).await;
      assert_eq!(status, StatusCode::OK);
      assert_eq!(json, json!({}));
      let (_, _, after) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
      assert_eq!(after, before);
    }
  }

  #[tokio::test]
  async fn identical_puts_without_child_ids_keep_rows() {
    let state = make_state().await;
    let city = seed_city(&state).await;
    let payload = json!({
      "nome": "Ana",
      "documentos": { "cpf": "111" },
      "enderecos": [{ "cidade": city, "bairro": "Centro", "logradouro": "Rua XV", "numero": "10" }],
      "telefones": [{ "telefone": "5511999" }],
    })
    .to_string();

    let (_, _, json) = oneshot_raw(&state, "POST", "/pessoas", admin(), &payload).await;
    let uri = format!("/pessoas/{}", json["newId"]);
    let (_, _, created) = oneshot_raw(&state, "GET", &uri, admin(), "").await;

    for _ in 0..2 {
      let (status, _, _) = oneshot_raw(&state, "PUT", &uri, admin(), &payload).await;
      assert_eq!(status, StatusCode::OK);
      let (_, _, after) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
      assert_eq!(after, created);
    }
  }

  #[tokio::test]
  async fn misshapen_children_leave_stored_rows_alone() {
    let state = make_state().await;
    let (_, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      r#"{"nome":"Bela","documentos":{"cpf":"777"},"telefones":[{"telefone":"5511"}]}"#,
    )
    .await;
    let uri = format!("/pessoas/{}", json["newId"]);
    let (_, _, before) = oneshot_raw(&state, "GET", &uri, admin(), "").await;

    for (body, message) in [
      (r#"{"nome":"Bela","telefones":["5511"]}"#, "Campo telefones inválido"),
      (r#"{"nome":"Bela","documentos":[]}"#, "Campo documentos inválido"),
    ] {
      let (status, _, json) = oneshot_raw(&state, "PUT", &uri, admin(), body).await;
      assert_eq!(status, StatusCode::BAD_REQUEST);
      assert_eq!(json["error"], message);
    }

    let (_, _, after) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
    assert_eq!(after, before);
  }

  #[tokio::test]
  async fn put_without_children_removes_them() {
    let state = make_state().await;
    let (_, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      r#"{"nome":"Eva","documentos":{"cpf":"555"},"telefones":[{"telefone":"1"}]}"#,
    )
    .await;
    let id = json["newId"].as_i64().unwrap();
    let uri = format!("/pessoas/{id}");

    oneshot_raw(&state, "PUT", &uri, admin(), r#"{"nome":"Eva"}"#).await;

    let (_, _, json) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
    assert_eq!(json["data"][0]["documentos"], json!({}));
    assert_eq!(json["data"][0]["telefones"], json!([]));
  }

  #[tokio::test]
  async fn delete_toggles_active() {
    let state = make_state().await;
    let (_, _, json) =
      oneshot_raw(&state, "POST", "/pessoas", admin(), r#"{"nome":"Fabi"}"#).await;
    let uri = format!("/pessoas/{}", json["newId"]);

    let (status, _, _) = oneshot_raw(&state, "DELETE", &uri, admin(), "").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    oneshot_raw(&state, "DELETE", &uri, admin(), "").await;
    let (status, _, _) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn minimal_projection_has_only_id_and_name() {
    let state = make_state().await;
    let (_, _, json) =
      oneshot_raw(&state, "GET", "/pessoas?props=min&filter=admin", admin(), "").await;
    assert_eq!(json["data"], json!([{ "id": 1, "nome": "Admin" }]));
  }

  // ── Identities and mail ───────────────────────────────────────────────

  #[tokio::test]
  async fn new_login_is_mailed_its_password() {
    let mailer = Arc::new(RecordingMailer::default());
    let state = make_state_with(mailer.clone(), ConsistencyConfig::default()).await;

    let (status, _, _) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      r#"{"nome":"Gil","email":"gil@example.com","login":"gil"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let sent = mailer.0.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to[0].email, "gil@example.com");
    let password = generated_password(&sent[0]);

    let (status, _, json) = oneshot_raw(
      &state,
      "GET",
      "/controleAcesso/autenticacao",
      vec![(header::AUTHORIZATION, auth_header("gil@example.com", &password))],
      "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["nome"], "Gil");
    assert_eq!(json["data"]["permissoes"], json!([]));
  }

  fn generated_password(mail: &Mail) -> String {
    let start = mail.html.find("Senha: <b>").unwrap() + "Senha: <b>".len();
    let end = start + mail.html[start..].find("</b>").unwrap();
    mail.html[start..end].to_string()
  }

  #[tokio::test]
  async fn mail_failure_fails_and_removes_the_person() {
    let state = make_state_with(Arc::new(FailingMailer), ConsistencyConfig::default()).await;
    let (status, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      r#"{"nome":"Hugo","email":"hugo@example.com","login":"hugo"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "smtp down");

    let (_, _, json) = oneshot_raw(&state, "GET", "/pessoas?filter=hugo", admin(), "").await;
    assert_eq!(json["data"], json!([]));
  }

  #[tokio::test]
  async fn email_of_another_user_is_refused() {
    let state = make_state().await;
    let (status, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      r#"{"nome":"Ivo","email":"admin@example.com","login":"ivo"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Email já está em uso por outro usuário");
  }

  // ── Authentication and sessions ───────────────────────────────────────

  #[tokio::test]
  async fn developer_login_holds_every_permission() {
    let state = make_state().await;
    let (status, headers, json) =
      oneshot_raw(&state, "GET", "/controleAcesso/autenticacao", admin(), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["nome"], "Admin");
    assert_eq!(json["data"]["permissoes"], json!(["pessoas", "pessoas/categorias"]));

    let token = json["data"]["session"].as_str().unwrap();
    assert!(session::is_valid_token(token));
    assert_eq!(headers.get(SESSION_HEADER).unwrap(), token);
  }

  #[tokio::test]
  async fn login_failures() {
    let state = make_state().await;
    let cases = [
      (vec![], StatusCode::BAD_REQUEST, "Autenticação basic não informada"),
      (
        vec![(header::AUTHORIZATION, auth_header("nobody", "x"))],
        StatusCode::NOT_FOUND,
        "Usuário não encontrado",
      ),
      (
        vec![(header::AUTHORIZATION, auth_header("admin", "wrong"))],
        StatusCode::UNAUTHORIZED,
        "Senha incorreta",
      ),
    ];
    for (headers, status, message) in cases {
      let (got, _, json) =
        oneshot_raw(&state, "GET", "/controleAcesso/autenticacao", headers, "").await;
      assert_eq!(got, status);
      assert_eq!(json["error"], message);
    }
  }

  #[tokio::test]
  async fn inactive_user_cannot_log_in() {
    let state = make_state().await;
    state.store.toggle_active(1).await.unwrap();
    let (status, _, json) =
      oneshot_raw(&state, "GET", "/controleAcesso/autenticacao", admin(), "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Usuário desativado");
  }

  #[tokio::test]
  async fn session_token_is_reused_until_logout() {
    let state = make_state().await;
    let (_, headers, _) =
      oneshot_raw(&state, "GET", "/controleAcesso/autenticacao", admin(), "").await;
    let token = headers.get(SESSION_HEADER).unwrap().to_str().unwrap().to_string();
    let with_session = || vec![(SESSION_HEADER, token.clone())];

    let (status, headers, _) = oneshot_raw(&state, "GET", "/pessoas", with_session(), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(SESSION_HEADER).unwrap(), token.as_str());

    let (status, _, json) =
      oneshot_raw(&state, "DELETE", "/controleAcesso/autenticacao", with_session(), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({}));

    let (status, _, json) = oneshot_raw(&state, "GET", "/pessoas", with_session(), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Sem permissão para pessoas");

    let (status, _, _) =
      oneshot_raw(&state, "DELETE", "/controleAcesso/autenticacao", with_session(), "").await;
    assert_eq!(status, StatusCode::OK, "logout is idempotent");
  }

  #[tokio::test]
  async fn password_change_invalidates_other_sessions() {
    let state = make_state().await;
    let login = |state: AppState<SqliteStore>| async move {
      let (_, headers, _) =
        oneshot_raw(&state, "GET", "/controleAcesso/autenticacao", admin(), "").await;
      headers.get(SESSION_HEADER).unwrap().to_str().unwrap().to_string()
    };
    let first = login(state.clone()).await;
    let second = login(state.clone()).await;

    let (status, _, _) = oneshot_raw(
      &state,
      "PUT",
      "/controleAcesso/autenticacao",
      vec![(SESSION_HEADER, first.clone())],
      r#"{"senhaAtual":"secret","novaSenha":"s3gr3d0"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) =
      oneshot_raw(&state, "GET", "/pessoas", vec![(SESSION_HEADER, first)], "").await;
    assert_eq!(status, StatusCode::OK, "the changing session keeps working");

    let (status, _, json) =
      oneshot_raw(&state, "GET", "/pessoas", vec![(SESSION_HEADER, second)], "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Sem permissão para pessoas");

    let (status, _, _) = oneshot_raw(
      &state,
      "GET",
      "/controleAcesso/autenticacao",
      vec![(header::AUTHORIZATION, auth_header("admin", "s3gr3d0"))],
      "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn stale_session_with_basic_credentials_logs_in_again() {
    let state = make_state().await;
    let login = |state: AppState<SqliteStore>| async move {
      let (_, headers, _) =
        oneshot_raw(&state, "GET", "/controleAcesso/autenticacao", admin(), "").await;
      headers.get(SESSION_HEADER).unwrap().to_str().unwrap().to_string()
    };
    let changer = login(state.clone()).await;
    let stale = login(state.clone()).await;

    oneshot_raw(
      &state,
      "PUT",
      "/controleAcesso/autenticacao",
      vec![(SESSION_HEADER, changer)],
      r#"{"senhaAtual":"secret","novaSenha":"s3gr3d0"}"#,
    )
    .await;

    let (status, headers, _) = oneshot_raw(
      &state,
      "GET",
      "/pessoas",
      vec![
        (SESSION_HEADER, stale.clone()),
        (header::AUTHORIZATION, auth_header("admin", "s3gr3d0")),
      ],
      "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(SESSION_HEADER).unwrap(), stale.as_str());

    let (status, _, _) =
      oneshot_raw(&state, "GET", "/pessoas", vec![(SESSION_HEADER, stale)], "").await;
    assert_eq!(status, StatusCode::OK, "the renewed session is kept");
  }

  #[tokio::test]
  async fn password_change_requires_the_current_password() {
    let state = make_state().await;
    let (status, _, json) = oneshot_raw(
      &state,
      "PUT",
      "/controleAcesso/autenticacao",
      vec![],
      r#"{"senhaAtual":"secret","novaSenha":"x"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Não autenticado");

    let (_, headers, _) =
      oneshot_raw(&state, "GET", "/controleAcesso/autenticacao", admin(), "").await;
    let token = headers.get(SESSION_HEADER).unwrap().to_str().unwrap().to_string();
    let (status, _, json) = oneshot_raw(
      &state,
      "PUT",
      "/controleAcesso/autenticacao",
      vec![(SESSION_HEADER, token)],
      r#"{"senhaAtual":"nope","novaSenha":"x"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Senha incorreta");
  }

  // ── Categories and permissions ────────────────────────────────────────

  #[tokio::test]
  async fn category_grants_drive_a_users_permissions() {
    let mailer = Arc::new(RecordingMailer::default());
    let state = make_state_with(mailer.clone(), ConsistencyConfig::default()).await;

    let (status, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas/categorias",
      admin(),
      r#"{"nome":"Vendas","permissoes":[1]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let category = json["newId"].as_i64().unwrap();

    oneshot_raw(
      &state,
      "POST",
      "/pessoas",
      admin(),
      &json!({ "nome": "Juca", "email": "juca@example.com", "login": "juca", "categoria": category })
        .to_string(),
    )
    .await;
    let password = generated_password(&mailer.0.lock().unwrap()[0]);
    let juca = vec![(header::AUTHORIZATION, auth_header("juca", &password))];

    let (_, _, json) =
      oneshot_raw(&state, "GET", "/controleAcesso/autenticacao", juca.clone(), "").await;
    assert_eq!(json["data"]["permissoes"], json!(["pessoas"]));

    let (status, _, _) = oneshot_raw(&state, "GET", "/pessoas", juca.clone(), "").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, json) = oneshot_raw(&state, "GET", "/pessoas/categorias", juca.clone(), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["nome"], "Vendas");
    assert_eq!(json["data"][0]["permissoes"], json!([]), "grants need pessoas/categorias");

    let (status, _, json) =
      oneshot_raw(&state, "GET", "/controleAcesso/permissoes", juca.clone(), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Sem permissão para pontos de controle de permissão");

    let (status, _, json) = oneshot_raw(
      &state,
      "GET",
      &format!("/pessoas/categorias/{category}/permissoes"),
      juca,
      "",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "own category grants are readable");
    assert_eq!(json["data"][0]["chave"], "pessoas");
  }

  #[tokio::test]
  async fn category_put_reconciles_grants() {
    let state = make_state().await;
    let (_, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas/categorias",
      admin(),
      r#"{"nome":"Compras","permissoes":[1]}"#,
    )
    .await;
    let uri = format!("/pessoas/categorias/{}", json["newId"]);

    let (status, _, _) =
      oneshot_raw(&state, "PUT", &uri, admin(), r#"{"nome":"Compras","permissoes":[2]}"#).await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, json) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
    let keys: Vec<&str> = json["data"][0]["permissoes"]
      .as_array()
      .unwrap()
      .iter()
      .map(|g| g["chave"].as_str().unwrap())
      .collect();
    assert_eq!(keys, vec!["pessoas/categorias"]);
  }

  #[tokio::test]
  async fn modules_list_their_permissions() {
    let state = make_state().await;
    let (status, _, json) =
      oneshot_raw(&state, "GET", "/controleAcesso/modulos", admin(), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["nome"], "Pessoas");
    assert_eq!(json["data"][0]["permissoes"].as_array().unwrap().len(), 2);
    assert!(json["data"][0]["permissoes"][0].get("modulo").is_none());
  }

  // ── Child resources and locations ─────────────────────────────────────

  #[tokio::test]
  async fn child_resources_are_scoped_to_their_person() {
    let state = make_state().await;
    let (status, _, json) = oneshot_raw(
      &state,
      "POST",
      "/pessoas/1/telefones",
      admin(),
      r#"{"telefone":"4199999999"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let phone = json["newId"].as_i64().unwrap();

    let (_, _, json) = oneshot_raw(&state, "GET", "/pessoas/telefones?pessoas=1", admin(), "").await;
    assert_eq!(json["data"]["1"][0]["id"], phone);

    let uri = format!("/pessoas/telefones/{phone}");
    let (status, _, _) =
      oneshot_raw(&state, "PUT", &uri, admin(), r#"{"telefone":"4188888888"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, json) = oneshot_raw(&state, "GET", &uri, admin(), "").await;
    assert_eq!(json["data"][0]["telefone"], "4188888888");

    let (status, _, _) = oneshot_raw(&state, "DELETE", &uri, admin(), "").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, json) = oneshot_raw(&state, "DELETE", &uri, admin(), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Telefone não encontrado");

    let (status, _, json) = oneshot_raw(&state, "GET", "/pessoas/documentos", admin(), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Nenhum filtro informado");
  }

  #[tokio::test]
  async fn locations_are_public() {
    let state = make_state().await;
    let city = seed_city(&state).await;

    let (status, _, json) = oneshot_raw(&state, "GET", "/locais/estados", vec![], "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["sigla"], "PR");

    let (_, _, json) =
      oneshot_raw(&state, "GET", "/locais/cidades?idTerceiro=4106902", vec![], "").await;
    assert_eq!(json["data"][0]["id"], city);

    let (status, _, json) = oneshot_raw(&state, "GET", "/locais/cidades", vec![], "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Estado nem idTerceiro foram informados");
  }

  // ── Routing and CORS ──────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_route_and_method() {
    let state = make_state().await;
    let (status, _, json) = oneshot_raw(&state, "GET", "/produtos", vec![], "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Recurso não encontrado");

    let (status, _, json) = oneshot_raw(&state, "POST", "/locais/estados", vec![], "{}").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["error"], "Método não disponível");

    let (status, _, json) = oneshot_raw(&state, "GET", "/", vec![], "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Rota não informada");
  }

  #[tokio::test]
  async fn invalid_json_body() {
    let state = make_state().await;
    let (status, _, json) = oneshot_raw(&state, "POST", "/pessoas", admin(), "{nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "JSON inválido");
  }

  #[tokio::test]
  async fn preflight_and_origin_echo() {
    let state = make_state().await;
    let (status, headers, _) = oneshot_raw(
      &state,
      "OPTIONS",
      "/pessoas",
      vec![
        (header::ORIGIN, "http://app.example".to_string()),
        (header::ACCESS_CONTROL_REQUEST_METHOD, "POST".to_string()),
        (header::ACCESS_CONTROL_REQUEST_HEADERS, "session, authorization".to_string()),
      ],
      "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://app.example");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    let methods: Vec<&str> = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
      .to_str()
      .unwrap()
      .split(',')
      .map(str::trim)
      .collect();
    assert_eq!(methods, ["GET", "POST", "PUT", "DELETE", "OPTIONS"]);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "session, authorization");

    let (_, headers, _) = oneshot_raw(
      &state,
      "GET",
      "/produtos",
      vec![(header::ORIGIN, "http://app.example".to_string())],
      "",
    )
    .await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://app.example");
  }
}
