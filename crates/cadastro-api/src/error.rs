//! API error type, success envelope and their [`IntoResponse`] impls.
//!
//! Every response body is one of `{"error": msg}`, `{"data": ...}`,
//! `{"newId": id}` or `{}`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// An error returned by a resource handler. Messages are user-facing.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  /// The session lacks a required permission. Reported as 400.
  #[error("{0}")]
  Permission(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  NotFound(String),

  #[error("Recurso não encontrado")]
  RouteNotFound,

  #[error("Método não disponível")]
  MethodNotAllowed,

  #[error("{0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("{0}")]
  Mail(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl ApiError {
  pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

  pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Validation(_)
      | ApiError::Permission(_)
      | ApiError::Store(_)
      | ApiError::Mail(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
      ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
      ApiError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

/// Wrap a store error, logging it on the way.
pub fn storage<E>(e: E) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  tracing::warn!(error = %e, "store operation failed");
  ApiError::Store(Box::new(e))
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
  }
}

// ─── Success ─────────────────────────────────────────────────────────────────

/// A successful handler result.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
  /// 200 `{"data": ...}`
  Data(Value),
  /// 201 `{"newId": id}`, or `{}` when there is no single new id.
  Created(Option<i64>),
  /// 200 `{}`
  Empty,
}

impl Reply {
  pub fn data(value: impl Serialize) -> Result<Self, ApiError> {
    Ok(Reply::Data(serde_json::to_value(value)?))
  }
}

impl IntoResponse for Reply {
  fn into_response(self) -> Response {
    match self {
      Reply::Data(data) => (StatusCode::OK, Json(json!({ "data": data }))).into_response(),
      Reply::Created(Some(id)) => {
        (StatusCode::CREATED, Json(json!({ "newId": id }))).into_response()
      }
      Reply::Created(None) => (StatusCode::CREATED, Json(json!({}))).into_response(),
      Reply::Empty => (StatusCode::OK, Json(json!({}))).into_response(),
    }
  }
}
