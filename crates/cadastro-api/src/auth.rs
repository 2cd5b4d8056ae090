//! HTTP Basic credentials, password hashing and session establishment.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::http::{HeaderMap, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use cadastro_core::{permission, store::Store};
use rand_core::OsRng;

use crate::{
  AppState,
  error::{ApiError, storage},
  session::{Session, SessionIdentity, random_string},
};

const GENERATED_PASSWORD_LEN: usize = 10;

const PASSWORD_ALPHABET: &[u8] =
  b"abcdefghijklmnopqrstuwxyzABCDEFGHIJKLMNOPQRSTUWXYZ0123456789";

/// Login (or email) and password taken from an `Authorization: Basic` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
  pub login:    String,
  pub password: String,
}

/// Parse the `Authorization` header. Anything malformed counts as absent.
pub fn basic_credentials(headers: &HeaderMap) -> Option<BasicCredentials> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, encoded) = value.trim().split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("basic") {
    return None;
  }

  let decoded = B64.decode(encoded.trim()).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (login, password) = creds.split_once(':')?;

  Some(BasicCredentials { login: login.to_owned(), password: password.to_owned() })
}

// ─── Passwords ───────────────────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Store(format!("argon2 error: {e}").into()))
}

/// `false` for a wrong password and for an unparseable stored hash alike.
pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash)
    .map(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
    .unwrap_or(false)
}

/// Initial password for a newly created identity.
pub fn generate_password() -> String {
  random_string(PASSWORD_ALPHABET, GENERATED_PASSWORD_LEN)
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// Check `creds` against the store and build an authenticated session.
pub async fn authenticate<S: Store>(
  state: &AppState<S>,
  creds: &BasicCredentials,
) -> Result<Session, ApiError> {
  let found = state
    .store
    .find_credentials(creds.login.clone())
    .await
    .map_err(storage)?;

  let Some(found) = found else {
    tracing::info!(login = %creds.login, "authentication failed: unknown user");
    return Err(ApiError::not_found("Usuário não encontrado"));
  };
  if !found.active {
    tracing::info!(id = found.id, "authentication failed: inactive user");
    return Err(ApiError::Unauthorized("Usuário desativado".into()));
  }
  if !verify_password(&creds.password, &found.password_hash) {
    tracing::info!(id = found.id, "authentication failed: wrong password");
    return Err(ApiError::Unauthorized("Senha incorreta".into()));
  }

  let permissions = permission::resolve(
    state.store.as_ref(),
    &state.config.developers,
    found.id,
    found.category,
  )
  .await
  .map_err(storage)?;

  tracing::info!(id = found.id, "authenticated");
  Ok(Session {
    identity: Some(SessionIdentity {
      id:            found.id,
      name:          found.name,
      password_hash: found.password_hash,
      category:      found.category,
    }),
    permissions,
  })
}

/// Whether an authenticated session still matches the stored identity: it
/// must exist, be active and have the same password hash as at login.
pub async fn revalidate<S: Store>(
  state: &AppState<S>,
  session: &Session,
) -> Result<bool, ApiError> {
  let Some(identity) = &session.identity else {
    return Ok(false);
  };
  let current = state
    .store
    .credentials_by_id(identity.id)
    .await
    .map_err(storage)?;

  Ok(current.is_some_and(|c| c.active && c.password_hash == identity.password_hash))
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn parses_basic_header() {
    let creds = basic_credentials(&headers(&basic("ana", "s3:cr3t"))).unwrap();
    assert_eq!(creds.login, "ana");
    assert_eq!(creds.password, "s3:cr3t", "only the first colon separates");
  }

  #[test]
  fn scheme_is_case_insensitive() {
    let value = basic("ana", "x").replacen("Basic", "basic", 1);
    assert!(basic_credentials(&headers(&value)).is_some());
  }

  #[test]
  fn rejects_malformed_headers() {
    assert!(basic_credentials(&HeaderMap::new()).is_none());
    assert!(basic_credentials(&headers("Bearer abc")).is_none());
    assert!(basic_credentials(&headers("Basic !!!not-base64!!!")).is_none());
    let no_colon = format!("Basic {}", B64.encode("anonymous"));
    assert!(basic_credentials(&headers(&no_colon)).is_none());
  }

  #[test]
  fn hash_then_verify() {
    let hash = hash_password("secret").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("secret", &hash));
    assert!(!verify_password("wrong", &hash));
    assert!(!verify_password("secret", "not-a-phc-string"));
  }

  #[test]
  fn generated_passwords_use_the_fixed_alphabet() {
    let pw = generate_password();
    assert_eq!(pw.len(), 10);
    assert!(pw.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
  }
}
