//! Runtime configuration, deserialised from `config.toml` layered with
//! `CADASTRO_*` environment variables.

use std::path::PathBuf;

use cadastro_core::permission::Developers;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:        String,
  pub port:        u16,
  pub store_path:  PathBuf,
  /// Identity ids that bypass category permissions.
  #[serde(default)]
  pub developers:  Developers,
  #[serde(default)]
  pub consistency: ConsistencyConfig,
  #[serde(default)]
  pub mail:        MailConfig,
}

// ─── Consistency ─────────────────────────────────────────────────────────────

/// How a failed person write is undone.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsistencyConfig {
  #[serde(default)]
  pub create: CreateConsistency,
  #[serde(default)]
  pub update: UpdateConsistency,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CreateConsistency {
  /// Delete the new person row when a later step fails.
  #[default]
  Compensate,
  /// Run the whole creation in one store transaction.
  Transaction,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateConsistency {
  /// Steps that succeeded before a failure stay applied.
  #[default]
  None,
  Transaction,
}

// ─── Mail ────────────────────────────────────────────────────────────────────

/// SMTP account and branding used for outgoing mail.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct MailConfig {
  pub transport:       MailTransport,
  pub host:            String,
  pub port:            u16,
  pub security:        MailSecurity,
  /// Also the sender address.
  pub username:        String,
  pub password:        String,
  pub from_name:       String,
  pub app_url:         String,
  pub logo_url:        String,
  pub primary_color:   String,
  pub secondary_color: String,
}

impl Default for MailConfig {
  fn default() -> Self {
    Self {
      transport:       MailTransport::default(),
      host:            String::new(),
      port:            587,
      security:        MailSecurity::default(),
      username:        String::new(),
      password:        String::new(),
      from_name:       "Cadastro".to_string(),
      app_url:         "http://localhost:8080".to_string(),
      logo_url:        String::new(),
      primary_color:   "#1976d2".to_string(),
      secondary_color: "#424242".to_string(),
    }
  }
}

impl std::fmt::Debug for MailConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MailConfig")
      .field("transport", &self.transport)
      .field("host", &self.host)
      .field("port", &self.port)
      .field("security", &self.security)
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .field("from_name", &self.from_name)
      .field("app_url", &self.app_url)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
  #[default]
  Smtp,
  /// Log recipients and subject only. New users never see their password.
  Log,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailSecurity {
  /// Plain connection upgraded with STARTTLS.
  #[default]
  Starttls,
  /// Implicit TLS, usually port 465.
  Tls,
  /// Unencrypted; only for local relays.
  None,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_fill_optional_sections() {
    let cfg: ServerConfig = serde_json::from_value(serde_json::json!({
      "host": "0.0.0.0",
      "port": 8080,
      "store_path": "cadastro.db",
    }))
    .unwrap();

    assert_eq!(cfg.developers, Developers(vec![1]));
    assert_eq!(cfg.consistency.create, CreateConsistency::Compensate);
    assert_eq!(cfg.consistency.update, UpdateConsistency::None);
    assert_eq!(cfg.mail.from_name, "Cadastro");
    assert_eq!(cfg.mail.transport, MailTransport::Smtp);
    assert_eq!(cfg.mail.port, 587);
  }

  #[test]
  fn mail_section_parses_and_hides_the_password() {
    let cfg: MailConfig = serde_json::from_value(serde_json::json!({
      "transport": "log",
      "host": "smtp.example.com",
      "port": 465,
      "security": "tls",
      "username": "no-reply@example.com",
      "password": "hunter2",
    }))
    .unwrap();

    assert_eq!(cfg.transport, MailTransport::Log);
    assert_eq!(cfg.security, MailSecurity::Tls);
    assert_eq!(cfg.port, 465);
    assert_eq!(cfg.from_name, "Cadastro");
    assert!(!format!("{cfg:?}").contains("hunter2"));
  }

  #[test]
  fn consistency_modes_parse_lowercase() {
    let cfg: ConsistencyConfig = serde_json::from_value(serde_json::json!({
      "create": "transaction",
      "update": "transaction",
    }))
    .unwrap();

    assert_eq!(cfg.create, CreateConsistency::Transaction);
    assert_eq!(cfg.update, UpdateConsistency::Transaction);
  }
}
