//! Welcome mail for new identities and the transports that send it.

use std::sync::Arc;

use cadastro_core::mail::{Mail, MailError, Mailer, Recipient};
use lettre::{
  Address, Message, SmtpTransport, Transport as _,
  message::{Mailbox, header::ContentType},
  transport::smtp::authentication::Credentials,
};

use crate::{
  config::{MailConfig, MailSecurity},
  error::ApiError,
};

// ─── Transports ──────────────────────────────────────────────────────────────

/// Delivers mail through the SMTP account in `[mail]`.
#[derive(Clone)]
pub struct SmtpMailer {
  transport: SmtpTransport,
  from:      Mailbox,
}

impl SmtpMailer {
  pub fn new(config: &MailConfig) -> Result<Self, MailError> {
    if config.host.is_empty() {
      return Err(MailError("mail.host is not set".into()));
    }
    let address = config
      .username
      .parse::<Address>()
      .map_err(|e| MailError(format!("invalid sender {:?}: {e}", config.username)))?;
    let from = Mailbox::new(Some(config.from_name.clone()), address);

    let builder = match config.security {
      MailSecurity::Starttls => SmtpTransport::starttls_relay(&config.host),
      MailSecurity::Tls => SmtpTransport::relay(&config.host),
      MailSecurity::None => Ok(SmtpTransport::builder_dangerous(&config.host)),
    }
    .map_err(|e| MailError(e.to_string()))?;

    let transport = builder
      .port(config.port)
      .credentials(Credentials::new(config.username.clone(), config.password.clone()))
      .build();

    Ok(Self { transport, from })
  }
}

impl Mailer for SmtpMailer {
  fn send(&self, mail: &Mail) -> Result<(), MailError> {
    let message = message(&self.from, mail)?;
    self
      .transport
      .send(&message)
      .map(|_| ())
      .map_err(|e| MailError(e.to_string()))
  }
}

/// An HTML message from `from` to every recipient of `mail`.
fn message(from: &Mailbox, mail: &Mail) -> Result<Message, MailError> {
  let mut builder = Message::builder()
    .from(from.clone())
    .subject(mail.subject.as_str())
    .header(ContentType::TEXT_HTML);
  for recipient in &mail.to {
    let address = recipient
      .email
      .parse::<Address>()
      .map_err(|e| MailError(format!("invalid recipient {:?}: {e}", recipient.email)))?;
    builder = builder.to(Mailbox::new(Some(recipient.name.clone()), address));
  }
  builder.body(mail.html.clone()).map_err(|e| MailError(e.to_string()))
}

/// Logs who would have received a mail and drops it. Only used when
/// `mail.transport = "log"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
  fn send(&self, mail: &Mail) -> Result<(), MailError> {
    let to: Vec<&str> = mail.to.iter().map(|r| r.email.as_str()).collect();
    tracing::warn!(subject = %mail.subject, ?to, "mail dropped by the log transport");
    Ok(())
  }
}

// ─── Delivery ────────────────────────────────────────────────────────────────

/// Run `mailer` off the async runtime.
pub async fn deliver(mailer: Arc<dyn Mailer>, mail: Mail) -> Result<(), ApiError> {
  let subject = mail.subject.clone();
  let result = tokio::task::spawn_blocking(move || mailer.send(&mail))
    .await
    .map_err(|e| ApiError::Mail(e.to_string()))?;

  match result {
    Ok(()) => {
      tracing::info!(%subject, "mail sent");
      Ok(())
    }
    Err(e) => {
      tracing::warn!(%subject, error = %e, "mail failed");
      Err(ApiError::Mail(e.0))
    }
  }
}

/// The mail telling a new user their login and generated password.
pub fn welcome_mail(
  config: &MailConfig,
  name: &str,
  email: &str,
  login: &str,
  password: &str,
) -> Mail {
  let logo = if config.logo_url.is_empty() {
    String::new()
  } else {
    format!(
      r#"<img src="{}" alt="{}" style="max-height:64px"><br>"#,
      config.logo_url, config.from_name
    )
  };

  let html = format!(
    r#"<div style="font-family:sans-serif;color:{secondary}">
{logo}<h2 style="color:{primary}">Olá {name}</h2>
<p>Seja bem-vindo(a) à {from}.</p>
<p>Seu usuário foi cadastrado com os seguintes dados de acesso:</p>
<p>Login: <b>{login}</b><br>Senha: <b>{password}</b></p>
<p><a href="{url}" style="display:inline-block;padding:10px 20px;background:{primary};color:#fff;text-decoration:none;border-radius:4px">Clique para acessar</a></p>
</div>"#,
    primary = config.primary_color,
    secondary = config.secondary_color,
    from = config.from_name,
    url = config.app_url,
  );

  Mail {
    subject: "Usuário cadastrado".to_string(),
    html,
    to: vec![Recipient { email: email.to_owned(), name: name.to_owned() }],
  }
}
