//! cadastro server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and serves the JSON API over HTTP.
//!
//! # Bootstrapping
//!
//! A fresh database has no users. The first one created gets id 1, which is
//! the default developer and therefore holds every permission:
//!
//! ```text
//! cargo run -p cadastro-api --bin server -- --create-user admin --email admin@example.com
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use cadastro_api::{
  AppState, ServerConfig,
  auth::hash_password,
  config::{MailConfig, MailTransport},
  mail::{LogMailer, SmtpMailer},
  session::MemorySessions,
};
use cadastro_core::{
  mail::Mailer,
  person::{PersonKind, PersonRecord},
  store::PersonStore as _,
};
use cadastro_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Cadastro API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Create a person with this login, prompting for the password, and exit.
  #[arg(long, value_name = "LOGIN", requires = "email")]
  create_user: Option<String>,

  /// Email of the user created with `--create-user`.
  #[arg(long)]
  email: Option<String>,

  /// Display name of the user created with `--create-user`. Defaults to the
  /// login.
  #[arg(long)]
  name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = rpassword_or_stdin()?;
    println!("{}", hash_password(&password)?);
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("CADASTRO")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("developers")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(login) = cli.create_user {
    let email = cli.email.context("--email is required with --create-user")?;
    let password = rpassword_or_stdin()?;
    return create_user(&store, login, email, cli.name, &password).await;
  }

  let state = AppState {
    store:    Arc::new(store),
    config:   Arc::new(server_cfg.clone()),
    sessions: Arc::new(MemorySessions::default()),
    mailer:   mailer(&server_cfg.mail)?,
  };

  let app = cadastro_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn mailer(config: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
  match config.transport {
    MailTransport::Smtp => {
      let smtp = SmtpMailer::new(config).context("failed to configure the mail transport")?;
      tracing::info!(host = %config.host, port = config.port, "mail via SMTP");
      Ok(Arc::new(smtp))
    }
    MailTransport::Log => {
      tracing::warn!("mail.transport is \"log\": new users will not receive their passwords");
      Ok(Arc::new(LogMailer))
    }
  }
}

async fn create_user(
  store: &SqliteStore,
  login: String,
  email: String,
  name: Option<String>,
  password: &str,
) -> anyhow::Result<()> {
  let hash = hash_password(password)?;
  let id = store
    .insert_person(PersonRecord {
      name:           name.unwrap_or_else(|| login.clone()),
      category:       None,
      email:          Some(email),
      corporate_name: None,
      related:        None,
      kind:           PersonKind::Individual,
      supplier:       false,
      customer:       false,
      manufacturer:   false,
      note:           None,
    })
    .await
    .context("failed to create person")?;
  store
    .insert_identity(id, login.clone(), hash)
    .await
    .context("failed to create login")?;

  tracing::info!(id, %login, "user created");
  println!("{id}");
  Ok(())
}

/// Read a password from stdin (no echo).
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
