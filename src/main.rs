use std::env;
use std::io;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::Value;
use tr_api::{Id, SessionMonitor, TreinoApi};
use tr_auth::{AuthenticatingHttpClient, ClientConfig, FileCredentialStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: treino [students | student <id> | sheets <studentId> | sign-out]";

enum Command {
    Students,
    Student(Id),
    Sheets(Id),
    SignOut,
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let command = match args.next().as_deref() {
            None | Some("students") => Self::Students,
            Some("student") => Self::Student(Id::new(args.next().context(USAGE)?)),
            Some("sheets") => Self::Sheets(Id::new(args.next().context(USAGE)?)),
            Some("sign-out") => Self::SignOut,
            Some(other) => bail!("unknown command `{}`\n{}", other, USAGE),
        };
        Ok(command)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config() -> anyhow::Result<ClientConfig> {
    let mut config = match ClientConfig::default_path() {
        Ok(path) => ClientConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        Err(e) => {
            warn!("No config directory ({}), using defaults", e);
            ClientConfig::default()
        }
    };

    if let Ok(base_url) = env::var("TREINO_BASE_URL") {
        config.base_url = ClientConfig::with_base_url(&base_url)
            .context("TREINO_BASE_URL is not a valid URL")?
            .base_url;
    }

    Ok(config)
}

async fn ensure_session(api: &TreinoApi) -> anyhow::Result<()> {
    if api.restore_session().await {
        return Ok(());
    }

    let (Ok(login), Ok(password)) = (env::var("TREINO_LOGIN"), env::var("TREINO_PASSWORD")) else {
        bail!("No stored session; set TREINO_LOGIN and TREINO_PASSWORD to sign in");
    };

    let user = api.sign_in(&login, &password).await.context("Sign-in failed")?;
    info!(name = %user.name, "Session started");
    Ok(())
}

async fn run(api: &TreinoApi, command: Command) -> anyhow::Result<Option<Value>> {
    let output = match command {
        Command::SignOut => {
            api.sign_out().await?;
            return Ok(None);
        }
        Command::Students => serde_json::to_value(api.list_students().await?)?,
        Command::Student(id) => serde_json::to_value(api.find_student(&id).await?)?,
        Command::Sheets(id) => serde_json::to_value(api.list_training_sheets(&id).await?)?,
    };
    Ok(Some(output))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let command = Command::parse(env::args().skip(1))?;
    let config = load_config()?;

    let storage_dir =
        FileCredentialStore::default_storage_dir().context("No home directory for credentials")?;
    let store = FileCredentialStore::new(storage_dir)
        .await
        .context("Failed to open credential store")?;

    let client = AuthenticatingHttpClient::new(config, Arc::new(store))?;
    let api = TreinoApi::new(client);

    if matches!(command, Command::SignOut) {
        run(&api, command).await?;
        return Ok(());
    }

    let monitor = Arc::new(SessionMonitor::new());
    let handle = api.client().register_session_handlers(monitor.clone())?;

    let result = async {
        ensure_session(&api).await?;
        run(&api, command).await
    }
    .await;
    handle.unregister();

    if api.forget_ended_session(&monitor).await? {
        warn!("Stored session removed, sign in again with TREINO_LOGIN and TREINO_PASSWORD");
    }

    if let Some(output) = result? {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}
