//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run the update loop.
//! No business logic here; sign-in is delegated to AuthService.

use dotenv::dotenv;
use mentions_bot::adapters::persistence::{MemoryRepo, SqliteRepo};
use mentions_bot::adapters::telegram::session::open_bot_session;
use mentions_bot::adapters::telegram::{
    GrammersAuthAdapter, GrammersChatGateway, GrammersUpdateLoop, PeerCache,
};
use mentions_bot::ports::{AuthPort, ChatGateway, InputPort, Repository};
use mentions_bot::shared::config::{AppConfig, StorageKind};
use mentions_bot::usecases::{AuthService, Dispatcher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().map_err(|e| anyhow::anyhow!("config: {e}"))?;
    if !cfg.is_telegram_configured() {
        anyhow::bail!(
            "Set MENTIONS_BOT_API_ID and MENTIONS_BOT_API_HASH (env or .env). Get them from https://my.telegram.org"
        );
    }
    let limits = cfg.limits();
    info!(?limits, storage = ?cfg.storage, "configuration loaded");

    // --- Storage ---
    let repo: Arc<dyn Repository> = match cfg.storage {
        StorageKind::Sqlite => {
            let data_path = PathBuf::from(cfg.data_dir_or_default());
            let sqlite_repo = SqliteRepo::connect(&data_path)
                .await
                .map_err(|e| anyhow::anyhow!("SQLite connect failed: {e}"))?;
            info!(path = %sqlite_repo.path().display(), "using SQLite storage");
            Arc::new(sqlite_repo)
        }
        StorageKind::Memory => {
            warn!("using in-memory storage; groups are lost on restart");
            Arc::new(MemoryRepo::new())
        }
    };

    // --- Telegram client (cloned for auth, gateway and updates; same session) ---
    let session = open_bot_session(cfg.session_path_or_default())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let pool = grammers_client::SenderPool::new(session, cfg.api_id.unwrap_or(0));
    let client = grammers_client::Client::new(pool.handle.clone());
    let updates = pool.updates;
    let runner = pool.runner;
    tokio::spawn(async move {
        runner.run().await;
    });

    let auth_adapter: Arc<dyn AuthPort> = Arc::new(GrammersAuthAdapter::new(client.clone()));
    let auth_service = AuthService::new(auth_adapter, cfg.api_hash.clone().unwrap_or_default());
    let bot_username = auth_service
        .sign_in_bot(
            cfg.bot_token.as_deref().unwrap_or_default(),
            cfg.bot_username.as_deref(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let peers = Arc::new(PeerCache::new());
    let gateway: Arc<dyn ChatGateway> =
        Arc::new(GrammersChatGateway::new(client.clone(), Arc::clone(&peers)));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&gateway),
        Arc::clone(&repo),
        limits,
        bot_username,
    ));
    if let Err(e) = dispatcher.register_commands().await {
        warn!(error = %e, "failed to register bot commands; continuing");
    }

    let update_stream = client
        .stream_updates(
            updates,
            grammers_client::client::UpdatesConfiguration {
                catch_up: false,
                ..Default::default()
            },
        )
        .await;
    let input_port: Arc<dyn InputPort> = Arc::new(GrammersUpdateLoop::new(
        update_stream,
        Arc::clone(&dispatcher),
        peers,
    ));

    // --- Run until Ctrl+C or the connection drops ---
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}
