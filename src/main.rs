use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use chat_hub::{
    config::Config,
    identity::JwtProvider,
    routes,
    state::AppState,
    store::SqliteStore,
    utils::jwt,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::parse();
    cfg.validate()?;

    if let Some(subject) = &cfg.issue_token {
        println!("{}", jwt::sign(subject, cfg.jwt_secret.as_bytes())?);
        return Ok(());
    }

    init_tracing(cfg.json_logs);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "chat hub starting");

    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening {}", cfg.database_url))?;

    let state = AppState::new(
        Arc::new(store),
        Arc::new(JwtProvider::new(cfg.jwt_secret.as_bytes())),
        cfg.join_timeout(),
    )
    .with_internal_key(cfg.internal_key.clone())
    .with_ping_interval(cfg.ping_interval())
    .with_pong_timeout(cfg.pong_timeout());

    if state.internal_key.is_none() {
        tracing::warn!("HUB_INTERNAL_KEY unset, internal emit/notify endpoints disabled");
    }

    let app = routes::app(state.clone(), cfg.body_limit);
    let listener = tokio::net::TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    tracing::info!(addr = %cfg.bind, "listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("chat hub stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chat_hub=info,tower_http=info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");

    // stop accepting fan-out before closing sockets
    if let Some(hub) = state.realtime.detach() {
        hub.shutdown();
    }
}
