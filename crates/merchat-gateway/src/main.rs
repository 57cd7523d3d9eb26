use std::net::SocketAddr;
use std::sync::Arc;

use merchat_agent::{AgentAdapter, AgentClient};
use merchat_core::config::MerchatConfig;
use merchat_platform::{FixtureLoginProvider, PlatformClient, RetryPolicy};
use merchat_store::CredentialStore;
use merchat_supervisor::{Supervisor, SupervisorConfig};
use tracing::{info, warn};

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "merchat_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("MERCHAT_CONFIG").ok();
    let config = MerchatConfig::load(config_path.as_deref())?;

    let store = Arc::new(CredentialStore::open(&config.database.path)?);
    seed_keywords_for_known_channels(&store);

    // The real browser-automation login subsystem is out of scope (§1
    // Non-goals); `LoginProvider` is the seam it plugs into.
    let login = Arc::new(FixtureLoginProvider);
    let retry = RetryPolicy::default();
    let platform = Arc::new(PlatformClient::new(config.platform.http_base_url.clone(), store.clone(), login, retry));

    let agent_client = AgentClient::new(config.agent.endpoint.clone(), config.agent.token.clone(), config.agent.bot_id.clone());
    let agent = Arc::new(AgentAdapter::new(agent_client, store.clone()));

    let supervisor_config = SupervisorConfig::from_config(&config);
    let supervisor = Arc::new(Supervisor::new(store.clone(), platform.clone(), agent.clone(), supervisor_config));

    supervisor.start_all_eligible().await;

    let bind = config.admin.bind.clone();
    let port = config.admin.port;
    let state = Arc::new(app::AppState::new(config, store, supervisor.clone()));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("merchat gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let serve = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = serve.await {
        warn!(error = %e, "admin server exited with error");
    }

    supervisor.stop_all().await;
    Ok(())
}

/// Seeds the fixed default transfer-to-human keyword set (§4.8) for every
/// channel already present among stored accounts, so a restarted gateway
/// never runs with an empty keyword table for a channel it already serves.
fn seed_keywords_for_known_channels(store: &CredentialStore) {
    let accounts = match store.list_accounts(None) {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "failed to list accounts while seeding default keywords");
            return;
        }
    };
    let mut channels: Vec<&str> = accounts.iter().map(|a| a.channel.as_str()).collect();
    channels.sort_unstable();
    channels.dedup();
    for channel in channels {
        if let Err(e) = store.seed_default_keywords(channel) {
            warn!(error = %e, channel, "failed to seed default keywords");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sig.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
