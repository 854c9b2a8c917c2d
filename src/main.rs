use std::error::Error;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agency_notify::adapters::http::app_router;
use agency_notify::adapters::{
    AesGcmCredentialCodec, ChannelRouter, InMemoryNotificationStore, NotificationSocketState,
    PostgresNotificationStore, RedisChannelRelay,
};
use agency_notify::application::{EventDispatcher, IdentityResolver};
use agency_notify::config::{AppConfig, DatabaseConfig};
use agency_notify::ports::{ChannelRelay, NotificationStore, ServerId};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let addr = config.server.socket_addr()?;
    let store = connect_store(&config.database).await?;

    let codec = AesGcmCredentialCodec::new(&config.handshake.encryption_key)?;
    let resolver = Arc::new(IdentityResolver::new(Arc::new(codec)));
    let router = Arc::new(ChannelRouter::new(config.notifications.channel_capacity));

    let mut dispatcher = EventDispatcher::new(store, router.clone(), config.dispatch_config());
    let mut relay_listener = None;
    if let Some(url) = config.redis.relay_url() {
        let relay = RedisChannelRelay::connect(url, ServerId::from_env(config.server.port)).await?;
        relay_listener = Some(relay.spawn_listener(router.clone()));
        tracing::info!(server_id = %relay.server_id(), "Redis relay enabled");
        dispatcher = dispatcher.with_relay(Arc::new(relay));
    }

    let state = NotificationSocketState::new(resolver, Arc::new(dispatcher), router)
        .with_outbound_buffer(config.notifications.outbound_buffer);
    let app = app_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "Listening on {} (socket path {})",
        addr,
        config.server.ws_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(listener) = relay_listener {
        listener.abort();
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn NotificationStore>, Box<dyn Error>> {
    if config.is_in_memory() {
        tracing::warn!("Using in-memory notification store; notifications are lost on restart");
        return Ok(Arc::new(InMemoryNotificationStore::new()));
    }

    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .connect(&config.url)
        .await?;
    tracing::info!("Database pool established");

    let store = PostgresNotificationStore::new(pool);
    if config.run_migrations {
        store.migrate().await?;
        tracing::info!("Migrations applied");
    }
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
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
}
