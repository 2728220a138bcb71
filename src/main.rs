use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use linkgate::adapters::broker::{BrokerClientConfig, BrokerExchangeClient};
use linkgate::adapters::http::{build_router, IdentityAppState};
use linkgate::adapters::postgres::{self, PostgresAccountReader, PostgresUnitOfWork};
use linkgate::adapters::providers::registry_from_config;
use linkgate::application::{AuthenticateHandler, LoginHandler, PrincipalPolicy, TokenIssuer};
use linkgate::config::AppConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("linkgate: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config);

    let addr = config.server.socket_addr()?;
    tracing::info!(
        addr = %addr,
        environment = ?config.server.environment,
        database = %config.database.redacted_url(),
        "Starting linkgate"
    );

    let pool = postgres::connect(&config.database).await?;
    if config.database.run_migrations {
        postgres::migrate(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let exchange = BrokerExchangeClient::new(
        BrokerClientConfig::new(
            config.broker.internal_url.clone(),
            config.broker.secret.expose_secret().clone(),
        )
        .with_timeout(config.broker.exchange_timeout()),
    )?;
    let providers = registry_from_config(&config.providers)?;
    tracing::info!(providers = ?providers.enabled(), "Providers enabled");

    let authenticate = AuthenticateHandler::new(
        Arc::new(PostgresUnitOfWork::new(pool.clone())),
        Arc::new(exchange),
        providers,
        PrincipalPolicy::new(),
        TokenIssuer::with_ttl_secs(config.session.token_ttl_secs),
    );
    let login = LoginHandler::new(Arc::new(authenticate), &config.broker.external_url)?;
    let state = IdentityAppState::new(Arc::new(login), Arc::new(PostgresAccountReader::new(pool)));

    let app = build_router(state, &config.server);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if config.is_production() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
