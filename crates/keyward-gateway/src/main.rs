//! Keyward Gateway - authentication service
//!
//! This is the main entry point for the service. Settings come from the
//! environment (see `keyward_gateway::config`).
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to keep accounts in memory instead of
//! the GraphQL backend. Mail is logged with its links instead of being sent,
//! unless `SMTP_HOST` is set.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keyward_accounts::{AccountManager, LogMailer, Mailer, SmtpMailer};
use keyward_auth::{JwtService, OAuthManager};
use keyward_gateway::{create_router, GatewayState, Settings};
#[cfg(not(feature = "dev-mode"))]
use keyward_store::GraphqlStore;
#[cfg(feature = "dev-mode")]
use keyward_store::MemoryStore;
use keyward_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keyward=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Keyward Gateway");

    let settings = Settings::from_env()?;
    tracing::info!(
        listen_addr = %settings.gateway.listen_addr,
        server_url = %settings.accounts.server_url,
        graphql_endpoint = %settings.graphql.endpoint,
        algorithm = ?settings.jwt.algorithm,
        "Configuration loaded"
    );

    #[cfg(feature = "dev-mode")]
    let store = {
        tracing::warn!("DEV MODE ENABLED - accounts are kept in memory");
        Arc::new(MemoryStore::new())
    };

    #[cfg(not(feature = "dev-mode"))]
    let store = Arc::new(GraphqlStore::new(&settings.graphql)?);

    serve(settings, store).await
}

async fn serve<S>(settings: Settings, store: Arc<S>) -> Result<(), Box<dyn std::error::Error>>
where
    S: Store + 'static,
{
    let mailer: Box<dyn Mailer> = match &settings.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP mailer configured");
            Box::new(SmtpMailer::new(smtp)?)
        }
        None => {
            tracing::warn!("No SMTP_HOST set - mail is logged, not sent");
            Box::new(LogMailer::new(cfg!(feature = "dev-mode")))
        }
    };

    let jwt = Arc::new(JwtService::new(settings.jwt)?);
    let jwks = jwt.jwks();
    tracing::info!(keys = jwks.keys.len(), "JWT signer initialized");

    let oauth = Arc::new(OAuthManager::new(settings.oauth)?);
    tracing::info!(
        providers = ?oauth.config().configured_providers(),
        "OAuth providers configured"
    );

    let accounts = Arc::new(AccountManager::new(
        store,
        Arc::new(mailer),
        Arc::clone(&jwt),
        settings.accounts,
    ));

    let listen_addr = settings.gateway.listen_addr.clone();
    let state = GatewayState::new(accounts, jwt, oauth, jwks, settings.gateway);
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
