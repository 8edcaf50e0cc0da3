use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Store;
use common::billing::HttpBillingProvider;
use common::cli::{CommonArgs, CommonCommands, utils};
use common::identity::HttpIdentityProvider;
use router::{AppState, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Parser)]
#[command(name = "gatherly")]
#[command(about = "Gatherly account service - account deletion and lifecycle HTTP API")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<GatherlyCommands>,
}

#[derive(Subcommand)]
enum GatherlyCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for GatherlyCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    // Load application configuration
    let config = utils::load_config(cli.common.config.as_ref())?;

    // Handle common commands that don't require starting the service
    let command = cli.command.unwrap_or_default();
    let GatherlyCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config).await? {
        return Ok(()); // Command handled, exit early
    }

    log::info!("Starting Gatherly account service");
    log::info!("  Database DSN: {}", config.database.dsn);
    log::info!("  Storage DSN: {}", config.storage.dsn);
    log::info!("  Identity provider: {}", config.identity.base_url);
    log::info!("  Billing provider: {}", config.billing.base_url);

    let listen_addr = config
        .server
        .listen_addr
        .parse::<SocketAddr>()
        .context("Invalid listen address")?;

    // Connect the four backends the deletion flow coordinates
    let store = Store::new(&config.database.dsn)
        .await
        .context("Failed to connect to account database")?;

    let object_store = common::storage::create_object_store(&config.storage)
        .context("Failed to initialize media object store")?;

    let identity = Arc::new(
        HttpIdentityProvider::new(&config.identity)
            .context("Failed to initialize identity provider client")?,
    );

    let billing = Arc::new(
        HttpBillingProvider::new(&config.billing)
            .context("Failed to initialize billing provider client")?,
    );

    let state = AppState::new(store, object_store, billing, identity, &config);

    // Start HTTP API
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {listen_addr}"))?;

    let (http_shutdown_tx, http_shutdown_rx) = oneshot::channel::<()>();
    let http_handle = tokio::spawn(async move {
        log::info!("HTTP API server listening on {listen_addr}");
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                http_shutdown_rx.await.ok();
                log::info!("HTTP API shutting down gracefully");
            })
            .await
            .expect("HTTP server error");
    });

    // Wait for ctrl+c
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c signal")?;

    log::info!("Shutting down Gatherly account service...");

    // Signal HTTP server to shutdown gracefully
    let _ = http_shutdown_tx.send(());

    // Wait for the server to stop
    let _ = http_handle.await;

    log::info!("Gatherly account service stopped gracefully");

    Ok(())
}
