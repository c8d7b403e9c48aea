use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cohort::api;
use cohort::config::{DatabaseConfig, ServeConfig};

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Group formation, membership and sprint lifecycle for team projects")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    serve: ServeConfig,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve(ServeConfig),
    /// Apply pending database migrations and exit
    Migrate(DatabaseConfig),
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "cohort=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config: ServeConfig) -> anyhow::Result<()> {
    let db = config.database.open()?;
    let app = api::create_router_with_config(db, config.security());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("cohort listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve(config)) => serve(config).await?,
        Some(Commands::Migrate(config)) => {
            config.open()?;
            tracing::info!("Database is up to date");
        }
        None => serve(cli.serve).await?,
    }

    Ok(())
}
