//! Accolade - student achievement reporting backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accolade::{
    config::Args,
    content::{ContentStore, MemoryContentStore, MongoContentStore},
    db::{Database, MongoClient},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("accolade={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Accolade - Achievement Reporting");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Database: {}", args.database_url);
    info!("MongoDB database: {}", args.mongodb_db);
    info!("Uploads: {}", args.upload_dir.display());
    info!("======================================");

    let db = Database::connect(&args.database_url, &args.pool_settings())?;

    // MongoDB holds achievement content; dev mode may run without it
    let (content, backend): (Arc<dyn ContentStore>, &'static str) =
        match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => {
                info!("MongoDB connected successfully");
                (Arc::new(MongoContentStore::new(&client).await?), "mongodb")
            }
            Err(e) => {
                if args.dev_mode {
                    warn!(
                        "MongoDB connection failed (dev mode, using in-memory content store): {}",
                        e
                    );
                    (Arc::new(MemoryContentStore::new()), "memory")
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };

    let state = server::AppState::new(args, db, content, backend).await?;
    state.bootstrap().await?;

    server::run(Arc::new(state)).await?;

    Ok(())
}
