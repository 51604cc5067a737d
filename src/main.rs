//! Grievance portal binary
//!
//! Loads `.env`, parses configuration, connects storage, seeds the admin
//! account and serves HTTP until killed.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use grievance_portal::{auth::spawn_cleanup_task, config::Args, logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Grievance Portal backend");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} / {}", args.mongodb_uri, args.mongodb_db);
    info!("Evidence directory: {}", args.evidence_dir.display());
    info!("Session timeout: {} minutes", args.session_ttl_minutes);
    info!("Allowed origins: {}", args.allowed_origin_list().join(", "));
    info!("======================================");

    let state = Arc::new(server::AppState::connect(args.clone()).await?);

    if let Some((email, password)) = args.admin_seed() {
        state.accounts.seed_admin(email, password).await?;
    }

    spawn_cleanup_task(Arc::clone(&state.sessions));

    server::run(state).await?;
    Ok(())
}
