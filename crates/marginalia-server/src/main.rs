//! # marginalia-server
//!
//! Presence & real-time delivery server for the Marginalia application.
//!
//! This binary provides:
//! - **REST API** (axum) for chats, notifications, and the thought actions
//!   that trigger them
//! - **WebSocket gateway** through which clients announce presence, receive
//!   pushed messages and notifications, and send chat messages
//! - **Presence registry** mapping user identity to live sessions, so pushes
//!   reach online recipients without broadcasting
//! - **Delivery router** enforcing the persist-then-push policy

mod api;
mod auth;
mod config;
mod delivery;
mod error;
mod presence;
mod ws;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use marginalia_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::delivery::{Db, DeliveryRouter};
use crate::presence::{InMemoryPresence, Presence};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,marginalia_server=debug")),
        )
        .init();

    info!("Starting Marginalia server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Store (creates the database and runs migrations if needed)
    let database = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let db: Db = Arc::new(Mutex::new(database));

    // Presence registry, scoped to this serving node
    let presence: Arc<dyn Presence> = Arc::new(InMemoryPresence::new());

    // Delivery router: persist first, push to whoever is online
    let router = Arc::new(DeliveryRouter::new(db.clone(), presence.clone()));

    let http_addr = config.http_addr;
    let state = AppState {
        db,
        presence,
        router,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP/WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
