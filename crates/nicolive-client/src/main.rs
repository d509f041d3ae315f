//! Headless demo entry point.
//!
//! Loads the session descriptor from a TOML file (first CLI argument,
//! default `nicolive.toml`), connects to the comment server, and logs the
//! comment stream until Ctrl-C or the broadcast ends.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nicolive_client::config::load_config;
use nicolive_client::connection::CommentClient;
use nicolive_client::events::ChatEvent;
use nicolive_client::postkey::HttpPostKeySource;
use nicolive_client::session::LiveSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "nicolive.toml".to_string());
    let config = load_config(Path::new(&config_path))
        .with_context(|| format!("loading configuration from {config_path}"))?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.client.log_level.clone())),
        )
        .init();

    info!(
        broadcast = %config.session.broadcast_id,
        addr = %config.session.addr,
        port = config.session.port,
        "connecting to comment server"
    );

    let cookie = config.session.cookie.clone();
    let session = Arc::new(LiveSession::new(config.session));
    let post_key_source = Arc::new(HttpPostKeySource::with_endpoint(
        config.client.postkey_endpoint.clone(),
        cookie,
    ));
    let client = CommentClient::with_post_key_source(session, post_key_source);

    let mut events = client.subscribe();
    client.connect(config.client.connect_options()).await?;
    info!("connected; streaming comments (Ctrl-C to quit)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                Ok(ChatEvent::CommentReceived(comment)) => {
                    info!(user = ?comment.user.id, vpos = comment.vpos, "{}", comment.text);
                }
                Ok(ChatEvent::FirstResponseProcessed(batch)) => {
                    info!("received {} backlog comments", batch.len());
                }
                Ok(ChatEvent::BroadcastEnded) => {
                    info!("broadcast ended by the distributor");
                    break;
                }
                Ok(ChatEvent::ConnectionClosed) => {
                    info!("connection closed");
                    break;
                }
                Ok(ChatEvent::SocketError(error)) => {
                    warn!("socket error: {error}");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event stream lagged; skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    client.dispose().await;
    Ok(())
}
