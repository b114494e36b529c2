//! Hearth Client - developer smoke tool
//!
//! Connects with credentials from the environment, follows the user's
//! notification topic and logs connection events until Ctrl-C.

use anyhow::{Context, Result};
use hearth_client::{
    ConnectionEvent, ConnectionManager, ConnectionState, Credentials, RealtimeConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hearth_client=debug")),
        )
        .init();

    let config = RealtimeConfig::from_env().context("invalid realtime configuration")?;
    let credentials = Credentials::from_env()
        .context("HEARTH_TOKEN and HEARTH_USER_ID must be set")?;

    tracing::info!(endpoint = %config.endpoint, transport = ?config.transport, "starting");

    let manager = ConnectionManager::with_websocket(config)?;
    let mut events = manager.events();
    manager.set_credentials(Some(credentials));
    manager.connect()?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    ConnectionEvent::StateChanged(ConnectionState::Connected) => {
                        if !manager.subscription_ids().contains(&"notifications".to_string()) {
                            manager.subscribe_notifications(|notification| {
                                tracing::info!(
                                    id = notification.id,
                                    kind = %notification.kind,
                                    "notification: {}",
                                    notification.message
                                );
                            });
                        }
                    }
                    ConnectionEvent::StateChanged(ConnectionState::Terminated(reason)) => {
                        tracing::error!(?reason, "connection terminated");
                        break;
                    }
                    ConnectionEvent::StateChanged(state) => {
                        tracing::info!(?state, "state changed");
                    }
                    ConnectionEvent::ReconnectScheduled { attempt, delay } => {
                        tracing::info!(attempt, ?delay, "reconnecting");
                    }
                    ConnectionEvent::AuthenticationFailed { reason } => {
                        tracing::error!("credentials rejected, log in again: {}", reason);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    manager.disconnect();
    Ok(())
}
