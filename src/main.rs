//! Volumio Speakers Bridge
//!
//! Exposes every Volumio multiroom zone as a smart speaker accessory.

use volumio_speakers_bridge::accessory::BusHost;
use volumio_speakers_bridge::adapters::mqtt::MqttAdapter;
use volumio_speakers_bridge::adapters::socketio::SocketIoConnector;
use volumio_speakers_bridge::bridge::Bridge;
use volumio_speakers_bridge::bus::{self, BusEvent};
use volumio_speakers_bridge::config;

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volumio_speakers_bridge=debug,rumqttc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Volumio Speakers Bridge v{} ({})",
        env!("VSB_VERSION"),
        env!("VSB_GIT_SHA")
    );

    // Load configuration
    let config = config::load_config()?;
    match config.server_url() {
        Some(url) => tracing::info!("Configuration loaded, server: {}:{}", url, config.server_port),
        None => tracing::error!(
            "serverURL not set in config; zone discovery is disabled (set VSB_SERVER_URL or serverURL in {})",
            config::get_config_dir().join("config.toml").display()
        ),
    }

    // Create event bus
    let bus = bus::create_bus();
    tracing::info!("Event bus initialized");

    // Initialize MQTT adapter
    let mqtt = Arc::new(MqttAdapter::new(bus.clone()));
    mqtt.configure(&config.mqtt).await;
    if mqtt.is_configured().await {
        if let Err(e) = mqtt.start().await {
            tracing::warn!("Failed to start MQTT adapter: {}", e);
        } else {
            tracing::info!("MQTT adapter started");
        }
    } else {
        tracing::info!("No MQTT broker configured, accessories are only published on the bus");
    }

    // Start the bridge loop
    let connector = Arc::new(SocketIoConnector::new(config.reconnect.policy()));
    let bridge = Bridge::new(
        config.bridge_options(),
        connector,
        bus.clone(),
        Box::new(BusHost::new(bus.clone())),
    );
    let shutdown = CancellationToken::new();
    let bridge_task = tokio::spawn(bridge.run(shutdown.clone()));

    shutdown_signal().await;

    // Cleanup
    tracing::info!("Shutting down...");
    bus.publish(BusEvent::ShuttingDown {
        reason: Some("signal".to_string()),
    });
    shutdown.cancel();
    if let Err(e) = bridge_task.await {
        tracing::error!("Bridge task failed: {}", e);
    }
    mqtt.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
