//! Ridelink realtime client.
//!
//! Connects to the ride events endpoint, logs every lifecycle and domain
//! event, and disconnects cleanly on Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Rider against a local backend
//! RIDELINK_TOKEN=... ridelink --user-id u1 --role rider
//!
//! # Driver, reporting availability once connected
//! ridelink --url wss://api.example.com/ws/rides/ --token ... \
//!     --user-id d7 --role driver --driver-status online
//! ```

use std::time::Duration;

use clap::Parser;
use ridelink_client::Runtime;
use ridelink_core::{Listener, ManagerConfig, Role, SharedToken};
use ridelink_proto::{DriverStatus, Endpoint, EventKind, endpoint::DEFAULT_ENDPOINT};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Ridelink realtime client
#[derive(Parser, Debug)]
#[command(name = "ridelink")]
#[command(about = "Ride-hailing realtime channel client")]
#[command(version)]
struct Args {
    /// Websocket endpoint; the token is appended as a query parameter
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    url: Endpoint,

    /// Bearer token
    #[arg(long, env = "RIDELINK_TOKEN", hide_env_values = true)]
    token: String,

    /// User id to report
    #[arg(long)]
    user_id: String,

    /// Account role (rider, driver)
    #[arg(long, default_value = "rider")]
    role: Role,

    /// Availability to announce after connecting (drivers only)
    #[arg(long)]
    driver_status: Option<DriverStatus>,

    /// Heartbeat interval in milliseconds
    #[arg(long, default_value = "30000")]
    heartbeat_ms: u64,

    /// Base reconnect delay in milliseconds
    #[arg(long, default_value = "2000")]
    reconnect_delay_ms: u64,

    /// Reconnect attempts before giving up
    #[arg(long, default_value = "5")]
    max_attempts: u32,

    /// Opening handshake timeout in milliseconds
    #[arg(long, default_value = "10000")]
    connect_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ManagerConfig {
        endpoint: args.url,
        heartbeat_interval: Duration::from_millis(args.heartbeat_ms),
        reconnect_base_delay: Duration::from_millis(args.reconnect_delay_ms),
        max_reconnect_attempts: args.max_attempts,
        connection_timeout: Duration::from_millis(args.connect_timeout_ms),
        ..ManagerConfig::default()
    };

    tracing::info!(endpoint = %config.endpoint, "ridelink client starting");

    let token = SharedToken::new(args.token);
    let (runtime, handle) = Runtime::websocket(config, token)?;
    let task = runtime.spawn();

    for kind in EventKind::LIFECYCLE.into_iter().chain(EventKind::DOMAIN) {
        let listener = Listener::new(move |payload| {
            tracing::info!(event = %kind, %payload, "event");
        });
        handle.add_event_listener(kind, listener).await?;
    }

    if let Some(status) = args.driver_status {
        let announce = handle.clone();
        let listener = Listener::new(move |_| {
            let announce = announce.clone();
            tokio::spawn(async move {
                if !matches!(announce.update_driver_status(status).await, Ok(true)) {
                    tracing::warn!(%status, "driver status not sent");
                }
            });
        });
        handle.add_event_listener(EventKind::Connect, listener).await?;
    }

    if !handle.initialize(args.user_id, args.role).await? {
        tracing::error!("could not start connection");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    handle.disconnect().await?;
    handle.shutdown().await?;
    task.await?;

    Ok(())
}
