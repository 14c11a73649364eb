//! Veil relay binary.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default local port; share the printed connection string
//! veil-relay
//!
//! # Custom port and faster cover traffic
//! veil-relay --bind 127.0.0.1:9000 --dummy-interval-secs 10
//! ```

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use veil_channel::{LoopbackRendezvous, ObfuscationConfig, Rendezvous};
use veil_crypto::{KeyMaterial, token};
use veil_proto::ConnectionString;
use veil_relay::{Relay, RelayConfig};

/// Veil relay server
#[derive(Parser, Debug)]
#[command(name = "veil-relay")]
#[command(about = "Encrypted chat relay with traffic-analysis resistance")]
#[command(version)]
struct Args {
    /// Local address to bind (the rendezvous layer forwards to it)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Minimum spacing between paced sends, in milliseconds
    #[arg(long, default_value = "500")]
    min_delay_ms: u64,

    /// Maximum random send delay, in milliseconds
    #[arg(long, default_value = "1500")]
    max_delay_ms: u64,

    /// Base interval between cover-traffic messages, in seconds
    #[arg(long, default_value = "30")]
    dummy_interval_secs: u64,

    /// Random jitter on the cover-traffic interval, in seconds
    #[arg(long, default_value = "30")]
    dummy_jitter_secs: u64,

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

    tracing::info!("veil relay starting");

    let config = RelayConfig {
        bind_address: args.bind,
        obfuscation: ObfuscationConfig {
            min_delay: Duration::from_millis(args.min_delay_ms),
            max_delay: Duration::from_millis(args.max_delay_ms),
            dummy_interval: Duration::from_secs(args.dummy_interval_secs),
            dummy_jitter: Duration::from_secs(args.dummy_jitter_secs),
        },
    };

    let material = KeyMaterial::generate();
    let connection_token = token::encode(&material);

    let relay = Relay::bind(config, material).await?;
    let local = relay.local_addr()?;

    // The rendezvous collaborator supplies the shareable address; the
    // loopback stand-in just echoes the local listener
    let rendezvous = LoopbackRendezvous;
    let address = rendezvous.create_listener(local.port()).await?;

    let credential = ConnectionString::new(address, connection_token);
    tracing::info!("share this connection string: {credential}");

    relay.run().await?;

    Ok(())
}
