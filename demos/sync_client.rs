//! Blocking-mode client example
//!
//! Connects, subscribes to a topic, publishes one message to it and prints
//! what comes back. Each step waits for its outcome before the next starts.
//!
//! Run with: cargo run --example sync_client --features logging
//!
//! Requires: a broker at `BROKER_URI` (default `tcp://broker.emqx.io:1883`).
//! Use `BROKER_URI=memory://` to run without a network.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use mom_mqtt::{ConnectOptions, QoS, SyncClient};

const TOPIC: &str = "mom-mqtt/demo/sync";

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let broker = std::env::var("BROKER_URI").unwrap_or_else(|_| "tcp://broker.emqx.io:1883".into());

    let mut client = SyncClient::new();
    client.init(&broker, "")?;

    let (tx, mut inbox) = mpsc::unbounded_channel();
    client.set_callback(move |topic: &str, payload: &str| {
        let _ = tx.send(format!("{topic}: {payload}"));
    })?;

    // ---
    // Connect and wait for the broker's answer
    let options = ConnectOptions::default()
        .with_keep_alive_secs(20)
        .with_connect_timeout_secs(10);
    client.connect(&options).await?;
    println!("connected as {}", client.client_id().unwrap_or("?"));

    client.subscribe(TOPIC, QoS::AtLeastOnce).await?;
    client
        .publish(TOPIC, "hello from the blocking client", QoS::AtLeastOnce)
        .await?;

    match tokio::time::timeout(Duration::from_secs(5), inbox.recv()).await {
        Ok(Some(message)) => println!("received {message}"),
        _ => println!("no message within 5s"),
    }

    client.disconnect(Duration::from_secs(10)).await?;
    client.destroy();

    Ok(())
}
