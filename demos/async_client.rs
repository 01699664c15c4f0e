//! Deferred-mode client example
//!
//! Starts a connect attempt and learns the outcome from a result handler,
//! then echoes every message on a wildcard subscription for a few seconds.
//!
//! Run with: cargo run --example async_client --features logging
//!
//! Requires: a broker at `BROKER_URI` (default `tcp://broker.emqx.io:1883`).

use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use mom_mqtt::{AsyncClient, ConnectOptions, ConnectStatus, QoS};

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let broker = std::env::var("BROKER_URI").unwrap_or_else(|_| "tcp://broker.emqx.io:1883".into());

    let mut client = AsyncClient::new();
    client.init(&broker, "mom-mqtt-async-demo")?;

    client.set_callback(|topic: &str, payload: &str| {
        println!("[{topic}] {payload}");
    })?;

    // ---
    // Start the attempt; the handler fires once from the engine task
    let (tx, rx) = oneshot::channel();
    client
        .connect(
            &ConnectOptions::default().with_connect_timeout_secs(10),
            move |status: ConnectStatus| {
                let _ = tx.send(status);
            },
        )
        .await?;

    let status = rx.await?;
    println!("connect result: {} ({status:?})", status.code());
    if !status.is_success() {
        bail!("broker refused the connection");
    }

    client.subscribe("mom-mqtt/demo/#", QoS::AtMostOnce).await?;

    for i in 0..3 {
        client
            .publish(
                &format!("mom-mqtt/demo/async/{i}"),
                &format!("tick {i}"),
                QoS::AtMostOnce,
            )
            .await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    client.disconnect().await?;
    Ok(())
}
