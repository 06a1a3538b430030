use anyhow::Context;
use onionoo_client::{Client, NodeType, QueryOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PAGE_SIZE: u64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = Client::from_env().context("failed to build client")?;
    info!("Fetching relay summaries from {}", client.config().base_url);

    let options = QueryOptions::new()
        .with_type(NodeType::Relay)
        .with_running(true)
        .with_limit(PAGE_SIZE);
    let response = client
        .get_summary(&options)
        .await
        .context("failed to fetch summary document")?;

    info!(
        "Onionoo {} (relays published {})",
        response.envelope.version, response.envelope.relays_published
    );
    for relay in response.relays.iter().filter_map(|r| r.as_summary()) {
        println!("{} {}", relay.fingerprint, relay.nickname);
    }

    Ok(())
}
