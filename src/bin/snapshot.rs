/// Matchday Hub - one-shot snapshot
///
/// Runs a single aggregation cycle and prints the response as pretty JSON.
/// Arguments are the same query keys the server takes:
///
///   cargo run --bin matchday-snapshot -- sort=time status=live includeUpcoming=1
///
/// A leading `?` or one `&`-joined argument works too.

use anyhow::{Context, Result};
use dotenv::dotenv;
use match_aggregator::{Aggregator, EventQuery, HubConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // stdout is reserved for the JSON
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let raw_query = std::env::args().skip(1).collect::<Vec<_>>().join("&");
    let query = EventQuery::from_query(&raw_query);
    info!("snapshot query: {:?}", query);

    let aggregator = Aggregator::new(HubConfig::from_env()).context("aggregator init")?;
    let resp = aggregator.aggregate(&query).await.context("aggregation failed")?;

    info!(
        "snapshot: {} events, {} market configs, {} competitions",
        resp.data.len(),
        resp.market_config.len(),
        resp.competition_names.len()
    );
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}
