//! Example: run one analysis against a live service.
//!
//! Run with: `cargo run --example run_analysis -- [LAT LON]`
//!
//! The service root is read from `HEAT_ANALYSIS_API_URL` and defaults to
//! `http://localhost:5000/api`. Set `RUST_LOG=heat_analysis_client=debug`
//! to watch retries and stream transitions.

use anyhow::Context;
use heat_analysis_client::{
    AnalysisClient, AnalysisOrchestrator, AnalysisParameters, ClientConfig, Geocoder,
    HistoryRecord, HistoryStore, JsonFileHistoryStore, LogEvent,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env();
    let client = AnalysisClient::new(config.clone())?;

    if !client.health_check().await {
        anyhow::bail!("analysis service at {} is not reachable", config.base_url);
    }

    let mut params = client
        .fetch_default_parameters()
        .await
        .unwrap_or_else(|_| AnalysisParameters::default());
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [lat, lon] = args.as_slice() {
        params.latitude = lat.parse().context("latitude must be a number")?;
        params.longitude = lon.parse().context("longitude must be a number")?;
    }

    let location = Geocoder::new(&config)?
        .reverse(params.latitude, params.longitude)
        .await;
    println!(
        "Analyzing {} ({:.4}, {:.4}) from {} to {}",
        location.full_name, params.latitude, params.longitude, params.start_date, params.end_date
    );

    let orchestrator = AnalysisOrchestrator::new(client.clone());
    let result = orchestrator
        .run(&params, &mut |log: LogEvent| {
            println!("[{}] {}", log.timestamp.format("%H:%M:%S"), log.message)
        })
        .await?;

    println!();
    println!("Hotspots found: {}", result.hotspots_found);
    println!("Clusters:       {}", result.clusters);
    if let (Some(min), Some(avg), Some(max)) = (
        result.min_temperature,
        result.avg_temperature,
        result.max_temperature,
    ) {
        println!("Temperature:    {:.1}°C min, {:.1}°C avg, {:.1}°C max", min, avg, max);
    }
    for zone in &result.priority_zones {
        println!(
            "  zone {}: ({:.4}, {:.4}) {}",
            zone.id,
            zone.lat,
            zone.lon,
            zone.temp.map(|t| format!("{:.1}°C", t)).unwrap_or_default()
        );
    }

    if let Some(name) = result.map_file_name.as_deref() {
        let path = client.save_map(name, std::env::temp_dir()).await?;
        println!("Map saved to {}", path.display());
    }

    let history = JsonFileHistoryStore::new(std::env::temp_dir().join("heat-analysis-history.json"));
    history
        .save(HistoryRecord::new(params, result, Some(location)))
        .await?;
    println!("{} analyses in history", history.list().await?.len());

    Ok(())
}
