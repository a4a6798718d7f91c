//! Example: drive the full job flow against scripted mocks.
//!
//! Run with: `cargo run --example mock_analysis`

use heat_analysis_client::stream::MockEventSource;
use heat_analysis_client::transport::{Method, MockReply, MockTransport};
use heat_analysis_client::{
    AnalysisClient, AnalysisOrchestrator, AnalysisParameters, ClientConfig, LogEvent,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The service answers the probe, refuses the first submission, then accepts.
    let transport = MockTransport::new()
        .route(
            Method::Get,
            "/health",
            vec![MockReply::json(200, json!({"status": "healthy"}))],
        )
        .route(
            Method::Post,
            "/analyze",
            vec![
                MockReply::json(503, json!({"error": "Google Earth Engine not initialized"})),
                MockReply::json(202, json!({"sessionId": "abc123", "status": "started"})),
            ],
        );

    let events = MockEventSource::new([
        r#"{"log":"Fetching data"}"#,
        r#"{"log":"Computing indices"}"#,
        r#"{"status":"completed","result":{"success":true,"hotspotsFound":42,"clusters":2,
            "priorityZones":[{"id":1,"lat":29.52,"lon":74.99,"temp":44.1}]}}"#,
    ]);

    let client = AnalysisClient::with_parts(
        ClientConfig::default(),
        Arc::new(transport),
        Arc::new(events),
    );
    let orchestrator = AnalysisOrchestrator::new(client);

    let params = AnalysisParameters {
        latitude: 29.52,
        longitude: 74.99,
        ..Default::default()
    };
    let result = orchestrator
        .run(&params, &mut |log: LogEvent| println!("log: {}", log.message))
        .await?;

    println!("Hotspots found: {}", result.hotspots_found);
    println!("Priority zones: {}", result.priority_zones.len());

    // Invalid input never reaches the mocks.
    let bad = AnalysisParameters {
        start_date: "2025-08-30".into(),
        end_date: "2025-05-29".into(),
        ..Default::default()
    };
    if let Err(e) = orchestrator.run(&bad, &mut |_: LogEvent| {}).await {
        println!("Rejected ({:?}): {}", e.kind(), e);
    }

    Ok(())
}
