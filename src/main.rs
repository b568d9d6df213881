use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenv::dotenv;
use crate::config::Config;
use crate::controller::AppState;
use crate::repositories::places_export_repo::PlacesExportRepo;
use crate::services::clock::SystemClock;
use crate::services::overpass_client::{HttpTransport, OverpassClient};
use crate::services::place_cache::PlaceQueryService;
use crate::services::ranking::CompletenessWeights;

pub mod config;
pub mod controller;
pub mod helpers;
pub mod models;
pub mod repositories;
pub mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::parse();

    let clock = Arc::new(SystemClock);
    let transport = Arc::new(HttpTransport::new(
        reqwest::Client::new(),
        config.overpass_url.clone(),
        Duration::from_secs(config.upstream_timeout_secs),
    ));
    let overpass_client = Arc::new(OverpassClient::new(
        transport,
        clock.clone(),
        config.upstream_retry_limit,
        Duration::from_secs(config.upstream_backoff_secs),
        config.upstream_timeout_secs,
    ));
    let place_service = Arc::new(PlaceQueryService::new(
        overpass_client,
        clock,
        Duration::from_secs(config.cache_ttl_secs),
        config.location_tolerance_meters,
        CompletenessWeights::default(),
    ));
    let export_repo = config
        .places_export_path
        .as_ref()
        .map(|path| Arc::new(PlacesExportRepo::new(PathBuf::from(path))));

    let app_state = AppState {
        place_service,
        export_repo,
    };

    controller::serve(app_state, &config).await
}
