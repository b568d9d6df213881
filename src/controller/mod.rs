use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::helpers::handler_404::page_not_found_handler;
use crate::repositories::places_export_repo::PlacesExportRepo;
use crate::services::place_cache::PlaceQueryService;

pub mod health_check;
pub mod nearby_places_controller;

#[derive(Clone)]
pub struct AppState {
    pub place_service: Arc<PlaceQueryService>,
    pub export_repo: Option<Arc<PlacesExportRepo>>,
}

pub async fn serve(app_state: AppState, config: &Config) -> anyhow::Result<()> {
    let origins: Vec<HeaderValue> = config
        .origin_urls
        .split(',')
        .map(|s| s.parse().unwrap())
        .collect::<Vec<HeaderValue>>();

    let application = router_endpoints(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_methods([Method::GET, Method::OPTIONS])
                        .allow_origin(origins)
                        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                )
        )
        .fallback(page_not_found_handler);

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("API server listening on: {}", address);
    axum::Server::bind(&address)
        .serve(application.into_make_service())
        .await
        .context("Error spinning up the API server")
}

pub fn router_endpoints(app_state: AppState) -> Router {
    health_check::router().nest("/places", nearby_places_controller::router(app_state))
}
