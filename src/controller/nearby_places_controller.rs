use std::sync::Arc;

use axum::extract::Query;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::skip_serializing_none;
use tracing::warn;

use crate::controller::AppState;
use crate::helpers::chat_context;
use crate::models::place::{Coordinate, Place};
use crate::repositories::places_export_repo::PlacesExportRepo;
use crate::services::place_cache::PlaceQueryService;

// Hanoi city centre, the fallback viewport when the client sends nothing.
pub const DEFAULT_LAT: f64 = 21.028511;
pub const DEFAULT_LON: f64 = 105.804817;
pub const DEFAULT_RADIUS_METERS: u32 = 2000;
pub const DEFAULT_LIMIT: usize = 30;
pub const MAX_RADIUS_METERS: u32 = 5000;
pub const MAX_LIMIT: usize = 50;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(retrieve_nearby_places))
        .route("/context", get(retrieve_places_context))
        .route("/stats", get(retrieve_performance_stats))
        .route_layer(Extension(app_state.place_service))
        .route_layer(Extension(app_state.export_repo))
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct NearbyPlacesParam {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<u32>,
    pub limit: Option<usize>,
}

#[skip_serializing_none]
#[derive(Clone, Serialize, Debug)]
pub struct NearbyPlacesResponse {
    pub places: Vec<Place>,
    pub nearest: Option<Place>,
    pub most_informative: Option<Place>,
}

pub async fn retrieve_nearby_places(
    Extension(place_service): Extension<Arc<PlaceQueryService>>,
    Extension(export_repo): Extension<Option<Arc<PlacesExportRepo>>>,
    Query(query): Query<NearbyPlacesParam>,
) -> impl IntoResponse {
    let (origin, radius, limit) = match resolve_params(&query) {
        Ok(resolved) => resolved,
        Err(reason) => {
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    let places = place_service.query(origin, radius, limit).await;
    let recommendation = place_service.recommend(&places);

    if let Some(export_repo) = export_repo {
        let snapshot = places.clone();
        tokio::spawn(async move {
            if let Err(e) = export_repo.store_snapshot(snapshot).await {
                warn!("Something went wrong exporting places snapshot due to: {}", e);
            }
        });
    }

    let response = NearbyPlacesResponse {
        places,
        nearest: recommendation.nearest,
        most_informative: recommendation.most_informative,
    };

    (StatusCode::OK, json!(&response).to_string()).into_response()
}

/// Plain-text top-N block for the external chat collaborator.
pub async fn retrieve_places_context(
    Extension(place_service): Extension<Arc<PlaceQueryService>>,
    Query(query): Query<NearbyPlacesParam>,
) -> impl IntoResponse {
    let (origin, radius, limit) = match resolve_params(&query) {
        Ok(resolved) => resolved,
        Err(reason) => {
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    let places = place_service.query(origin, radius, limit).await;

    (StatusCode::OK, chat_context::places_context(&places, limit)).into_response()
}

pub async fn retrieve_performance_stats(
    Extension(place_service): Extension<Arc<PlaceQueryService>>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        json!(&place_service.stats_snapshot()).to_string(),
    )
        .into_response()
}

/// Applies defaults, rejects malformed input, clamps radius and limit to
/// their caps. The only hard failure a caller ever sees.
fn resolve_params(query: &NearbyPlacesParam) -> Result<(Coordinate, u32, usize), String> {
    let lat = query.lat.unwrap_or(DEFAULT_LAT);
    let lon = query.lon.unwrap_or(DEFAULT_LON);
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("Coordinates out of range: {}, {}", lat, lon));
    }

    let radius = query.radius.unwrap_or(DEFAULT_RADIUS_METERS);
    if radius == 0 {
        return Err("Radius must be positive".to_string());
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        return Err("Limit must be positive".to_string());
    }

    Ok((
        Coordinate { lat, lon },
        radius.min(MAX_RADIUS_METERS),
        limit.min(MAX_LIMIT),
    ))
}
