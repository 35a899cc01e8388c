//! API endpoint handlers

use std::str::FromStr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use reclaim_core::{Collection, InstantMatchRequest, MatchingError, SweepParams};

use crate::state::AppState;

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Engine error wrapped for transport
#[derive(Debug)]
pub struct ApiError(MatchingError);

impl From<MatchingError> for ApiError {
    fn from(err: MatchingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MatchingError::InvalidArgument(_) | MatchingError::EmbeddingGenerationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            MatchingError::NotFound(_) => StatusCode::NOT_FOUND,
            MatchingError::ModelUnavailable(_) | MatchingError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ============================================================================
// REQUEST BODIES
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantMatchBody {
    pub item_id: String,
    pub item_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub collection: String,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundMatchBody {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityBody {
    pub item1_id: String,
    pub item2_id: String,
    pub collection1: String,
    pub collection2: String,
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub limit: Option<usize>,
}

fn parse_collection(raw: &str) -> Result<Collection, ApiError> {
    Collection::from_str(raw).map_err(|msg| ApiError(MatchingError::InvalidArgument(msg)))
}

// ============================================================================
// HANDLERS
// ============================================================================

/// Process one item: generate embeddings, persist, and rank candidates
/// from the opposite collection
pub async fn instant_match(
    State(state): State<AppState>,
    Json(body): Json<InstantMatchBody>,
) -> Result<Json<Value>, ApiError> {
    let collection = parse_collection(&body.collection)?;
    let outcome = state
        .coordinator
        .instant_match(InstantMatchRequest {
            item_id: body.item_id,
            item_name: body.item_name,
            description: body.description,
            category: body.category,
            image_url: body.image_url,
            collection,
            threshold: body.threshold,
            max_results: body.max_results,
        })
        .await?;

    Ok(Json(json!(outcome)))
}

/// Run one background sweep over both collections
pub async fn background_match(
    State(state): State<AppState>,
    Json(body): Json<BackgroundMatchBody>,
) -> Result<Json<Value>, ApiError> {
    let defaults = SweepParams::default();
    let summary = state
        .sweep
        .run(SweepParams {
            limit: body.limit.unwrap_or(defaults.limit),
            threshold: body.threshold.unwrap_or(defaults.threshold),
        })
        .await?;

    Ok(Json(json!(summary)))
}

/// Similarity between two stored items
pub async fn similarity(
    State(state): State<AppState>,
    Json(body): Json<SimilarityBody>,
) -> Result<Json<Value>, ApiError> {
    let collection1 = parse_collection(&body.collection1)?;
    let collection2 = parse_collection(&body.collection2)?;

    let report = state
        .coordinator
        .similarity(&body.item1_id, collection1, &body.item2_id, collection2)
        .await?;

    Ok(Json(json!(report)))
}

/// Aggregates over recent persisted matches
pub async fn match_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<Value>, ApiError> {
    let report = state
        .coordinator
        .match_stats(params.limit.unwrap_or(100))
        .await?;

    Ok(Json(json!(report)))
}

/// Service health: embedding backend and every store
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let embedder_ready = state.services.embedder.is_ready().await;
    let item_store = state.services.items.ping().await;
    let match_store = state.services.matches.ping().await;
    let cache_store = state.services.cache.ping().await;

    let healthy = embedder_ready && item_store && match_store && cache_store;
    Json(json!({
        "status": if healthy { "ok" } else { "degraded" },
        "embedderReady": embedder_ready,
        "itemStore": item_store,
        "matchStore": match_store,
        "cacheStore": cache_store,
        "version": reclaim_core::VERSION,
    }))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection() {
        assert_eq!(parse_collection("lost").unwrap(), Collection::Lost);
        assert_eq!(parse_collection("found_items").unwrap(), Collection::Found);
        assert!(parse_collection("misplaced").is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                MatchingError::InvalidArgument("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                MatchingError::NotFound("missing".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                MatchingError::ModelUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                MatchingError::StoreUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                MatchingError::Unexpected("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
