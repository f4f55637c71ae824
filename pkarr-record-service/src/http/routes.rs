use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use pkarr::PublicKey;
use tower_http::trace::TraceLayer;

use super::{HttpError, HttpResult};
use crate::record::{PublishRecordRequest, RecordJson, ResolvedRecord};
use crate::service::RecordService;

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub(crate) service: RecordService,
}

/// Routes:
/// - `GET /{key}` resolves the record published under the z-base-32 key.
/// - `PUT /{key}` publishes a record; the body carries the base64 payload,
///   sequence number and signature.
pub fn create_app(service: RecordService) -> Router {
    Router::new()
        .route("/{key}", get(resolve_record).put(publish_record))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

fn parse_key(key: &str) -> HttpResult<PublicKey> {
    PublicKey::try_from(key).map_err(HttpError::bad_request)
}

async fn resolve_record(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> HttpResult<Json<RecordJson>> {
    let public_key = parse_key(&key)?;
    let resolved = state.service.resolve(&public_key).await?;
    Ok(Json(resolved.to_json()))
}

async fn publish_record(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<RecordJson>,
) -> HttpResult<StatusCode> {
    let public_key = parse_key(&key)?;
    let resolved = ResolvedRecord::from_json(&body).map_err(HttpError::bad_request)?;
    state
        .service
        .publish(PublishRecordRequest {
            public_key,
            payload: resolved.payload,
            signature: resolved.signature,
            seq: resolved.seq,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
