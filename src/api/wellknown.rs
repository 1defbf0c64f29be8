//! Well-known endpoints
//!
//! - /.well-known/webfinger

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::federation::JRD_MIMETYPE;

/// WebFinger query parameters
#[derive(Debug, Deserialize)]
pub(crate) struct WebFingerQuery {
    resource: Option<String>,
}

/// GET /.well-known/webfinger
///
/// Answers only for the instance actor account
/// (`acct:{hostname}@{hostname}`); every other resource is a 404.
pub(crate) async fn webfinger(
    State(state): State<AppState>,
    Query(query): Query<WebFingerQuery>,
) -> Result<Response, AppError> {
    let resource = query
        .resource
        .ok_or_else(|| AppError::Validation("Missing resource parameter".to_string()))?;

    if resource != state.instance.acct() {
        tracing::debug!(%resource, "WebFinger query for unknown resource");
        return Err(AppError::NotFound);
    }

    let body = serde_json::to_string(&state.instance.webfinger())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(([(header::CONTENT_TYPE, JRD_MIMETYPE)], body).into_response())
}
