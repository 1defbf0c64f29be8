//! ActivityPub endpoints
//!
//! - Instance actor document

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::AppError;
use crate::federation::ACTIVITY_MIMETYPE;

/// GET /instance_actor
///
/// Returns the instance actor document, so remote servers can fetch the
/// key our outbound requests are signed with. HEAD is answered by the
/// router with the same headers and no body.
///
/// Content-Type: application/activity+json
pub(crate) async fn instance_actor(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = serde_json::to_string(&state.instance.document())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(([(header::CONTENT_TYPE, ACTIVITY_MIMETYPE)], body).into_response())
}
