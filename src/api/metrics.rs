//! Prometheus scrape endpoint

use axum::{
    Router,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::error::AppError;
use crate::metrics::REGISTRY;

/// Render every registered metric in the Prometheus text format
fn render() -> Result<String, AppError> {
    TextEncoder::new()
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode metrics: {}", e)))
}

async fn scrape() -> Result<Response, AppError> {
    let body = render()?;
    Ok(([(header::CONTENT_TYPE, TextEncoder::new().format_type())], body).into_response())
}

/// Router serving [`super::Route::Metrics`], generic over the app state
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(super::Route::Metrics.path(), get(scrape))
}
