//! API layer
//!
//! HTTP handlers for:
//! - WebFinger (instance actor discovery)
//! - ActivityPub (instance actor document)
//! - Health
//! - Metrics (Prometheus)
//!
//! Served paths are listed once in [`Route`]; the router is built from that
//! table.

mod activitypub;
pub mod metrics;
mod wellknown;

use axum::{
    Router,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
};

use crate::AppState;
use crate::federation::INSTANCE_ACTOR_PATH;
use crate::metrics::HTTP_REQUESTS_TOTAL;

pub use metrics::metrics_router;

/// Every path this server answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    WebFinger,
    InstanceActor,
    Health,
    Metrics,
}

impl Route {
    pub const ALL: [Route; 4] = [
        Route::WebFinger,
        Route::InstanceActor,
        Route::Health,
        Route::Metrics,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::WebFinger => "/.well-known/webfinger",
            Route::InstanceActor => INSTANCE_ACTOR_PATH,
            Route::Health => "/health",
            Route::Metrics => "/metrics",
        }
    }

    /// Look up the route serving `path`
    pub fn from_path(path: &str) -> Option<Route> {
        Self::ALL.into_iter().find(|route| route.path() == path)
    }
}

/// Endpoint label for the request counter; unknown paths share one series
fn endpoint_label(path: &str) -> &'static str {
    Route::from_path(path).map_or("other", Route::path)
}

/// Count every served request by method, endpoint and status
async fn track_requests(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().clone();
    let endpoint = endpoint_label(request.uri().path());

    let response = next.run(request).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint, response.status().as_str()])
        .inc();
    response
}

/// Create the router for every entry in [`Route::ALL`]
pub fn routes() -> Router<AppState> {
    Route::ALL
        .into_iter()
        .fold(Router::new(), |router, route| match route {
            Route::WebFinger => router.route(route.path(), get(wellknown::webfinger)),
            Route::InstanceActor => router.route(route.path(), get(activitypub::instance_actor)),
            Route::Health => router.route(route.path(), get(health_check)),
            Route::Metrics => router.merge(metrics_router()),
        })
        .layer(middleware::from_fn(track_requests))
}

async fn health_check() -> &'static str {
    "OK"
}
