//! shelf-api library - catalog and membership backend-for-frontend
//!
//! Serves read-only JSON views of a hosted catalog (audiobooks, chapters,
//! achievements) and membership data (plans, orders, members) behind a shared
//! API key.

use axum::Router;
use chrono::{DateTime, Utc};
use shelf_common::api::Authenticator;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::{CatalogService, MembershipService};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub membership: Arc<MembershipService>,
    /// API key check for protected routes
    pub authenticator: Arc<dyn Authenticator>,
    /// Server start, for health uptime
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        catalog: CatalogService,
        membership: MembershipService,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            membership: Arc::new(membership),
            authenticator,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `/health` is public; every other route requires the API key.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    let protected = Router::new()
        .route("/pricing_plans", get(api::pricing_plans))
        .route("/sold_subscriptions", get(api::sold_subscriptions))
        .route("/all_members", get(api::all_members))
        .route("/all_contacts", get(api::all_contacts))
        .route("/audiobooks", get(api::audiobooks))
        .route("/chapters", get(api::chapters))
        .route("/all_achievements", get(api::all_achievements))
        .route("/book_sponsors", get(api::book_sponsors))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
