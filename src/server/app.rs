//! Axum application setup
//!
//! Creates and configures the Axum application with routes and middleware.

use crate::{
    Result, config::Settings, session::SessionManager, watchdog::ConnectivityState,
};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Login and lab-derivation front door
    pub session_manager: Arc<SessionManager>,
    /// Egress health written by the watchdog
    pub connectivity: Arc<ConnectivityState>,
    /// Application settings
    pub settings: Arc<Settings>,
    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        session_manager: Arc<SessionManager>,
        connectivity: Arc<ConnectivityState>,
    ) -> Self {
        Self {
            session_manager,
            connectivity,
            settings: Arc::new(settings),
            start_time: std::time::Instant::now(),
        }
    }

    /// Build the session manager, proxy pool and store from `settings`
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let session_manager = Arc::new(SessionManager::from_settings(&settings).await?);
        Ok(Self::new(
            settings,
            session_manager,
            Arc::new(ConnectivityState::new()),
        ))
    }
}

/// Create the main Axum application with routes and middleware
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(super::handlers::index))
        .route("/ping", get(super::handlers::ping))
        .route("/login", get(super::handlers::login))
        .route("/experiment/login", get(super::handlers::experiment_login))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
