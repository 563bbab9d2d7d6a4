//! HTTP request handlers
//!
//! Every route answers HTTP 200 with a `{code, message}` body; failures are
//! told apart by `code`, never by HTTP status.

use crate::{
    Error,
    error::format_error_for_logging,
    server::app::AppState,
    types::{ApiResponse, LoginQuery, PingResponse},
    utils::version,
};
use axum::{
    Json,
    extract::{Query, State},
};

/// Service banner
///
/// GET /
pub async fn index() -> Json<ApiResponse> {
    Json(ApiResponse::ok("API服务正常运行中"))
}

/// Health check endpoint
///
/// GET /ping
pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(
        PingResponse::new(uptime, version::get_version()).with_connectivity(
            state.connectivity.is_ok(),
            state.connectivity.consecutive_failures(),
        ),
    )
}

/// Fresh portal login, bypassing the session cache
///
/// GET /login?name=&passwd=
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Json<ApiResponse> {
    if !query.is_undergraduate() {
        return Json(ApiResponse::with_code(-1, "小程序只支持本科生登录!"));
    }

    let principal = query.into_principal();
    match state.session_manager.login(&principal, true).await {
        Ok(jar) => {
            tracing::info!(principal = %principal.id, cookies = jar.len(), "Login served");
            Json(ApiResponse::ok("OK"))
        }
        Err(e) => Json(failure("login", &principal.id, &e)),
    }
}

/// Lab platform cookie acquisition
///
/// GET /experiment/login?name=&passwd=
pub async fn experiment_login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Json<ApiResponse> {
    let principal = query.into_principal();
    match state.session_manager.lab_login(&principal).await {
        Ok(jar) => {
            tracing::info!(principal = %principal.id, cookies = jar.len(), "Lab login served");
            Json(ApiResponse::ok("OK"))
        }
        Err(e) => Json(failure("experiment_login", &principal.id, &e)),
    }
}

fn failure(route: &str, principal: &str, error: &Error) -> ApiResponse {
    let details = format_error_for_logging(error);
    match error {
        Error::Auth { .. } | Error::PasswordExpired | Error::Validation { .. } => {
            tracing::info!(route, principal, details = %details, "Login rejected");
        }
        _ => {
            tracing::error!(route, principal, details = %details, "Login failed");
        }
    }
    ApiResponse::from_error(error)
}
