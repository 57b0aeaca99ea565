//! Operational HTTP endpoints.
//!
//! - `/healthz`    : liveness
//! - `/debug/vars` : registry snapshot as JSON (scraped by `getstats`)

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn vars(State(state): State<AppState>) -> Response {
    let body = state.registry().to_json();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        body,
    )
        .into_response()
}
