use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::instrument::Fault;

#[derive(Debug, Deserialize)]
pub struct EchoQuery {
    pub msg: Option<String>,
}

/// `GET /v1/echo?msg=...`: 200 with the message, 400 without one.
pub async fn echo(Query(q): Query<EchoQuery>) -> Response {
    match q.msg {
        Some(msg) if !msg.is_empty() => (StatusCode::OK, msg).into_response(),
        _ => (StatusCode::BAD_REQUEST, "missing msg").into_response(),
    }
}

/// `GET /v1/fault`: always reports an unhandled fault.
pub async fn fault() -> Result<&'static str, Fault> {
    Err(Fault::new("fault endpoint invoked"))
}
