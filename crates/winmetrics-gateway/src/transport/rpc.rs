//! JSON RPC over `POST /rpc`.
//!
//! Body: `{"id": 1, "method": "Arith.Multiply", "params": {...}}`.
//! Reply: `{"id": 1, "result": ...}` or
//! `{"id": 1, "error": "...", "code": "NOT_FOUND"}`.
//! Other HTTP methods get 405 from the router.

use axum::{extract::State, Json};

use crate::app_state::AppState;
use crate::dispatch::{RpcRequest, RpcResponse};

pub async fn rpc_call(State(app): State<AppState>, Json(req): Json<RpcRequest>) -> Json<RpcResponse> {
    Json(app.dispatcher().dispatch(req).await)
}
