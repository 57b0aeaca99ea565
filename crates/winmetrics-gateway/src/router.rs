//! Axum router wiring.
//!
//! Instrumented endpoints get the `track` middleware with their own stats;
//! ops and RPC routes are not instrumented as HTTP endpoints.

use axum::{
    middleware,
    routing::{get, post, MethodRouter},
    Router,
};

use crate::{app_state::AppState, instrument, ops, services, transport};

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/debug/vars", get(ops::vars))
        .route("/rpc", post(transport::rpc::rpc_call));

    for (path, name, route) in [
        ("/v1/echo", services::ECHO, get(services::echo)),
        ("/v1/fault", services::FAULT, get(services::fault)),
    ] {
        router = router.route(path, instrumented(&state, name, route));
    }

    router.with_state(state)
}

fn instrumented(
    state: &AppState,
    name: &str,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    match state.endpoint(name) {
        Some(stats) => route.route_layer(middleware::from_fn_with_state(stats, instrument::track)),
        None => {
            tracing::warn!(endpoint = name, "no stats published; serving uninstrumented");
            route
        }
    }
}
