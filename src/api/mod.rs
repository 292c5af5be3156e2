pub mod change_node;
pub mod devices;
pub mod error;
pub mod health;
pub mod simulation;
pub mod tree;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{backend::AppState, config::Config};

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/tree", get(tree::get_tree).post(tree::get_tree))
        .route("/change-node", post(change_node::change_node))
        .route("/change-device", post(devices::change_device))
        .route("/simulation", get(simulation::simulation_ws))
        .route("/healthz", get(health::health_check))
        .with_state(state);

    if cfg.server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
