use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn provider_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/by-code/{code}", get(handlers::get_provider_by_code));

    let protected_routes = Router::new()
        .route("/activate", post(handlers::activate_provider))
        .route("/me", get(handlers::get_my_provider).put(handlers::update_my_provider))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn service_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/by-code/{code}", get(handlers::list_services_by_code));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_service))
        .route("/mine", get(handlers::list_my_services))
        .route("/{service_id}", patch(handlers::update_service).delete(handlers::delete_service))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/by-code/{code}", get(handlers::list_availability_by_code));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_availability))
        .route("/mine", get(handlers::list_my_availability))
        .route("/{block_id}", put(handlers::update_availability).delete(handlers::delete_availability))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
