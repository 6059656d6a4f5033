use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/by-code/{code}", get(handlers::appointments_by_code));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/mine", get(handlers::list_my_appointments))
        .route("/owner", get(handlers::list_owner_appointments))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .patch(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Booking page data for unauthenticated visitors.
pub fn public_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{code}", get(handlers::public_agenda))
        .with_state(state)
}
