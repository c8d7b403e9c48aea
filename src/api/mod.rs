mod handlers;
pub mod middleware;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;
use middleware::auth_middleware;
pub use middleware::{Actor, SecurityConfig};

/// Router with authentication disabled.
pub fn create_router(db: Database) -> Router {
    create_router_with_config(db, SecurityConfig::disabled())
}

pub fn create_router_with_config(db: Database, security: SecurityConfig) -> Router {
    let protected = Router::new()
        // Projects
        .route("/projects", get(handlers::list_projects))
        .route("/projects", post(handlers::create_project))
        .route("/projects/{id}", get(handlers::get_project))
        .route("/projects/{id}", put(handlers::update_project))
        .route("/projects/{id}", delete(handlers::delete_project))
        .route("/projects/{id}/participants", get(handlers::list_participants))
        .route("/projects/{id}/participants", post(handlers::enroll_participant))
        .route("/projects/{id}/groups", get(handlers::list_groups))
        .route("/projects/{id}/groups", post(handlers::create_own_group))
        .route("/projects/{id}/groups/partition", post(handlers::partition_groups))
        // Groups
        .route("/groups/{id}", get(handlers::get_group))
        .route("/groups/{id}/auto-accept", put(handlers::set_auto_accept))
        .route("/groups/{id}/join-requests", get(handlers::list_join_requests))
        .route("/groups/{id}/join-requests", post(handlers::create_join_request))
        .route(
            "/groups/{id}/join-requests/{request_id}/accept",
            post(handlers::accept_join_request),
        )
        .route("/groups/{id}/leader", post(handlers::transfer_leadership))
        .route(
            "/groups/{id}/members/{participant_id}",
            delete(handlers::remove_member),
        )
        .route("/groups/{id}/leave", post(handlers::leave_group))
        .route("/groups/{id}/sprints", get(handlers::list_sprints))
        .route("/groups/{id}/sprints", post(handlers::create_sprint))
        .route("/groups/{id}/backlog", get(handlers::list_backlog))
        .route("/groups/{id}/work-items", post(handlers::create_work_item))
        // Join requests (by request id)
        .route("/join-requests/{id}", delete(handlers::withdraw_join_request))
        // Sprints
        .route("/sprints/{id}", get(handlers::get_sprint))
        .route("/sprints/{id}/start", post(handlers::start_sprint))
        .route("/sprints/{id}/complete", post(handlers::complete_sprint))
        .route("/sprints/{id}/work-items", get(handlers::list_sprint_work_items))
        // Work items
        .route("/work-items/{id}", put(handlers::update_work_item))
        .route_layer(from_fn_with_state(security.clone(), auth_middleware));

    let api = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&security))
        .with_state(db)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let Some(origins) = &security.cors_origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
