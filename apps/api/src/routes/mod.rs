pub mod health;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::blueprint::handlers as blueprints;
use crate::evaluation::handlers as evaluations;
use crate::experiment::handlers as experiments;
use crate::organizations::handlers as organizations;
use crate::sampling::handlers as sampling;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Organizations
        .route(
            "/api/v1/organizations",
            post(organizations::handle_create_organization),
        )
        .route(
            "/api/v1/organizations/:id",
            get(organizations::handle_get_organization)
                .delete(organizations::handle_delete_organization),
        )
        .route(
            "/api/v1/organizations/:id/settings",
            patch(organizations::handle_update_settings),
        )
        .route(
            "/api/v1/organizations/:id/members/:user_id",
            patch(organizations::handle_change_member_role)
                .delete(organizations::handle_remove_member),
        )
        .route(
            "/api/v1/organizations/:id/invites",
            post(organizations::handle_create_invite),
        )
        .route(
            "/api/v1/invites/redeem",
            post(organizations::handle_redeem_invite),
        )
        .route(
            "/api/v1/organizations/:id/api-keys",
            get(organizations::handle_list_api_keys),
        )
        .route(
            "/api/v1/organizations/:id/api-keys/:provider",
            put(organizations::handle_put_api_key),
        )
        .route(
            "/api/v1/organizations/:id/usage",
            get(organizations::handle_usage),
        )
        // Blueprints
        .route("/api/v1/blueprints/analyze", post(blueprints::handle_analyze))
        .route("/api/v1/blueprints/render", post(blueprints::handle_render))
        // Sampling
        .route("/api/v1/sampling", post(sampling::handle_sampling))
        // Experiments
        .route(
            "/api/v1/experiments",
            post(experiments::handle_run_experiment),
        )
        .route(
            "/api/v1/experiments/:id",
            get(experiments::handle_get_experiment),
        )
        // Evaluation
        .route("/api/v1/evaluations/score", post(evaluations::handle_score))
        .route("/api/v1/evaluations/judge", post(evaluations::handle_judge))
        .route("/api/v1/outcomes", post(evaluations::handle_record_outcome))
        .route(
            "/api/v1/outcomes/stats",
            get(evaluations::handle_outcome_stats),
        )
        .with_state(state)
}
