//! API v1 routes.
//!
//! Every administrative route is checked by [`AuthzLayer`]; the resource is
//! the path segment after `/api/v1` unless a route overrides it.

use crate::{handlers, middleware::AuthzLayer, state::AppState};
use axum::{
    routing::{get, post},
    Router,
};
use warden_authz::{Action, Resource};

fn resource(name: &'static str) -> Resource {
    Resource::new(name).expect("route resource names are valid")
}

/// Create the v1 API router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(system_routes(state))
        .merge(group_routes(state))
        .merge(project_routes(state))
        .merge(self_routes())
}

fn system_routes(state: &AppState) -> Router<AppState> {
    let guard = state.guard.clone();

    Router::new()
        .route(
            "/policies",
            get(handlers::policies::list)
                .post(handlers::policies::grant)
                .delete(handlers::policies::revoke),
        )
        .route("/policies/batch", post(handlers::policies::grant_batch))
        .route(
            "/roles",
            get(handlers::roles::list)
                .post(handlers::roles::assign)
                .delete(handlers::roles::unassign),
        )
        .route(
            "/roles/inheritance",
            post(handlers::roles::add_inheritance).delete(handlers::roles::remove_inheritance),
        )
        .route("/permissions", get(handlers::permissions::list))
        .route("/permissions/check", get(handlers::permissions::check))
        .route_layer(AuthzLayer::system(guard.clone()))
        // Reloading is an update of the policy set, whatever the verb.
        .route(
            "/policies/reload",
            post(handlers::policies::reload)
                .route_layer(AuthzLayer::system(guard).with_action(Action::update())),
        )
}

// Scoped mutations always name their scope, so they never skip.
fn group_routes(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/groups/:id/roles",
        post(handlers::roles::assign_scoped)
            .delete(handlers::roles::unassign_scoped)
            .route_layer(
                AuthzLayer::group(state.guard.clone())
                    .with_resource(resource("roles"))
                    .deny_when_missing(),
            ),
    )
}

fn project_routes(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/projects/:id/roles",
        post(handlers::roles::assign_scoped)
            .delete(handlers::roles::unassign_scoped)
            .route_layer(
                AuthzLayer::project(state.guard.clone())
                    .with_resource(resource("roles"))
                    .deny_when_missing(),
            ),
    )
}

/// Routes that only need an authenticated caller.
fn self_routes() -> Router<AppState> {
    Router::new().route("/me/permissions", get(handlers::permissions::me))
}
