use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any caller who has passed the authentication
/// layer. This module carries the entire resource surface: the six CRUD
/// controllers plus the session-introspection endpoints.
///
/// Access Control Strategy:
/// The auth middleware layered above this router runs the `AuthUser` extractor
/// on every request, so nothing below executes without a validated token whose
/// subject still exists. Handlers that need the caller's identity (profile,
/// logout) take `AuthUser` as an argument; the CRUD handlers do not care who
/// the caller is, only that the gate was passed.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session ---
        // GET/POST /auth/profile
        // Returns the authenticated user's own record. Both verbs are accepted
        // for client compatibility.
        .route(
            "/auth/profile",
            get(handlers::profile).post(handlers::profile),
        )
        // POST /auth/logout
        // Stateless acknowledgement; the client discards its token.
        .route("/auth/logout", post(handlers::logout))
        // --- Users ---
        .route("/users", get(handlers::get_users).post(handlers::create_user))
        .route(
            "/users/{id}",
            get(handlers::get_user_details)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // --- Roles ---
        .route("/roles", get(handlers::get_roles).post(handlers::create_role))
        .route(
            "/roles/{id}",
            get(handlers::get_role_details)
                .put(handlers::update_role)
                .delete(handlers::delete_role),
        )
        // --- Permissions ---
        .route(
            "/permissions",
            get(handlers::get_permissions).post(handlers::create_permission),
        )
        .route(
            "/permissions/{id}",
            get(handlers::get_permission_details)
                .put(handlers::update_permission)
                .delete(handlers::delete_permission),
        )
        // --- Categories ---
        .route(
            "/categories",
            get(handlers::get_categories).post(handlers::create_category),
        )
        .route(
            "/categories/{id}",
            get(handlers::get_category_details)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        // --- Products ---
        .route(
            "/products",
            get(handlers::get_products).post(handlers::create_product),
        )
        .route(
            "/products/{id}",
            get(handlers::get_product_details)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        // --- Settings ---
        // Settings are addressed by their natural key, not a surrogate id.
        .route(
            "/settings",
            get(handlers::get_settings).post(handlers::create_setting),
        )
        .route(
            "/settings/{key}",
            get(handlers::get_setting_details)
                .put(handlers::update_setting)
                .delete(handlers::delete_setting),
        )
}
