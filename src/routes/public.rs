use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// These routes form the identity gateway: account creation and the two ways
/// of obtaining an access token (credentials, or an existing token within the
/// refresh grace window).
///
/// Security Mandate:
/// Every failure on the token-issuing endpoints must be indistinguishable from
/// the outside (a single generic 401 body), so the gateway cannot be used as
/// an oracle for registered e-mails or token validity.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates a new account. Field-level validation errors come back as 422.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Exchanges email + password for a signed token bundle.
        .route("/auth/login", post(handlers::login))
        // POST /auth/refresh
        // Exchanges a presented bearer token for a fresh bundle. Lives here rather
        // than behind the auth middleware because the guard rejects expired tokens,
        // while refresh must accept tokens that expired within the grace window.
        // The handler performs its own signature validation.
        .route("/auth/refresh", post(handlers::refresh))
}
