/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. This structure ensures that
/// access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.
///
/// Routes accessible without a credential: the health probe and the token
/// acquisition endpoints (register, login, refresh).
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated bearer token resolving to an existing user.
pub mod authenticated;
