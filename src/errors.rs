use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

/// ValidationErrors
///
/// Accumulates field-level validation messages for a single request payload.
/// Keys are field names, values are every message recorded against that field,
/// so a client can render all problems at once instead of fixing them one by one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message against a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Shorthand for the single-field case (e.g., a uniqueness conflict).
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Converts the accumulator into a handler result: `Ok(())` when no message
    /// was recorded, otherwise the full 422 payload.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

/// ApiError
///
/// The complete error taxonomy of the HTTP surface. Every failure a handler can
/// produce is recovered here and rendered as a JSON body; nothing propagates as
/// a bare panic or an opaque empty response.
///
/// Authentication failures deliberately collapse into the single `Unauthorized`
/// variant: the response never reveals whether a token was missing, malformed,
/// expired, or referenced a deleted user, which would otherwise give an attacker
/// an oracle against token validity.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 422 with per-field messages.
    #[error("validation failed")]
    Validation(ValidationErrors),
    /// 401 with a fixed, generic body.
    #[error("unauthorized")]
    Unauthorized,
    /// 404 for a missing entity id or setting key.
    #[error("not found")]
    NotFound,
    /// 500; the underlying cause is logged, never serialized.
    #[error("internal server error")]
    Internal,
}

impl From<crate::repository::RepoError> for ApiError {
    /// Constraint violations surface as 422 field errors (a duplicate unique
    /// key is a validation problem from the client's perspective); everything
    /// else is logged and hidden behind a 500.
    fn from(e: crate::repository::RepoError) -> Self {
        use crate::repository::RepoError;
        match e {
            RepoError::Duplicate(field) => {
                ApiError::Validation(ValidationErrors::single(field, "has already been taken"))
            }
            RepoError::ForeignKey(field) => {
                ApiError::Validation(ValidationErrors::single(field, "does not exist"))
            }
            RepoError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" }))).into_response()
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error" })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_multiple_messages_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("password", "must be at least 8 characters");
        errors.add("password", "must not be blank");
        errors.add("email", "is not a valid email address");

        assert!(!errors.is_empty());
        assert!(errors.contains("password"));
        assert!(errors.contains("email"));

        let body = serde_json::to_value(&errors).unwrap();
        assert_eq!(body["password"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_accumulator_converts_to_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
        assert!(
            ValidationErrors::single("key", "has already been taken")
                .into_result()
                .is_err()
        );
    }
}
