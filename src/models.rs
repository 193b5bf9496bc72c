use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{ApiError, ValidationErrors};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Represents the user's canonical identity record stored in the `users` table.
/// The stored bcrypt hash is carried for credential checks but is **never**
/// serialized into a response body or exported to the frontend types.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // The user's primary identifier. Unique at the database level.
    pub email: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Role
///
/// A named role record from the `roles` table. Roles are plain CRUD entities
/// here; nothing in the request pipeline consults them for access decisions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: Uuid,
    // Unique at the database level.
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Permission
///
/// A named permission record from the `permissions` table. Same lifecycle as `Role`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Permission {
    pub id: Uuid,
    // Unique at the database level.
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Category
///
/// A product grouping record from the `categories` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Product
///
/// A catalog record from the `products` table. Prices are integer cents to keep
/// money arithmetic exact; `category_id`, when present, references `categories.id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    // Price in cents.
    pub price: i64,
    pub category_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Setting
///
/// A key-value row from the `settings` table. The key is the natural primary key;
/// the value is opaque to the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Setting {
    #[schema(example = "site_name")]
    pub key: String,
    #[schema(example = "My Shop")]
    pub value: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Auth Schemas ---

/// TokenBundle
///
/// The response body of every endpoint that issues an access token.
/// `expires_in` is the remaining validity in seconds, mirroring the embedded
/// `exp` claim so clients can schedule refreshes without decoding the token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenBundle {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    pub expires_in: i64,
}

/// Generic one-line acknowledgement body (e.g., logout).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /auth/register).
/// The plaintext password only lives long enough to be hashed; it is never
/// persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// LoginRequest
///
/// Input payload for POST /auth/login. Deliberately not field-validated:
/// any shortfall simply fails the credential check, so the response stays a
/// uniform 401 regardless of what was wrong.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// CreateUserRequest
///
/// Input payload for the administrative user store endpoint (POST /users).
/// Unlike registration there is no confirmation field; the caller is trusted
/// to have collected the password correctly.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// UpdateUserRequest
///
/// Partial update payload for PUT /users/{id}.
///
/// Uses `Option<T>` for all fields and `#[serde(skip_serializing_if = "Option::is_none")]`
/// to efficiently handle partial updates, ensuring only provided fields are included
/// in the JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Input payload for POST /roles.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update payload for PUT /roles/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRoleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Input payload for POST /permissions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePermissionRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update payload for PUT /permissions/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePermissionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Input payload for POST /categories.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update payload for PUT /categories/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Input payload for POST /products.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    // Price in cents.
    pub price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
}

/// Partial update payload for PUT /products/{id}.
/// A `category_id` that is present must reference an existing category;
/// omitting it leaves the current assignment untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
}

/// Input payload for POST /settings.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateSettingRequest {
    #[schema(example = "site_name")]
    pub key: String,
    pub value: String,
}

/// Update payload for PUT /settings/{key}. Only the value can change;
/// renaming a key is a delete-and-create.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSettingRequest {
    pub value: String,
}

// --- Internal Structures (Not Exported) ---

/// UserChanges
///
/// Repository-facing partial update for a user row. Handlers translate the
/// API-level `UpdateUserRequest` into this, hashing the plaintext password on
/// the way so the persistence layer only ever sees the bcrypt digest.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

// --- Field Validation ---

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Minimal structural check: one '@' with a non-empty local part and a
/// dotted, non-empty domain. Deliverability is not this server's problem.
fn is_valid_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && domain.len() > 2
        }
        None => false,
    }
}

const PASSWORD_MIN_LEN: usize = 8;

fn check_name(errors: &mut ValidationErrors, name: &str) {
    if is_blank(name) {
        errors.add("name", "must not be blank");
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if !is_valid_email(email) {
        errors.add("email", "is not a valid email address");
    }
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.len() < PASSWORD_MIN_LEN {
        errors.add("password", "must be at least 8 characters");
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        if self.password != self.password_confirmation {
            errors.add("password_confirmation", "does not match password");
        }
        errors.into_result()
    }
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()
    }
}

impl UpdateUserRequest {
    /// Only supplied fields are checked; an absent field keeps the stored value.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        if let Some(email) = &self.email {
            check_email(&mut errors, email);
        }
        if let Some(password) = &self.password {
            check_password(&mut errors, password);
        }
        errors.into_result()
    }
}

impl CreateRoleRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        errors.into_result()
    }
}

impl UpdateRoleRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        errors.into_result()
    }
}

impl CreatePermissionRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        errors.into_result()
    }
}

impl UpdatePermissionRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        errors.into_result()
    }
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        errors.into_result()
    }
}

impl UpdateCategoryRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        errors.into_result()
    }
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        if self.price < 0 {
            errors.add("price", "must not be negative");
        }
        errors.into_result()
    }
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        if let Some(price) = self.price {
            if price < 0 {
                errors.add("price", "must not be negative");
            }
        }
        errors.into_result()
    }
}

impl CreateSettingRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if is_blank(&self.key) {
            errors.add("key", "must not be blank");
        }
        errors.into_result()
    }
}
