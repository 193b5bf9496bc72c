use crate::{
    AppState,
    auth::{self, AuthUser},
    errors::{ApiError, ValidationErrors},
    models::{
        Category, CreateCategoryRequest, CreatePermissionRequest, CreateProductRequest,
        CreateRoleRequest, CreateSettingRequest, CreateUserRequest, LoginRequest, MessageResponse,
        Permission, Product, RegisterRequest, Role, Setting, TokenBundle, UpdateCategoryRequest,
        UpdatePermissionRequest, UpdateProductRequest, UpdateRoleRequest, UpdateSettingRequest,
        UpdateUserRequest, User, UserChanges,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use uuid::Uuid;

// --- Shared Helpers ---

/// Hashes a plaintext password at the configured bcrypt cost.
/// Hash failures are configuration bugs (invalid cost), not client errors.
fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost).map_err(|e| {
        tracing::error!("password hashing failed: {:?}", e);
        ApiError::Internal
    })
}

/// Confirms a referenced category exists before a product write.
/// Reported against the `category_id` field so the client can fix the payload.
async fn check_category_reference(
    state: &AppState,
    category_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if let Some(id) = category_id {
        if state.repo.get_category(id).await.is_none() {
            return Err(ApiError::Validation(ValidationErrors::single(
                "category_id",
                "does not exist",
            )));
        }
    }
    Ok(())
}

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates a new user account.
///
/// *Flow*: field validation → e-mail uniqueness check → bcrypt hash at the
/// configured cost → insert. The pre-insert uniqueness check produces the
/// field error; the database unique constraint backstops the race, and its
/// violation is mapped to the same 422 rather than a 500.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();

    if state.repo.get_user_by_email(&email).await.is_some() {
        return Err(ApiError::Validation(ValidationErrors::single(
            "email",
            "has already been taken",
        )));
    }

    let password_hash = hash_password(&payload.password, state.config.bcrypt_cost)?;

    let user = state
        .repo
        .create_user(payload.name, email, password_hash)
        .await?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// login
///
/// [Public Route] Exchanges credentials for an access token bundle.
///
/// *Security*: a missing account and a wrong password are indistinguishable.
/// Both produce the same generic 401, so the endpoint cannot be used to probe
/// which e-mail addresses are registered. The bcrypt comparison itself is
/// constant-time with respect to the stored hash content.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token bundle", body = TokenBundle),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenBundle>, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let user = state
        .repo
        .get_user_by_email(&email)
        .await
        .ok_or(ApiError::Unauthorized)?;

    let verified =
        bcrypt::verify(&payload.password, &user.password_hash).unwrap_or(false);
    if !verified {
        return Err(ApiError::Unauthorized);
    }

    let bundle = auth::issue_token(user.id, &state.config)?;

    tracing::info!(user_id = %user.id, "login succeeded");

    Ok(Json(bundle))
}

/// profile
///
/// [Authenticated Route] Returns the authenticated user's own record.
/// The identity comes from the `AuthUser` extractor; the fresh lookup keeps
/// the response current even if the row changed since the token was issued.
#[utoipa::path(
    get,
    path = "/auth/profile",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    let user = state.repo.get_user(id).await.ok_or(ApiError::Unauthorized)?;
    Ok(Json(user))
}

/// refresh
///
/// [Public Route, self-authenticating] Exchanges the presented bearer token for
/// a fresh bundle. Placed outside the auth middleware on purpose: the guard
/// rejects expired tokens outright, while refresh must still accept tokens that
/// expired within the configured grace window.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token bundle", body = TokenBundle),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenBundle>, ApiError> {
    let token = auth::bearer_token(&headers)?;
    let bundle = auth::refresh_token(token, &state.config)?;
    Ok(Json(bundle))
}

/// logout
///
/// [Authenticated Route] Acknowledges a logout. Tokens are stateless, so there
/// is nothing server-side to tear down; the client discards its copy and the
/// token dies at its embedded expiry.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout(AuthUser { id, .. }: AuthUser) -> Json<MessageResponse> {
    tracing::info!(user_id = %id, "logout");
    Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    })
}

// --- User CRUD ---

/// [Authenticated Route] Lists all user accounts.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "Users", body = [User]))
)]
pub async fn get_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.repo.get_users().await)
}

/// [Authenticated Route] Retrieves a single user by id.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    match state.repo.get_user(id).await {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::NotFound),
    }
}

/// create_user
///
/// [Authenticated Route] Administrative user creation. Same hashing path as
/// registration, without the confirmation field.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();

    if state.repo.get_user_by_email(&email).await.is_some() {
        return Err(ApiError::Validation(ValidationErrors::single(
            "email",
            "has already been taken",
        )));
    }

    let password_hash = hash_password(&payload.password, state.config.bcrypt_cost)?;

    let user = state
        .repo
        .create_user(payload.name, email, password_hash)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// update_user
///
/// [Authenticated Route] Partial update. A supplied password is re-hashed
/// before it reaches the repository; absent fields keep their stored values.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    payload.validate()?;

    let password_hash = match &payload.password {
        Some(password) => Some(hash_password(password, state.config.bcrypt_cost)?),
        None => None,
    };

    let changes = UserChanges {
        name: payload.name,
        email: payload.email.map(|e| e.trim().to_lowercase()),
        password_hash,
    };

    match state.repo.update_user(id, changes).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Deletes a user. Outstanding tokens for the deleted
/// account die at the guard's subject-existence check.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_user(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Role CRUD ---

/// [Authenticated Route] Lists all roles.
#[utoipa::path(
    get,
    path = "/roles",
    responses((status = 200, description = "Roles", body = [Role]))
)]
pub async fn get_roles(State(state): State<AppState>) -> Json<Vec<Role>> {
    Json(state.repo.get_roles().await)
}

/// [Authenticated Route] Retrieves a single role by id.
#[utoipa::path(
    get,
    path = "/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Found", body = Role),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_role_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Role>, ApiError> {
    match state.repo.get_role(id).await {
        Some(role) => Ok(Json(role)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Creates a role. The role name is unique; a duplicate
/// comes back as a 422 field error on `name`.
#[utoipa::path(
    post,
    path = "/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Created", body = Role),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    payload.validate()?;
    let role = state.repo.create_role(payload).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// [Authenticated Route] Partial role update.
#[utoipa::path(
    put,
    path = "/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = Role),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, ApiError> {
    payload.validate()?;
    match state.repo.update_role(id, payload).await? {
        Some(role) => Ok(Json(role)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Deletes a role.
#[utoipa::path(
    delete,
    path = "/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_role(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Permission CRUD ---

/// [Authenticated Route] Lists all permissions.
#[utoipa::path(
    get,
    path = "/permissions",
    responses((status = 200, description = "Permissions", body = [Permission]))
)]
pub async fn get_permissions(State(state): State<AppState>) -> Json<Vec<Permission>> {
    Json(state.repo.get_permissions().await)
}

/// [Authenticated Route] Retrieves a single permission by id.
#[utoipa::path(
    get,
    path = "/permissions/{id}",
    params(("id" = Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Found", body = Permission),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_permission_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Permission>, ApiError> {
    match state.repo.get_permission(id).await {
        Some(permission) => Ok(Json(permission)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Creates a permission. Name is unique.
#[utoipa::path(
    post,
    path = "/permissions",
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Created", body = Permission),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn create_permission(
    State(state): State<AppState>,
    Json(payload): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), ApiError> {
    payload.validate()?;
    let permission = state.repo.create_permission(payload).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

/// [Authenticated Route] Partial permission update.
#[utoipa::path(
    put,
    path = "/permissions/{id}",
    params(("id" = Uuid, Path, description = "Permission ID")),
    request_body = UpdatePermissionRequest,
    responses(
        (status = 200, description = "Updated", body = Permission),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePermissionRequest>,
) -> Result<Json<Permission>, ApiError> {
    payload.validate()?;
    match state.repo.update_permission(id, payload).await? {
        Some(permission) => Ok(Json(permission)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Deletes a permission.
#[utoipa::path(
    delete,
    path = "/permissions/{id}",
    params(("id" = Uuid, Path, description = "Permission ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_permission(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Category CRUD ---

/// [Authenticated Route] Lists all categories.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn get_categories(State(state): State<AppState>) -> Json<Vec<Category>> {
    Json(state.repo.get_categories().await)
}

/// [Authenticated Route] Retrieves a single category by id.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = Category),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_category_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
    match state.repo.get_category(id).await {
        Some(category) => Ok(Json(category)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Creates a category.
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    payload.validate()?;
    let category = state.repo.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// [Authenticated Route] Partial category update.
#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    payload.validate()?;
    match state.repo.update_category(id, payload).await? {
        Some(category) => Ok(Json(category)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Deletes a category.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_category(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Product CRUD ---

/// [Authenticated Route] Lists all products.
#[utoipa::path(
    get,
    path = "/products",
    responses((status = 200, description = "Products", body = [Product]))
)]
pub async fn get_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.repo.get_products().await)
}

/// [Authenticated Route] Retrieves a single product by id.
#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Found", body = Product),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_product_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    match state.repo.get_product(id).await {
        Some(product) => Ok(Json(product)),
        None => Err(ApiError::NotFound),
    }
}

/// create_product
///
/// [Authenticated Route] Creates a product. A supplied `category_id` must
/// reference an existing category; the check runs before the insert so the
/// client gets a field error instead of a bare constraint failure.
#[utoipa::path(
    post,
    path = "/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    payload.validate()?;
    check_category_reference(&state, payload.category_id).await?;
    let product = state.repo.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// [Authenticated Route] Partial product update. Same category reference rule
/// as creation.
#[utoipa::path(
    put,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = Product),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    payload.validate()?;
    check_category_reference(&state, payload.category_id).await?;
    match state.repo.update_product(id, payload).await? {
        Some(product) => Ok(Json(product)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Deletes a product.
#[utoipa::path(
    delete,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_product(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Setting CRUD ---

/// [Authenticated Route] Lists all settings.
#[utoipa::path(
    get,
    path = "/settings",
    responses((status = 200, description = "Settings", body = [Setting]))
)]
pub async fn get_settings(State(state): State<AppState>) -> Json<Vec<Setting>> {
    Json(state.repo.get_settings().await)
}

/// [Authenticated Route] Retrieves a setting by its key.
#[utoipa::path(
    get,
    path = "/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Found", body = Setting),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_setting_details(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Setting>, ApiError> {
    match state.repo.get_setting(&key).await {
        Some(setting) => Ok(Json(setting)),
        None => Err(ApiError::NotFound),
    }
}

/// create_setting
///
/// [Authenticated Route] Creates a setting. The key is the primary key, so a
/// duplicate is a 422 field error on `key`, never a 500.
#[utoipa::path(
    post,
    path = "/settings",
    request_body = CreateSettingRequest,
    responses(
        (status = 201, description = "Created", body = Setting),
        (status = 422, description = "Validation errors")
    )
)]
pub async fn create_setting(
    State(state): State<AppState>,
    Json(payload): Json<CreateSettingRequest>,
) -> Result<(StatusCode, Json<Setting>), ApiError> {
    payload.validate()?;

    if state.repo.get_setting(&payload.key).await.is_some() {
        return Err(ApiError::Validation(ValidationErrors::single(
            "key",
            "has already been taken",
        )));
    }

    let setting = state.repo.create_setting(payload).await?;
    Ok((StatusCode::CREATED, Json(setting)))
}

/// [Authenticated Route] Replaces a setting's value. Updating a key that was
/// never created is a 404, not an implicit insert.
#[utoipa::path(
    put,
    path = "/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    request_body = UpdateSettingRequest,
    responses(
        (status = 200, description = "Updated", body = Setting),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<UpdateSettingRequest>,
) -> Result<Json<Setting>, ApiError> {
    match state.repo.update_setting(&key, payload.value).await {
        Some(setting) => Ok(Json(setting)),
        None => Err(ApiError::NotFound),
    }
}

/// [Authenticated Route] Deletes a setting by key.
#[utoipa::path(
    delete,
    path = "/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_setting(&key).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
