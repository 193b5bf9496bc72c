use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use shop_admin::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    errors::ApiError,
    handlers,
    models::{
        Category, CreateCategoryRequest, CreatePermissionRequest, CreateProductRequest,
        CreateRoleRequest, CreateSettingRequest, CreateUserRequest, LoginRequest, Permission,
        Product, RegisterRequest, Role, Setting, UpdateCategoryRequest, UpdatePermissionRequest,
        UpdateProductRequest, UpdateRoleRequest, UpdateSettingRequest, UpdateUserRequest, User,
        UserChanges,
    },
    repository::{RepoError, Repository},
};
use std::sync::Arc;
use tokio::test;
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// This struct is the central control point for testing handler logic.
// Handlers rely on the Repository trait, so we mock the trait implementation
// with pre-canned outputs.
pub struct MockRepoControl {
    pub users_to_return: Vec<User>,
    pub user_to_return: Option<User>,
    // What get_user_by_email resolves to (drives duplicate checks and login).
    pub user_by_email: Option<User>,
    // When set, create operations fail with the given constraint field.
    pub create_conflict: Option<&'static str>,
    // Drives whether update_* finds its row.
    pub update_found: bool,
    pub delete_result: bool,
    pub category_to_return: Option<Category>,
    pub product_to_return: Option<Product>,
    pub setting_to_return: Option<Setting>,
}

impl Default for MockRepoControl {
    fn default() -> Self {
        MockRepoControl {
            users_to_return: vec![],
            user_to_return: None,
            user_by_email: None,
            create_conflict: None,
            update_found: true,
            delete_result: true,
            category_to_return: None,
            product_to_return: None,
            setting_to_return: None,
        }
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    // --- Users ---
    async fn get_users(&self) -> Vec<User> {
        self.users_to_return.clone()
    }
    async fn get_user(&self, _id: Uuid) -> Option<User> {
        self.user_to_return.clone()
    }
    async fn get_user_by_email(&self, _email: &str) -> Option<User> {
        self.user_by_email.clone()
    }
    // Echoes its inputs back so tests can verify what the handler persisted.
    async fn create_user(
        &self,
        name: String,
        email: String,
        password_hash: String,
    ) -> Result<User, RepoError> {
        if let Some(field) = self.create_conflict {
            return Err(RepoError::Duplicate(field));
        }
        Ok(User {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            ..User::default()
        })
    }
    async fn update_user(
        &self,
        _id: Uuid,
        _changes: UserChanges,
    ) -> Result<Option<User>, RepoError> {
        Ok(self.update_found.then(User::default))
    }
    async fn delete_user(&self, _id: Uuid) -> bool {
        self.delete_result
    }

    // --- Roles ---
    async fn get_roles(&self) -> Vec<Role> {
        vec![]
    }
    async fn get_role(&self, _id: Uuid) -> Option<Role> {
        None
    }
    async fn create_role(&self, req: CreateRoleRequest) -> Result<Role, RepoError> {
        if let Some(field) = self.create_conflict {
            return Err(RepoError::Duplicate(field));
        }
        Ok(Role {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            ..Role::default()
        })
    }
    async fn update_role(
        &self,
        _id: Uuid,
        _req: UpdateRoleRequest,
    ) -> Result<Option<Role>, RepoError> {
        Ok(self.update_found.then(Role::default))
    }
    async fn delete_role(&self, _id: Uuid) -> bool {
        self.delete_result
    }

    // --- Permissions ---
    async fn get_permissions(&self) -> Vec<Permission> {
        vec![]
    }
    async fn get_permission(&self, _id: Uuid) -> Option<Permission> {
        None
    }
    async fn create_permission(
        &self,
        req: CreatePermissionRequest,
    ) -> Result<Permission, RepoError> {
        Ok(Permission {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            ..Permission::default()
        })
    }
    async fn update_permission(
        &self,
        _id: Uuid,
        _req: UpdatePermissionRequest,
    ) -> Result<Option<Permission>, RepoError> {
        Ok(self.update_found.then(Permission::default))
    }
    async fn delete_permission(&self, _id: Uuid) -> bool {
        self.delete_result
    }

    // --- Categories ---
    async fn get_categories(&self) -> Vec<Category> {
        vec![]
    }
    async fn get_category(&self, _id: Uuid) -> Option<Category> {
        self.category_to_return.clone()
    }
    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, RepoError> {
        Ok(Category {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            ..Category::default()
        })
    }
    async fn update_category(
        &self,
        _id: Uuid,
        _req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, RepoError> {
        Ok(self.update_found.then(Category::default))
    }
    async fn delete_category(&self, _id: Uuid) -> bool {
        self.delete_result
    }

    // --- Products ---
    async fn get_products(&self) -> Vec<Product> {
        vec![]
    }
    async fn get_product(&self, _id: Uuid) -> Option<Product> {
        self.product_to_return.clone()
    }
    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, RepoError> {
        Ok(Product {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            price: req.price,
            category_id: req.category_id,
            ..Product::default()
        })
    }
    async fn update_product(
        &self,
        _id: Uuid,
        _req: UpdateProductRequest,
    ) -> Result<Option<Product>, RepoError> {
        Ok(self.update_found.then(Product::default))
    }
    async fn delete_product(&self, _id: Uuid) -> bool {
        self.delete_result
    }

    // --- Settings ---
    async fn get_settings(&self) -> Vec<Setting> {
        vec![]
    }
    async fn get_setting(&self, _key: &str) -> Option<Setting> {
        self.setting_to_return.clone()
    }
    async fn create_setting(&self, req: CreateSettingRequest) -> Result<Setting, RepoError> {
        if let Some(field) = self.create_conflict {
            return Err(RepoError::Duplicate(field));
        }
        Ok(Setting {
            key: req.key,
            value: req.value,
            ..Setting::default()
        })
    }
    async fn update_setting(&self, key: &str, value: String) -> Option<Setting> {
        self.update_found.then(|| Setting {
            key: key.to_string(),
            value,
            ..Setting::default()
        })
    }
    async fn delete_setting(&self, _key: &str) -> bool {
        self.delete_result
    }
}

// --- TEST UTILITIES ---

const TEST_ID: Uuid = Uuid::from_u128(123);

// Creates an AppState using mock components
fn create_test_state(repo_control: MockRepoControl) -> AppState {
    AppState {
        repo: Arc::new(repo_control),
        config: AppConfig::default(),
    }
}

fn register_payload() -> RegisterRequest {
    RegisterRequest {
        name: "Ada".to_string(),
        email: "Ada@Example.com".to_string(),
        password: "pw123456".to_string(),
        password_confirmation: "pw123456".to_string(),
    }
}

/// Asserts the error is a 422 carrying a message for the given field.
fn assert_field_error(err: ApiError, field: &str) {
    match err {
        ApiError::Validation(errors) => {
            assert!(errors.contains(field), "expected a field error on {field}")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

// --- AUTH HANDLER TESTS ---

#[test]
async fn test_register_success_normalizes_email_and_hashes_password() {
    let state = create_test_state(MockRepoControl::default());

    let result = handlers::register(State(state), Json(register_payload())).await;

    let (status, Json(user)) = result.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    // The handler lowercases the address before persistence.
    assert_eq!(user.email, "ada@example.com");
    // What reached the repository is a bcrypt digest of the plaintext, not the plaintext.
    assert_ne!(user.password_hash, "pw123456");
    assert!(bcrypt::verify("pw123456", &user.password_hash).unwrap());
}

#[test]
async fn test_register_duplicate_email_is_a_field_error() {
    let state = create_test_state(MockRepoControl {
        user_by_email: Some(User::default()),
        ..MockRepoControl::default()
    });

    let result = handlers::register(State(state), Json(register_payload())).await;

    assert_field_error(result.unwrap_err(), "email");
}

#[test]
async fn test_register_rejects_invalid_payload_with_all_field_errors() {
    let state = create_test_state(MockRepoControl::default());

    let payload = RegisterRequest {
        name: "  ".to_string(),
        email: "not-an-email".to_string(),
        password: "short".to_string(),
        password_confirmation: "different".to_string(),
    };

    let err = handlers::register(State(state), Json(payload)).await.unwrap_err();
    match err {
        ApiError::Validation(errors) => {
            assert!(errors.contains("name"));
            assert!(errors.contains("email"));
            assert!(errors.contains("password"));
            assert!(errors.contains("password_confirmation"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
async fn test_login_success_returns_token_bundle() {
    let config = AppConfig::default();
    let stored = User {
        id: TEST_ID,
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        password_hash: bcrypt::hash("pw123456", config.bcrypt_cost).unwrap(),
        ..User::default()
    };

    let state = create_test_state(MockRepoControl {
        user_by_email: Some(stored),
        ..MockRepoControl::default()
    });
    let expected_expiry = state.config.token_ttl_minutes * 60;

    let payload = LoginRequest {
        email: "ada@example.com".to_string(),
        password: "pw123456".to_string(),
    };

    let Json(bundle) = handlers::login(State(state), Json(payload)).await.unwrap();
    assert_eq!(bundle.token_type, "bearer");
    assert_eq!(bundle.expires_in, expected_expiry);
    assert!(!bundle.access_token.is_empty());
}

#[test]
async fn test_login_wrong_password_is_generic_unauthorized() {
    let config = AppConfig::default();
    let stored = User {
        password_hash: bcrypt::hash("the-real-password", config.bcrypt_cost).unwrap(),
        ..User::default()
    };

    let state = create_test_state(MockRepoControl {
        user_by_email: Some(stored),
        ..MockRepoControl::default()
    });

    let payload = LoginRequest {
        email: "ada@example.com".to_string(),
        password: "a-guess".to_string(),
    };

    let err = handlers::login(State(state), Json(payload)).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[test]
async fn test_login_unknown_email_is_generic_unauthorized() {
    // Same 401 as a wrong password: the response must not reveal which was wrong.
    let state = create_test_state(MockRepoControl::default());

    let payload = LoginRequest {
        email: "nobody@example.com".to_string(),
        password: "whatever1".to_string(),
    };

    let err = handlers::login(State(state), Json(payload)).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[test]
async fn test_profile_returns_current_record() {
    let stored = User {
        id: TEST_ID,
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        ..User::default()
    };
    let state = create_test_state(MockRepoControl {
        user_to_return: Some(stored),
        ..MockRepoControl::default()
    });

    let auth = AuthUser {
        id: TEST_ID,
        email: "ada@example.com".to_string(),
    };

    let Json(user) = handlers::profile(auth, State(state)).await.unwrap();
    assert_eq!(user.id, TEST_ID);
    assert_eq!(user.name, "Ada");
}

// --- CRUD HANDLER TESTS ---

#[test]
async fn test_get_user_details_not_found() {
    let state = create_test_state(MockRepoControl::default());

    let result = handlers::get_user_details(State(state), Path(TEST_ID)).await;

    assert!(matches!(result, Err(ApiError::NotFound)));
}

#[test]
async fn test_create_user_requires_valid_payload() {
    let state = create_test_state(MockRepoControl::default());

    let payload = CreateUserRequest {
        name: "Bob".to_string(),
        email: "bob@example".to_string(),
        password: "longenough".to_string(),
    };

    let err = handlers::create_user(State(state), Json(payload)).await.unwrap_err();
    assert_field_error(err, "email");
}

#[test]
async fn test_create_user_maps_repository_conflict_to_field_error() {
    // The pre-insert check passed (no user_by_email), but the insert itself
    // hit the unique constraint: the race still ends as a 422, never a 500.
    let state = create_test_state(MockRepoControl {
        create_conflict: Some("email"),
        ..MockRepoControl::default()
    });

    let payload = CreateUserRequest {
        name: "Bob".to_string(),
        email: "bob@example.com".to_string(),
        password: "longenough".to_string(),
    };

    let err = handlers::create_user(State(state), Json(payload)).await.unwrap_err();
    assert_field_error(err, "email");
}

#[test]
async fn test_update_user_missing_row_is_not_found() {
    let state = create_test_state(MockRepoControl {
        update_found: false,
        ..MockRepoControl::default()
    });

    let payload = UpdateUserRequest {
        name: Some("Renamed".to_string()),
        email: None,
        password: None,
    };

    let result = handlers::update_user(State(state), Path(TEST_ID), Json(payload)).await;
    assert!(matches!(result, Err(ApiError::NotFound)));
}

#[test]
async fn test_delete_user_paths() {
    let state = create_test_state(MockRepoControl::default());
    let status = handlers::delete_user(State(state), Path(TEST_ID)).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let state = create_test_state(MockRepoControl {
        delete_result: false,
        ..MockRepoControl::default()
    });
    let result = handlers::delete_user(State(state), Path(TEST_ID)).await;
    assert!(matches!(result, Err(ApiError::NotFound)));
}

#[test]
async fn test_create_role_blank_name_rejected() {
    let state = create_test_state(MockRepoControl::default());

    let payload = CreateRoleRequest {
        name: "".to_string(),
        description: None,
    };

    let err = handlers::create_role(State(state), Json(payload)).await.unwrap_err();
    assert_field_error(err, "name");
}

#[test]
async fn test_create_product_with_unknown_category_rejected() {
    let state = create_test_state(MockRepoControl {
        category_to_return: None,
        ..MockRepoControl::default()
    });

    let payload = CreateProductRequest {
        name: "Widget".to_string(),
        description: None,
        price: 1999,
        category_id: Some(Uuid::new_v4()),
    };

    let err = handlers::create_product(State(state), Json(payload)).await.unwrap_err();
    assert_field_error(err, "category_id");
}

#[test]
async fn test_create_product_with_existing_category() {
    let state = create_test_state(MockRepoControl {
        category_to_return: Some(Category::default()),
        ..MockRepoControl::default()
    });

    let category_id = Uuid::new_v4();
    let payload = CreateProductRequest {
        name: "Widget".to_string(),
        description: Some("A fine widget".to_string()),
        price: 1999,
        category_id: Some(category_id),
    };

    let (status, Json(product)) = handlers::create_product(State(state), Json(payload))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product.price, 1999);
    assert_eq!(product.category_id, Some(category_id));
}

#[test]
async fn test_create_setting_duplicate_key_rejected() {
    let state = create_test_state(MockRepoControl {
        setting_to_return: Some(Setting::default()),
        ..MockRepoControl::default()
    });

    let payload = CreateSettingRequest {
        key: "site_name".to_string(),
        value: "My Shop".to_string(),
    };

    let err = handlers::create_setting(State(state), Json(payload)).await.unwrap_err();
    assert_field_error(err, "key");
}

#[test]
async fn test_update_setting_missing_key_is_not_found() {
    let state = create_test_state(MockRepoControl {
        update_found: false,
        ..MockRepoControl::default()
    });

    let payload = UpdateSettingRequest {
        value: "updated".to_string(),
    };

    let result =
        handlers::update_setting(State(state), Path("missing".to_string()), Json(payload)).await;
    assert!(matches!(result, Err(ApiError::NotFound)));
}

#[test]
async fn test_update_setting_replaces_value() {
    let state = create_test_state(MockRepoControl::default());

    let payload = UpdateSettingRequest {
        value: "updated".to_string(),
    };

    let Json(setting) =
        handlers::update_setting(State(state), Path("site_name".to_string()), Json(payload))
            .await
            .unwrap();
    assert_eq!(setting.key, "site_name");
    assert_eq!(setting.value, "updated");
}
