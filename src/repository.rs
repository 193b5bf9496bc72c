use crate::models::{
    Category, CreateCategoryRequest, CreatePermissionRequest, CreateProductRequest,
    CreateRoleRequest, CreateSettingRequest, Permission, Product, Role, Setting,
    UpdateCategoryRequest, UpdatePermissionRequest, UpdateProductRequest, UpdateRoleRequest,
    User, UserChanges,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// RepoError
///
/// Persistence failures that the handler layer must tell apart. Constraint
/// violations carry the offending field so they can be rendered as 422
/// field errors; anything else stays an opaque database failure (logged,
/// surfaced as 500).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),
    #[error("unknown reference for {0}")]
    ForeignKey(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Maps a write error onto the constraint that broke, when one did.
fn constraint_error(
    e: sqlx::Error,
    unique_field: &'static str,
    fk_field: Option<&'static str>,
) -> RepoError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return RepoError::Duplicate(unique_field);
        }
        if db.is_foreign_key_violation() {
            if let Some(field) = fk_field {
                return RepoError::ForeignKey(field);
            }
        }
    }
    RepoError::Database(e)
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing the handlers to interact with
/// the data layer without knowing the specific implementation (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable and usable across Axum's asynchronous
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_users(&self) -> Vec<User>;
    async fn get_user(&self, id: Uuid) -> Option<User>;
    // Login path: resolves the stored credential record for an e-mail.
    async fn get_user_by_email(&self, email: &str) -> Option<User>;
    // The caller supplies the bcrypt digest; plaintext never reaches this layer.
    async fn create_user(
        &self,
        name: String,
        email: String,
        password_hash: String,
    ) -> Result<User, RepoError>;
    // Partial update via COALESCE. Ok(None) means the row does not exist.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError>;
    async fn delete_user(&self, id: Uuid) -> bool;

    // --- Roles ---
    async fn get_roles(&self) -> Vec<Role>;
    async fn get_role(&self, id: Uuid) -> Option<Role>;
    async fn create_role(&self, req: CreateRoleRequest) -> Result<Role, RepoError>;
    async fn update_role(
        &self,
        id: Uuid,
        req: UpdateRoleRequest,
    ) -> Result<Option<Role>, RepoError>;
    async fn delete_role(&self, id: Uuid) -> bool;

    // --- Permissions ---
    async fn get_permissions(&self) -> Vec<Permission>;
    async fn get_permission(&self, id: Uuid) -> Option<Permission>;
    async fn create_permission(
        &self,
        req: CreatePermissionRequest,
    ) -> Result<Permission, RepoError>;
    async fn update_permission(
        &self,
        id: Uuid,
        req: UpdatePermissionRequest,
    ) -> Result<Option<Permission>, RepoError>;
    async fn delete_permission(&self, id: Uuid) -> bool;

    // --- Categories ---
    async fn get_categories(&self) -> Vec<Category>;
    async fn get_category(&self, id: Uuid) -> Option<Category>;
    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, RepoError>;
    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, RepoError>;
    async fn delete_category(&self, id: Uuid) -> bool;

    // --- Products ---
    async fn get_products(&self) -> Vec<Product>;
    async fn get_product(&self, id: Uuid) -> Option<Product>;
    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, RepoError>;
    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> Result<Option<Product>, RepoError>;
    async fn delete_product(&self, id: Uuid) -> bool;

    // --- Settings ---
    async fn get_settings(&self) -> Vec<Setting>;
    async fn get_setting(&self, key: &str) -> Option<Setting>;
    async fn create_setting(&self, req: CreateSettingRequest) -> Result<Setting, RepoError>;
    // Value-only update; None means the key does not exist.
    async fn update_setting(&self, key: &str, value: String) -> Option<Setting>;
    async fn delete_setting(&self, key: &str) -> bool;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
/// All queries use runtime binding (`query_as::<_, T>` + `bind`), so the crate
/// compiles without a reachable database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_users(&self) -> Vec<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at, updated_at \
             FROM users ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_users error: {:?}", e);
            vec![]
        })
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user error: {:?}", e);
            None
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user_by_email error: {:?}", e);
            None
        })
    }

    /// create_user
    ///
    /// Inserts a new user row. A unique violation on the e-mail column is
    /// reported as `RepoError::Duplicate("email")` so the handler can render a
    /// field error rather than a 500. This also covers the race where two
    /// registrations for the same address pass the pre-insert check together.
    async fn create_user(
        &self,
        name: String,
        email: String,
        password_hash: String,
    ) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) \
             RETURNING id, name, email, password_hash, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "email", None))
    }

    /// update_user
    ///
    /// Uses the PostgreSQL `COALESCE` function to efficiently handle `Option<T>`
    /// fields, only updating a column if the corresponding field is `Some`.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError> {
        sqlx::query_as::<_, User>(
            "UPDATE users \
             SET name = COALESCE($2, name), \
                 email = COALESCE($3, email), \
                 password_hash = COALESCE($4, password_hash), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, name, email, password_hash, created_at, updated_at",
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "email", None))
    }

    async fn delete_user(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_user error: {:?}", e);
                false
            }
        }
    }

    // --- ROLES ---

    async fn get_roles(&self) -> Vec<Role> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_roles error: {:?}", e);
            vec![]
        })
    }

    async fn get_role(&self, id: Uuid) -> Option<Role> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_role error: {:?}", e);
            None
        })
    }

    async fn create_role(&self, req: CreateRoleRequest) -> Result<Role, RepoError> {
        sqlx::query_as::<_, Role>(
            "INSERT INTO roles (id, name, description, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "name", None))
    }

    async fn update_role(
        &self,
        id: Uuid,
        req: UpdateRoleRequest,
    ) -> Result<Option<Role>, RepoError> {
        sqlx::query_as::<_, Role>(
            "UPDATE roles \
             SET name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "name", None))
    }

    async fn delete_role(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_role error: {:?}", e);
                false
            }
        }
    }

    // --- PERMISSIONS ---

    async fn get_permissions(&self) -> Vec<Permission> {
        sqlx::query_as::<_, Permission>(
            "SELECT id, name, description, created_at, updated_at \
             FROM permissions ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_permissions error: {:?}", e);
            vec![]
        })
    }

    async fn get_permission(&self, id: Uuid) -> Option<Permission> {
        sqlx::query_as::<_, Permission>(
            "SELECT id, name, description, created_at, updated_at \
             FROM permissions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_permission error: {:?}", e);
            None
        })
    }

    async fn create_permission(
        &self,
        req: CreatePermissionRequest,
    ) -> Result<Permission, RepoError> {
        sqlx::query_as::<_, Permission>(
            "INSERT INTO permissions (id, name, description, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "name", None))
    }

    async fn update_permission(
        &self,
        id: Uuid,
        req: UpdatePermissionRequest,
    ) -> Result<Option<Permission>, RepoError> {
        sqlx::query_as::<_, Permission>(
            "UPDATE permissions \
             SET name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "name", None))
    }

    async fn delete_permission(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_permission error: {:?}", e);
                false
            }
        }
    }

    // --- CATEGORIES ---

    async fn get_categories(&self) -> Vec<Category> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at, updated_at \
             FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_categories error: {:?}", e);
            vec![]
        })
    }

    async fn get_category(&self, id: Uuid) -> Option<Category> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at, updated_at \
             FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_category error: {:?}", e);
            None
        })
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, RepoError> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, description, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, RepoError> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories \
             SET name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from)
    }

    async fn delete_category(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_category error: {:?}", e);
                false
            }
        }
    }

    // --- PRODUCTS ---

    async fn get_products(&self) -> Vec<Product> {
        sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price, category_id, created_at, updated_at \
             FROM products ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_products error: {:?}", e);
            vec![]
        })
    }

    async fn get_product(&self, id: Uuid) -> Option<Product> {
        sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price, category_id, created_at, updated_at \
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_product error: {:?}", e);
            None
        })
    }

    /// create_product
    ///
    /// A foreign-key violation on `category_id` is mapped to a field error;
    /// the handler pre-checks the category, so hitting it here means the
    /// category was deleted concurrently.
    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, RepoError> {
        sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, name, description, price, category_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
             RETURNING id, name, description, price, category_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.description)
        .bind(req.price)
        .bind(req.category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "name", Some("category_id")))
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> Result<Option<Product>, RepoError> {
        sqlx::query_as::<_, Product>(
            "UPDATE products \
             SET name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 price = COALESCE($4, price), \
                 category_id = COALESCE($5, category_id), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, name, description, price, category_id, created_at, updated_at",
        )
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .bind(req.price)
        .bind(req.category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "name", Some("category_id")))
    }

    async fn delete_product(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_product error: {:?}", e);
                false
            }
        }
    }

    // --- SETTINGS ---

    async fn get_settings(&self) -> Vec<Setting> {
        sqlx::query_as::<_, Setting>(
            "SELECT key, value, created_at, updated_at FROM settings ORDER BY key ASC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_settings error: {:?}", e);
            vec![]
        })
    }

    async fn get_setting(&self, key: &str) -> Option<Setting> {
        sqlx::query_as::<_, Setting>(
            "SELECT key, value, created_at, updated_at FROM settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_setting error: {:?}", e);
            None
        })
    }

    async fn create_setting(&self, req: CreateSettingRequest) -> Result<Setting, RepoError> {
        sqlx::query_as::<_, Setting>(
            "INSERT INTO settings (key, value, created_at, updated_at) \
             VALUES ($1, $2, NOW(), NOW()) \
             RETURNING key, value, created_at, updated_at",
        )
        .bind(req.key)
        .bind(req.value)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "key", None))
    }

    async fn update_setting(&self, key: &str, value: String) -> Option<Setting> {
        sqlx::query_as::<_, Setting>(
            "UPDATE settings SET value = $2, updated_at = NOW() WHERE key = $1 \
             RETURNING key, value, created_at, updated_at",
        )
        .bind(key)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_setting error: {:?}", e);
            None
        })
    }

    async fn delete_setting(&self, key: &str) -> bool {
        match sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_setting error: {:?}", e);
                false
            }
        }
    }
}
