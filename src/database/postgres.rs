use std::{borrow::Cow, time::Duration};

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, Executor, PgPool,
};

use super::{DirectoryStore, StoreError};
use crate::models::{
    Business, BusinessDetail, BusinessFilters, BusinessPatch, Category, CategoryFields,
    CategoryWithCount, Location, LocationFields, LocationWithCount, NewBusiness, NewUser, User,
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const INVALID_CATALOG_NAME: &str = "3D000";
const DUPLICATE_DATABASE: &str = "42P04";

/// PostgreSQL-backed directory store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = match pool_options().connect(database_url).await {
            Ok(pool) => pool,
            Err(sqlx::Error::Database(db_err))
                if db_err.code() == Some(Cow::Borrowed(INVALID_CATALOG_NAME)) =>
            {
                log::info!("Database missing, attempting to create it");
                create_database_if_missing(database_url).await?;
                pool_options().connect(database_url).await?
            }
            Err(err) => return Err(err),
        };

        // Run embedded migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        log::info!("Database connection established");
        Ok(Self { pool })
    }

    /// Creates an admin account, or promotes the existing account with that
    /// email to admin and resets its password.
    pub async fn upsert_admin(&self, user: NewUser) -> Result<User, StoreError> {
        let record = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, 'admin')
            ON CONFLICT (email) DO UPDATE
            SET
                name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                role = 'admin',
                updated_at = NOW()
            RETURNING id, name, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_before_acquire(true)
}

fn is_code(err: &sqlx::Error, code: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(code))
}

fn constraint_of(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint().map(str::to_string),
        _ => None,
    }
}

/// Maps constraint violations raised by inserts and updates.
fn write_error(err: sqlx::Error, duplicate: &str) -> StoreError {
    if is_code(&err, UNIQUE_VIOLATION) {
        return StoreError::Duplicate(duplicate.to_string());
    }
    if is_code(&err, FOREIGN_KEY_VIOLATION) {
        return match constraint_of(&err).as_deref() {
            Some("businesses_category_id_fkey") => StoreError::MissingReference("category_id"),
            Some("businesses_location_id_fkey") => StoreError::MissingReference("location_id"),
            _ => StoreError::MissingReference("owner_id"),
        };
    }
    StoreError::Database(err)
}

/// Maps the restrict-on-delete violation raised while businesses still point at a row.
fn delete_error(err: sqlx::Error, entity: &'static str) -> StoreError {
    if is_code(&err, FOREIGN_KEY_VIOLATION) {
        return StoreError::InUse(entity);
    }
    StoreError::Database(err)
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl DirectoryStore for Database {
    // ========================================================================
    // USERS
    // ========================================================================

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let NewUser {
            name,
            email,
            password_hash,
            role,
        } = user;

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| write_error(err, "A user with this email"))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let record = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let record = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let records = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, icon, created_at, updated_at
            FROM categories
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_categories_with_count(&self) -> Result<Vec<CategoryWithCount>, StoreError> {
        let records = sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT
                c.id,
                c.name,
                c.description,
                c.icon,
                c.created_at,
                c.updated_at,
                COUNT(b.id) AS business_count
            FROM categories c
            LEFT JOIN businesses b ON b.category_id = c.id AND b.is_approved = TRUE
            GROUP BY c.id
            ORDER BY c.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        let record = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, icon, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn create_category(&self, fields: CategoryFields) -> Result<Category, StoreError> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, icon)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, icon, created_at, updated_at
            "#,
        )
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.icon)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| write_error(err, "A category with this name"))
    }

    async fn update_category(
        &self,
        id: i64,
        fields: CategoryFields,
    ) -> Result<Option<Category>, StoreError> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = $2, description = $3, icon = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, icon, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.icon)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| write_error(err, "A category with this name"))
    }

    async fn delete_category(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM categories WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| delete_error(err, "category"))?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // LOCATIONS
    // ========================================================================

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let records = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM locations
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_locations_with_count(&self) -> Result<Vec<LocationWithCount>, StoreError> {
        let records = sqlx::query_as::<_, LocationWithCount>(
            r#"
            SELECT
                l.id,
                l.name,
                l.description,
                l.created_at,
                l.updated_at,
                COUNT(b.id) AS business_count
            FROM locations l
            LEFT JOIN businesses b ON b.location_id = l.id AND b.is_approved = TRUE
            GROUP BY l.id
            ORDER BY l.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, StoreError> {
        let record = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM locations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn create_location(&self, fields: LocationFields) -> Result<Location, StoreError> {
        sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO locations (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(fields.name)
        .bind(fields.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| write_error(err, "A location with this name"))
    }

    async fn update_location(
        &self,
        id: i64,
        fields: LocationFields,
    ) -> Result<Option<Location>, StoreError> {
        sqlx::query_as::<_, Location>(
            r#"
            UPDATE locations
            SET name = $2, description = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(fields.name)
        .bind(fields.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| write_error(err, "A location with this name"))
    }

    async fn delete_location(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM locations WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| delete_error(err, "location"))?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // BUSINESSES
    // ========================================================================

    async fn insert_business(&self, business: NewBusiness) -> Result<Business, StoreError> {
        let NewBusiness {
            owner_id,
            category_id,
            location_id,
            name,
            description,
            phone,
            email,
            address,
            image_url,
            is_approved,
        } = business;

        sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (
                owner_id,
                category_id,
                location_id,
                name,
                description,
                phone,
                email,
                address,
                image_url,
                is_approved
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING
                id,
                owner_id,
                category_id,
                location_id,
                name,
                description,
                phone,
                email,
                address,
                image_url,
                is_approved,
                created_at,
                updated_at
            "#,
        )
        .bind(owner_id)
        .bind(category_id)
        .bind(location_id)
        .bind(name)
        .bind(description)
        .bind(phone)
        .bind(email)
        .bind(address)
        .bind(image_url)
        .bind(is_approved)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| write_error(err, "Business"))
    }

    async fn get_business(&self, id: i64) -> Result<Option<Business>, StoreError> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            SELECT
                id,
                owner_id,
                category_id,
                location_id,
                name,
                description,
                phone,
                email,
                address,
                image_url,
                is_approved,
                created_at,
                updated_at
            FROM businesses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_business_detail(&self, id: i64) -> Result<Option<BusinessDetail>, StoreError> {
        let record = sqlx::query_as::<_, BusinessDetail>(
            r#"
            SELECT
                b.id,
                b.owner_id,
                b.category_id,
                b.location_id,
                b.name,
                b.description,
                b.phone,
                b.email,
                b.address,
                b.image_url,
                b.is_approved,
                b.created_at,
                b.updated_at,
                c.name AS category_name,
                l.name AS location_name
            FROM businesses b
            LEFT JOIN categories c ON c.id = b.category_id
            LEFT JOIN locations l ON l.id = b.location_id
            WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_business_content(
        &self,
        id: i64,
        patch: BusinessPatch,
    ) -> Result<Option<Business>, StoreError> {
        sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET
                category_id = COALESCE($2, category_id),
                location_id = COALESCE($3, location_id),
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                phone = COALESCE($6, phone),
                email = COALESCE($7, email),
                address = COALESCE($8, address),
                image_url = COALESCE($9, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id,
                owner_id,
                category_id,
                location_id,
                name,
                description,
                phone,
                email,
                address,
                image_url,
                is_approved,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(patch.category_id)
        .bind(patch.location_id)
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.phone)
        .bind(patch.email)
        .bind(patch.address)
        .bind(patch.image_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| write_error(err, "Business"))
    }

    async fn set_business_approval(
        &self,
        id: i64,
        is_approved: bool,
    ) -> Result<Option<Business>, StoreError> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET is_approved = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING
                id,
                owner_id,
                category_id,
                location_id,
                name,
                description,
                phone,
                email,
                address,
                image_url,
                is_approved,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(is_approved)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_business(&self, id: i64) -> Result<Option<Business>, StoreError> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            DELETE FROM businesses
            WHERE id = $1
            RETURNING
                id,
                owner_id,
                category_id,
                location_id,
                name,
                description,
                phone,
                email,
                address,
                image_url,
                is_approved,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_businesses(
        &self,
        filters: &BusinessFilters,
    ) -> Result<(Vec<BusinessDetail>, i64), StoreError> {
        let pattern = filters.search.as_deref().map(like_pattern);

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM businesses b
            WHERE (NOT $1::BOOLEAN OR b.is_approved)
              AND ($2::BIGINT IS NULL OR b.category_id = $2)
              AND ($3::BIGINT IS NULL OR b.location_id = $3)
              AND ($4::TEXT IS NULL OR b.name ILIKE $4 OR b.description ILIKE $4)
            "#,
        )
        .bind(filters.approved_only)
        .bind(filters.category_id)
        .bind(filters.location_id)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let records = sqlx::query_as::<_, BusinessDetail>(
            r#"
            SELECT
                b.id,
                b.owner_id,
                b.category_id,
                b.location_id,
                b.name,
                b.description,
                b.phone,
                b.email,
                b.address,
                b.image_url,
                b.is_approved,
                b.created_at,
                b.updated_at,
                c.name AS category_name,
                l.name AS location_name
            FROM businesses b
            LEFT JOIN categories c ON c.id = b.category_id
            LEFT JOIN locations l ON l.id = b.location_id
            WHERE (NOT $1::BOOLEAN OR b.is_approved)
              AND ($2::BIGINT IS NULL OR b.category_id = $2)
              AND ($3::BIGINT IS NULL OR b.location_id = $3)
              AND ($4::TEXT IS NULL OR b.name ILIKE $4 OR b.description ILIKE $4)
            ORDER BY b.created_at DESC, b.id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filters.approved_only)
        .bind(filters.category_id)
        .bind(filters.location_id)
        .bind(pattern.as_deref())
        .bind(filters.limit)
        .bind(filters.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((records, total))
    }

    async fn list_businesses_for_owner(&self, owner_id: i64) -> Result<Vec<Business>, StoreError> {
        let records = sqlx::query_as::<_, Business>(
            r#"
            SELECT
                id,
                owner_id,
                category_id,
                location_id,
                name,
                description,
                phone,
                email,
                address,
                image_url,
                is_approved,
                created_at,
                updated_at
            FROM businesses
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn featured_businesses(&self, limit: i64) -> Result<Vec<BusinessDetail>, StoreError> {
        let records = sqlx::query_as::<_, BusinessDetail>(
            r#"
            SELECT
                b.id,
                b.owner_id,
                b.category_id,
                b.location_id,
                b.name,
                b.description,
                b.phone,
                b.email,
                b.address,
                b.image_url,
                b.is_approved,
                b.created_at,
                b.updated_at,
                c.name AS category_name,
                l.name AS location_name
            FROM businesses b
            JOIN categories c ON c.id = b.category_id
            JOIN locations l ON l.id = b.location_id
            WHERE b.is_approved = TRUE
            ORDER BY RANDOM()
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    let options: PgConnectOptions = database_url.parse()?;
    let database_name = options
        .get_database()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "postgres".to_string());

    // Already pointed at the maintenance database.
    if database_name.eq_ignore_ascii_case("postgres") {
        return Ok(());
    }

    let maintenance_options = options.clone().database("postgres");
    let mut connection = sqlx::postgres::PgConnection::connect_with(&maintenance_options).await?;

    let escaped_name = database_name.replace('"', "\"\"");
    let create_stmt = format!("CREATE DATABASE \"{}\"", escaped_name);

    match connection.execute(create_stmt.as_str()).await {
        Ok(_) => {
            log::info!("Created database '{}'", database_name);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err))
            if db_err.code() == Some(Cow::Borrowed(DUPLICATE_DATABASE)) =>
        {
            log::info!("Database '{}' already exists", database_name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
