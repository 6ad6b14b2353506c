use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// ============================================================================
// ENUMS
// ============================================================================

/// Account role (this is also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    BusinessOwner,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Visibility of a business in public listings.
///
/// There is deliberately no rejected state: turning approval off puts a
/// business back into `Pending`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
}

impl From<bool> for ApprovalState {
    fn from(is_approved: bool) -> Self {
        if is_approved {
            ApprovalState::Approved
        } else {
            ApprovalState::Pending
        }
    }
}

// ============================================================================
// USERS
// ============================================================================

/// User row. The password hash never leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper struct used when inserting a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Public view of a user returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// Token plus profile returned by register and login
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserProfile,
}

// ============================================================================
// CATEGORIES & LOCATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category with the number of approved businesses filed under it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub business_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Location with the number of approved businesses in it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LocationWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub location: Location,
    pub business_count: i64,
}

/// Payload for creating or updating a category (admin only)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(
        required(message = "Please provide a category name"),
        length(max = 100),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub icon: Option<String>,
}

/// Payload for creating or updating a location (admin only)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(
        required(message = "Please provide a location name"),
        length(max = 100),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Validated category fields ready for persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFields {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// Validated location fields ready for persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFields {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryRequest {
    pub fn into_fields(self) -> CategoryFields {
        CategoryFields {
            name: self.name.unwrap_or_default().trim().to_string(),
            description: none_if_blank(self.description),
            icon: none_if_blank(self.icon),
        }
    }
}

impl LocationRequest {
    pub fn into_fields(self) -> LocationFields {
        LocationFields {
            name: self.name.unwrap_or_default().trim().to_string(),
            description: none_if_blank(self.description),
        }
    }
}

// ============================================================================
// BUSINESSES
// ============================================================================

/// Business listing row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Business {
    pub id: i64,
    pub owner_id: i64,
    pub category_id: i64,
    pub location_id: i64,
    pub name: String,
    pub description: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    pub fn approval_state(&self) -> ApprovalState {
        ApprovalState::from(self.is_approved)
    }
}

/// Business joined with its category and location names
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub business: Business,
    pub category_name: Option<String>,
    pub location_name: Option<String>,
}

/// Helper for creating new business
#[derive(Debug, Clone)]
pub struct NewBusiness {
    pub owner_id: i64,
    pub category_id: i64,
    pub location_id: i64,
    pub name: String,
    pub description: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub is_approved: bool,
}

/// Content changes applied to an existing business.
///
/// Only fields that are `Some` are written. Ownership and approval state are
/// not representable here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessPatch {
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub image_url: Option<String>,
}

/// Payload sent to submit a business
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateBusinessRequest {
    #[validate(required, length(max = 100), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(required, custom(function = "not_blank"))]
    pub description: Option<String>,
    #[validate(required, length(max = 20), custom(function = "not_blank"))]
    pub phone: Option<String>,
    #[validate(email, length(max = 100))]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(required, range(min = 1))]
    pub category_id: Option<i64>,
    #[validate(required, range(min = 1))]
    pub location_id: Option<i64>,
    #[validate(length(max = 255))]
    pub image_url: Option<String>,
}

impl CreateBusinessRequest {
    /// Call after `validate()` succeeded; required fields are known present.
    pub fn into_new_business(self, owner_id: i64, is_approved: bool) -> NewBusiness {
        NewBusiness {
            owner_id,
            category_id: self.category_id.unwrap_or_default(),
            location_id: self.location_id.unwrap_or_default(),
            name: self.name.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            phone: self.phone.unwrap_or_default().trim().to_string(),
            email: none_if_blank(self.email),
            address: none_if_blank(self.address),
            image_url: none_if_blank(self.image_url),
            is_approved,
        }
    }
}

/// Partial update of a business' content
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBusinessRequest {
    #[validate(length(max = 100), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub description: Option<String>,
    #[validate(length(max = 20), custom(function = "not_blank"))]
    pub phone: Option<String>,
    #[validate(email, length(max = 100))]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(range(min = 1))]
    pub category_id: Option<i64>,
    #[validate(range(min = 1))]
    pub location_id: Option<i64>,
    #[validate(length(max = 255))]
    pub image_url: Option<String>,
}

impl UpdateBusinessRequest {
    pub fn into_patch(self) -> BusinessPatch {
        BusinessPatch {
            category_id: self.category_id,
            location_id: self.location_id,
            name: self.name.map(|v| v.trim().to_string()),
            description: self.description.map(|v| v.trim().to_string()),
            phone: self.phone.map(|v| v.trim().to_string()),
            // Blank optional fields leave the stored value alone.
            email: none_if_blank(self.email),
            address: none_if_blank(self.address),
            image_url: none_if_blank(self.image_url),
        }
    }
}

/// Admin approval toggle
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequest {
    pub is_approved: bool,
}

// ============================================================================
// LISTING FILTERS & PAGINATION
// ============================================================================

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Normalised filters for business listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessFilters {
    pub page: i64,
    pub limit: i64,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub search: Option<String>,
    pub approved_only: bool,
}

impl Default for BusinessFilters {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            category_id: None,
            location_id: None,
            search: None,
            approved_only: true,
        }
    }
}

impl BusinessFilters {
    /// Saturates instead of overflowing on absurd page numbers.
    pub fn offset(&self) -> i64 {
        self.page
            .saturating_sub(1)
            .max(0)
            .saturating_mul(self.limit)
    }
}

/// Query string accepted by `GET /businesses`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBusinessesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<i64>,
    pub location: Option<i64>,
    pub search: Option<String>,
    pub approved_only: Option<String>,
}

impl ListBusinessesQuery {
    pub fn into_filters(self) -> BusinessFilters {
        BusinessFilters {
            page: self.page.unwrap_or(1).max(1),
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            category_id: self.category,
            location_id: self.location,
            search: none_if_blank(self.search),
            // Only an explicit "false" lifts the approval filter.
            approved_only: !matches!(self.approved_only.as_deref(), Some("false")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// One page of results plus its pagination metadata
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<i64>,
}

// ============================================================================
// AUTH DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub name: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

// ============================================================================
// RESPONSE ENVELOPE
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            pagination: None,
            timestamp: Utc::now(),
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::success(data)
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            message: None,
            pagination: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
