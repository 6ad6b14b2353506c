//! Persistence for users, categories, locations and businesses.
//!
//! Every mutating method is a single atomic statement against the backing
//! store; callers never hold locks across calls.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Business, BusinessDetail, BusinessFilters, BusinessPatch, Category, CategoryFields,
    CategoryWithCount, Location, LocationFields, LocationWithCount, NewBusiness, NewUser, User,
};

pub use memory::InMemoryStore;
pub use postgres::Database;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Row is still referenced by at least one business.
    #[error("{0} is still referenced by one or more businesses")]
    InUse(&'static str),
    #[error("{0} already exists")]
    Duplicate(String),
    /// Foreign key on insert/update points at nothing.
    #[error("{0} does not reference an existing record")]
    MissingReference(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    // Users
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    // Categories
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn list_categories_with_count(&self) -> Result<Vec<CategoryWithCount>, StoreError>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError>;
    async fn create_category(&self, fields: CategoryFields) -> Result<Category, StoreError>;
    async fn update_category(
        &self,
        id: i64,
        fields: CategoryFields,
    ) -> Result<Option<Category>, StoreError>;
    /// Returns `Ok(false)` when no such category exists.
    async fn delete_category(&self, id: i64) -> Result<bool, StoreError>;

    // Locations
    async fn list_locations(&self) -> Result<Vec<Location>, StoreError>;
    async fn list_locations_with_count(&self) -> Result<Vec<LocationWithCount>, StoreError>;
    async fn get_location(&self, id: i64) -> Result<Option<Location>, StoreError>;
    async fn create_location(&self, fields: LocationFields) -> Result<Location, StoreError>;
    async fn update_location(
        &self,
        id: i64,
        fields: LocationFields,
    ) -> Result<Option<Location>, StoreError>;
    /// Returns `Ok(false)` when no such location exists.
    async fn delete_location(&self, id: i64) -> Result<bool, StoreError>;

    // Businesses
    async fn insert_business(&self, business: NewBusiness) -> Result<Business, StoreError>;
    async fn get_business(&self, id: i64) -> Result<Option<Business>, StoreError>;
    async fn get_business_detail(&self, id: i64) -> Result<Option<BusinessDetail>, StoreError>;
    async fn update_business_content(
        &self,
        id: i64,
        patch: BusinessPatch,
    ) -> Result<Option<Business>, StoreError>;
    async fn set_business_approval(
        &self,
        id: i64,
        is_approved: bool,
    ) -> Result<Option<Business>, StoreError>;
    /// Deletes and returns the removed row.
    async fn delete_business(&self, id: i64) -> Result<Option<Business>, StoreError>;
    /// Returns the requested page and the total number of matching rows.
    async fn list_businesses(
        &self,
        filters: &BusinessFilters,
    ) -> Result<(Vec<BusinessDetail>, i64), StoreError>;
    async fn list_businesses_for_owner(&self, owner_id: i64) -> Result<Vec<Business>, StoreError>;
    async fn featured_businesses(&self, limit: i64) -> Result<Vec<BusinessDetail>, StoreError>;
}
