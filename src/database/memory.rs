use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{DirectoryStore, StoreError};
use crate::models::{
    Business, BusinessDetail, BusinessFilters, BusinessPatch, Category, CategoryFields,
    CategoryWithCount, Location, LocationFields, LocationWithCount, NewBusiness, NewUser, User,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    locations: BTreeMap<i64, Location>,
    businesses: BTreeMap<i64, Business>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn detail(&self, business: &Business) -> BusinessDetail {
        BusinessDetail {
            business: business.clone(),
            category_name: self
                .categories
                .get(&business.category_id)
                .map(|c| c.name.clone()),
            location_name: self
                .locations
                .get(&business.location_id)
                .map(|l| l.name.clone()),
        }
    }

    fn check_references(
        &self,
        category_id: Option<i64>,
        location_id: Option<i64>,
    ) -> Result<(), StoreError> {
        if let Some(id) = category_id {
            if !self.categories.contains_key(&id) {
                return Err(StoreError::MissingReference("category_id"));
            }
        }
        if let Some(id) = location_id {
            if !self.locations.contains_key(&id) {
                return Err(StoreError::MissingReference("location_id"));
            }
        }
        Ok(())
    }

    fn approved_count(&self, matches: impl Fn(&Business) -> bool) -> i64 {
        self.businesses
            .values()
            .filter(|b| b.is_approved && matches(b))
            .count() as i64
    }
}

/// Directory store kept entirely in process memory.
///
/// Mirrors the constraints of the relational schema (unique names and
/// emails, restrict-on-delete references) so behaviour matches the
/// PostgreSQL store.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(business: &Business, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    business.name.to_lowercase().contains(&needle)
        || business.description.to_lowercase().contains(&needle)
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Duplicate("A user with this email".into()));
        }

        let now = Utc::now();
        let record = User {
            id: tables.allocate_id(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let tables = self.tables.read().await;
        let mut records: Vec<_> = tables.categories.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn list_categories_with_count(&self) -> Result<Vec<CategoryWithCount>, StoreError> {
        let tables = self.tables.read().await;
        let mut records: Vec<_> = tables
            .categories
            .values()
            .map(|category| CategoryWithCount {
                business_count: tables.approved_count(|b| b.category_id == category.id),
                category: category.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(records)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn create_category(&self, fields: CategoryFields) -> Result<Category, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.categories.values().any(|c| c.name == fields.name) {
            return Err(StoreError::Duplicate("A category with this name".into()));
        }

        let now = Utc::now();
        let record = Category {
            id: tables.allocate_id(),
            name: fields.name,
            description: fields.description,
            icon: fields.icon,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_category(
        &self,
        id: i64,
        fields: CategoryFields,
    ) -> Result<Option<Category>, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .categories
            .values()
            .any(|c| c.id != id && c.name == fields.name)
        {
            return Err(StoreError::Duplicate("A category with this name".into()));
        }

        let Some(record) = tables.categories.get_mut(&id) else {
            return Ok(None);
        };
        record.name = fields.name;
        record.description = fields.description;
        record.icon = fields.icon;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete_category(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&id) {
            return Ok(false);
        }
        if tables.businesses.values().any(|b| b.category_id == id) {
            return Err(StoreError::InUse("category"));
        }
        tables.categories.remove(&id);
        Ok(true)
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let tables = self.tables.read().await;
        let mut records: Vec<_> = tables.locations.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn list_locations_with_count(&self) -> Result<Vec<LocationWithCount>, StoreError> {
        let tables = self.tables.read().await;
        let mut records: Vec<_> = tables
            .locations
            .values()
            .map(|location| LocationWithCount {
                business_count: tables.approved_count(|b| b.location_id == location.id),
                location: location.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.location.name.cmp(&b.location.name));
        Ok(records)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, StoreError> {
        Ok(self.tables.read().await.locations.get(&id).cloned())
    }

    async fn create_location(&self, fields: LocationFields) -> Result<Location, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.locations.values().any(|l| l.name == fields.name) {
            return Err(StoreError::Duplicate("A location with this name".into()));
        }

        let now = Utc::now();
        let record = Location {
            id: tables.allocate_id(),
            name: fields.name,
            description: fields.description,
            created_at: now,
            updated_at: now,
        };
        tables.locations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_location(
        &self,
        id: i64,
        fields: LocationFields,
    ) -> Result<Option<Location>, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .locations
            .values()
            .any(|l| l.id != id && l.name == fields.name)
        {
            return Err(StoreError::Duplicate("A location with this name".into()));
        }

        let Some(record) = tables.locations.get_mut(&id) else {
            return Ok(None);
        };
        record.name = fields.name;
        record.description = fields.description;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete_location(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.locations.contains_key(&id) {
            return Ok(false);
        }
        if tables.businesses.values().any(|b| b.location_id == id) {
            return Err(StoreError::InUse("location"));
        }
        tables.locations.remove(&id);
        Ok(true)
    }

    async fn insert_business(&self, business: NewBusiness) -> Result<Business, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_references(Some(business.category_id), Some(business.location_id))?;
        if !tables.users.contains_key(&business.owner_id) {
            return Err(StoreError::MissingReference("owner_id"));
        }

        let now = Utc::now();
        let record = Business {
            id: tables.allocate_id(),
            owner_id: business.owner_id,
            category_id: business.category_id,
            location_id: business.location_id,
            name: business.name,
            description: business.description,
            phone: business.phone,
            email: business.email,
            address: business.address,
            image_url: business.image_url,
            is_approved: business.is_approved,
            created_at: now,
            updated_at: now,
        };
        tables.businesses.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_business(&self, id: i64) -> Result<Option<Business>, StoreError> {
        Ok(self.tables.read().await.businesses.get(&id).cloned())
    }

    async fn get_business_detail(&self, id: i64) -> Result<Option<BusinessDetail>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.businesses.get(&id).map(|b| tables.detail(b)))
    }

    async fn update_business_content(
        &self,
        id: i64,
        patch: BusinessPatch,
    ) -> Result<Option<Business>, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_references(patch.category_id, patch.location_id)?;

        let Some(record) = tables.businesses.get_mut(&id) else {
            return Ok(None);
        };
        let BusinessPatch {
            category_id,
            location_id,
            name,
            description,
            phone,
            email,
            address,
            image_url,
        } = patch;

        if let Some(value) = category_id {
            record.category_id = value;
        }
        if let Some(value) = location_id {
            record.location_id = value;
        }
        if let Some(value) = name {
            record.name = value;
        }
        if let Some(value) = description {
            record.description = value;
        }
        if let Some(value) = phone {
            record.phone = value;
        }
        if email.is_some() {
            record.email = email;
        }
        if address.is_some() {
            record.address = address;
        }
        if image_url.is_some() {
            record.image_url = image_url;
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn set_business_approval(
        &self,
        id: i64,
        is_approved: bool,
    ) -> Result<Option<Business>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.businesses.get_mut(&id) else {
            return Ok(None);
        };
        record.is_approved = is_approved;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete_business(&self, id: i64) -> Result<Option<Business>, StoreError> {
        Ok(self.tables.write().await.businesses.remove(&id))
    }

    async fn list_businesses(
        &self,
        filters: &BusinessFilters,
    ) -> Result<(Vec<BusinessDetail>, i64), StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Business> = tables
            .businesses
            .values()
            .filter(|b| !filters.approved_only || b.is_approved)
            .filter(|b| filters.category_id.map_or(true, |id| b.category_id == id))
            .filter(|b| filters.location_id.map_or(true, |id| b.location_id == id))
            .filter(|b| {
                filters
                    .search
                    .as_deref()
                    .map_or(true, |needle| matches_search(b, needle))
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(filters.offset()).unwrap_or(usize::MAX))
            .take(filters.limit as usize)
            .map(|b| tables.detail(b))
            .collect();
        Ok((page, total))
    }

    async fn list_businesses_for_owner(&self, owner_id: i64) -> Result<Vec<Business>, StoreError> {
        let tables = self.tables.read().await;
        let mut records: Vec<_> = tables
            .businesses
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    /// Most recent approved businesses; no randomness so tests stay deterministic.
    async fn featured_businesses(&self, limit: i64) -> Result<Vec<BusinessDetail>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .businesses
            .values()
            .rev()
            .filter(|b| b.is_approved)
            .take(limit.max(0) as usize)
            .map(|b| tables.detail(b))
            .collect())
    }
}
