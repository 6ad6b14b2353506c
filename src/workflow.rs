//! Business approval workflow.
//!
//! A business is either pending or approved. Admin submissions start out
//! approved, everyone else's start pending, and only admins can move a
//! business between the two states afterwards. Content edits never touch the
//! approval flag.

use std::sync::Arc;

use validator::Validate;

use crate::auth::Actor;
use crate::database::DirectoryStore;
use crate::error::DirectoryError;
use crate::models::{
    ApprovalState, Business, BusinessDetail, BusinessFilters, CreateBusinessRequest, Page,
    Pagination, UpdateBusinessRequest,
};
use crate::policy::{self, Action};

pub const DEFAULT_FEATURED_LIMIT: i64 = 6;
pub const MAX_FEATURED_LIMIT: i64 = 24;

/// Result of a content edit.
#[derive(Debug, Clone)]
pub struct Edited {
    pub business: Business,
    /// Previous image reference when the edit replaced it.
    pub replaced_image: Option<String>,
}

/// Result of a removal.
#[derive(Debug, Clone)]
pub struct Removed {
    pub business: Business,
    /// Image reference the deleted row pointed at, for the caller to release.
    pub released_image: Option<String>,
}

#[derive(Clone)]
pub struct ApprovalWorkflow {
    store: Arc<dyn DirectoryStore>,
}

impl ApprovalWorkflow {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        request: CreateBusinessRequest,
        actor: &Actor,
    ) -> Result<Business, DirectoryError> {
        policy::enforce(Some(actor), Action::Submit, None)?;
        request.validate()?;
        self.ensure_references(request.category_id, request.location_id)
            .await?;

        let auto_approve = actor.is_admin();
        let business = self
            .store
            .insert_business(request.into_new_business(actor.id, auto_approve))
            .await?;

        log::info!(
            "Business {} submitted by user {} ({:?})",
            business.id,
            actor.id,
            business.approval_state()
        );
        Ok(business)
    }

    /// Idempotent: setting the current state again succeeds and only bumps
    /// `updated_at`.
    pub async fn set_approval(
        &self,
        business_id: i64,
        approved: bool,
        actor: &Actor,
    ) -> Result<Business, DirectoryError> {
        policy::enforce(Some(actor), Action::SetApproval, None)?;

        let business = self
            .store
            .set_business_approval(business_id, approved)
            .await?
            .ok_or(DirectoryError::NotFound("Business"))?;

        log::info!(
            "Business {} set to {:?} by admin {}",
            business.id,
            ApprovalState::from(approved),
            actor.id
        );
        Ok(business)
    }

    pub async fn edit(
        &self,
        business_id: i64,
        request: UpdateBusinessRequest,
        actor: &Actor,
    ) -> Result<Edited, DirectoryError> {
        let existing = self.load(business_id).await?;
        policy::enforce(Some(actor), Action::Edit, Some(existing.owner_id))?;

        request.validate()?;
        self.ensure_references(request.category_id, request.location_id)
            .await?;

        let patch = request.into_patch();
        let replaced_image = match (&patch.image_url, &existing.image_url) {
            (Some(new), Some(old)) if new != old => Some(old.clone()),
            _ => None,
        };

        let business = self
            .store
            .update_business_content(business_id, patch)
            .await?
            .ok_or(DirectoryError::NotFound("Business"))?;

        log::info!("Business {} edited by user {}", business.id, actor.id);
        Ok(Edited {
            business,
            replaced_image,
        })
    }

    pub async fn remove(&self, business_id: i64, actor: &Actor) -> Result<Removed, DirectoryError> {
        let existing = self.load(business_id).await?;
        policy::enforce(Some(actor), Action::Remove, Some(existing.owner_id))?;

        let business = self
            .store
            .delete_business(business_id)
            .await?
            .ok_or(DirectoryError::NotFound("Business"))?;

        log::info!("Business {} removed by user {}", business.id, actor.id);
        Ok(Removed {
            released_image: business.image_url.clone(),
            business,
        })
    }

    /// Public listing. Lifting the approval filter is reserved for admins.
    pub async fn list_visible(
        &self,
        filters: BusinessFilters,
        actor: Option<&Actor>,
    ) -> Result<Page<BusinessDetail>, DirectoryError> {
        if !filters.approved_only {
            policy::enforce(actor, Action::ListAll, None)?;
        }

        let (items, total) = self.store.list_businesses(&filters).await?;
        Ok(Page {
            items,
            pagination: Pagination::new(filters.page, filters.limit, total),
        })
    }

    /// Pending businesses are only visible to their owner and to admins.
    pub async fn get(
        &self,
        business_id: i64,
        actor: Option<&Actor>,
    ) -> Result<BusinessDetail, DirectoryError> {
        let detail = self
            .store
            .get_business_detail(business_id)
            .await?
            .ok_or(DirectoryError::NotFound("Business"))?;

        let visible = detail.business.is_approved
            || actor.is_some_and(|a| a.is_admin() || a.id == detail.business.owner_id);
        if !visible {
            return Err(DirectoryError::NotFound("Business"));
        }
        Ok(detail)
    }

    pub async fn list_owned(&self, actor: &Actor) -> Result<Vec<Business>, DirectoryError> {
        policy::enforce(Some(actor), Action::ListOwned, None)?;
        Ok(self.store.list_businesses_for_owner(actor.id).await?)
    }

    pub async fn featured(&self, limit: Option<i64>) -> Result<Vec<BusinessDetail>, DirectoryError> {
        let limit = limit
            .unwrap_or(DEFAULT_FEATURED_LIMIT)
            .clamp(1, MAX_FEATURED_LIMIT);
        Ok(self.store.featured_businesses(limit).await?)
    }

    async fn load(&self, business_id: i64) -> Result<Business, DirectoryError> {
        self.store
            .get_business(business_id)
            .await?
            .ok_or(DirectoryError::NotFound("Business"))
    }

    async fn ensure_references(
        &self,
        category_id: Option<i64>,
        location_id: Option<i64>,
    ) -> Result<(), DirectoryError> {
        if let Some(id) = category_id {
            if self.store.get_category(id).await?.is_none() {
                return Err(DirectoryError::invalid("category_id", "Category does not exist"));
            }
        }
        if let Some(id) = location_id {
            if self.store.get_location(id).await?.is_none() {
                return Err(DirectoryError::invalid("location_id", "Location does not exist"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryStore;
    use crate::models::{CategoryFields, LocationFields, NewUser, Role};

    struct Fixture {
        workflow: ApprovalWorkflow,
        owner: Actor,
        stranger: Actor,
        admin: Actor,
        category_id: i64,
        location_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());

        let mut actors = Vec::new();
        for (email, role) in [
            ("owner@example.com", Role::User),
            ("stranger@example.com", Role::BusinessOwner),
            ("admin@example.com", Role::Admin),
        ] {
            let user = store
                .create_user(NewUser {
                    name: email.into(),
                    email: email.into(),
                    password_hash: "hash".into(),
                    role,
                })
                .await
                .unwrap();
            actors.push(Actor::new(user.id, role));
        }

        let category = store
            .create_category(CategoryFields {
                name: "Restaurants & Food".into(),
                description: None,
                icon: None,
            })
            .await
            .unwrap();
        let location = store
            .create_location(LocationFields {
                name: "Gasabo".into(),
                description: None,
            })
            .await
            .unwrap();

        Fixture {
            workflow: ApprovalWorkflow::new(store),
            owner: actors[0],
            stranger: actors[1],
            admin: actors[2],
            category_id: category.id,
            location_id: location.id,
        }
    }

    fn draft(fx: &Fixture) -> CreateBusinessRequest {
        CreateBusinessRequest {
            name: Some("Cafe X".into()),
            description: Some("desc".into()),
            phone: Some("123".into()),
            category_id: Some(fx.category_id),
            location_id: Some(fx.location_id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn non_admin_submissions_start_pending() {
        let fx = fixture().await;
        for actor in [fx.owner, fx.stranger] {
            let business = fx.workflow.submit(draft(&fx), &actor).await.unwrap();
            assert!(!business.is_approved);
            assert_eq!(business.owner_id, actor.id);
        }
    }

    #[tokio::test]
    async fn admin_submissions_are_auto_approved() {
        let fx = fixture().await;
        let business = fx.workflow.submit(draft(&fx), &fx.admin).await.unwrap();
        assert!(business.is_approved);
        assert_eq!(business.approval_state(), ApprovalState::Approved);
    }

    #[tokio::test]
    async fn submit_names_the_invalid_field() {
        let fx = fixture().await;
        let mut request = draft(&fx);
        request.phone = None;
        match fx.workflow.submit(request, &fx.owner).await {
            Err(DirectoryError::InvalidInput { field, .. }) => assert_eq!(field, "phone"),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut request = draft(&fx);
        request.category_id = Some(999);
        match fx.workflow.submit(request, &fx.owner).await {
            Err(DirectoryError::InvalidInput { field, .. }) => assert_eq!(field, "category_id"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn approval_then_listing_round_trip() {
        let fx = fixture().await;
        let business = fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();

        let page = fx
            .workflow
            .list_visible(BusinessFilters::default(), None)
            .await
            .unwrap();
        assert!(page.items.is_empty());

        let approved = fx
            .workflow
            .set_approval(business.id, true, &fx.admin)
            .await
            .unwrap();
        assert!(approved.is_approved);

        let page = fx
            .workflow
            .list_visible(BusinessFilters::default(), None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].business.id, business.id);
        assert_eq!(page.items[0].category_name.as_deref(), Some("Restaurants & Food"));
        assert_eq!(page.pagination.total, 1);
    }

    #[tokio::test]
    async fn set_approval_is_idempotent() {
        let fx = fixture().await;
        let business = fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();

        let first = fx
            .workflow
            .set_approval(business.id, true, &fx.admin)
            .await
            .unwrap();
        let second = fx
            .workflow
            .set_approval(business.id, true, &fx.admin)
            .await
            .unwrap();
        assert!(first.is_approved && second.is_approved);
        assert_eq!(first.name, second.name);

        let revoked = fx
            .workflow
            .set_approval(business.id, false, &fx.admin)
            .await
            .unwrap();
        assert_eq!(revoked.approval_state(), ApprovalState::Pending);
    }

    #[tokio::test]
    async fn set_approval_requires_admin_and_existing_business() {
        let fx = fixture().await;
        let business = fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();

        assert!(matches!(
            fx.workflow.set_approval(business.id, true, &fx.owner).await,
            Err(DirectoryError::Forbidden(_))
        ));
        assert!(matches!(
            fx.workflow.set_approval(4242, true, &fx.admin).await,
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn edit_never_changes_approval_state() {
        let fx = fixture().await;
        let pending = fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();
        let approved = fx.workflow.submit(draft(&fx), &fx.admin).await.unwrap();

        let patch = UpdateBusinessRequest {
            name: Some("New name".into()),
            phone: Some("456".into()),
            ..Default::default()
        };
        let edited = fx
            .workflow
            .edit(pending.id, patch.clone(), &fx.owner)
            .await
            .unwrap();
        assert_eq!(edited.business.name, "New name");
        assert!(!edited.business.is_approved);

        let edited = fx.workflow.edit(approved.id, patch, &fx.admin).await.unwrap();
        assert!(edited.business.is_approved);
        assert_eq!(edited.business.owner_id, fx.admin.id);
    }

    #[tokio::test]
    async fn edit_and_remove_are_owner_or_admin_only() {
        let fx = fixture().await;
        let business = fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();

        let patch = UpdateBusinessRequest {
            description: Some("hijacked".into()),
            ..Default::default()
        };
        assert!(matches!(
            fx.workflow.edit(business.id, patch.clone(), &fx.stranger).await,
            Err(DirectoryError::Forbidden(_))
        ));
        assert!(matches!(
            fx.workflow.remove(business.id, &fx.stranger).await,
            Err(DirectoryError::Forbidden(_))
        ));

        assert!(fx.workflow.edit(business.id, patch, &fx.admin).await.is_ok());
        assert!(fx.workflow.remove(business.id, &fx.owner).await.is_ok());
        assert!(matches!(
            fx.workflow.remove(business.id, &fx.owner).await,
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn edit_reports_replaced_image_and_remove_reports_current_one() {
        let fx = fixture().await;
        let mut request = draft(&fx);
        request.image_url = Some("/uploads/business-old.png".into());
        let business = fx.workflow.submit(request, &fx.owner).await.unwrap();

        let edited = fx
            .workflow
            .edit(
                business.id,
                UpdateBusinessRequest {
                    image_url: Some("/uploads/business-new.png".into()),
                    ..Default::default()
                },
                &fx.owner,
            )
            .await
            .unwrap();
        assert_eq!(edited.replaced_image.as_deref(), Some("/uploads/business-old.png"));

        let removed = fx.workflow.remove(business.id, &fx.owner).await.unwrap();
        assert_eq!(removed.released_image.as_deref(), Some("/uploads/business-new.png"));
    }

    #[tokio::test]
    async fn blank_image_edit_keeps_existing_upload() {
        let fx = fixture().await;
        let mut request = draft(&fx);
        request.image_url = Some("/uploads/business-old.png".into());
        request.address = Some("KN 5 Rd".into());
        let business = fx.workflow.submit(request, &fx.owner).await.unwrap();

        let edited = fx
            .workflow
            .edit(
                business.id,
                UpdateBusinessRequest {
                    image_url: Some("  ".into()),
                    address: Some("".into()),
                    ..Default::default()
                },
                &fx.owner,
            )
            .await
            .unwrap();
        assert_eq!(edited.replaced_image, None);
        assert_eq!(
            edited.business.image_url.as_deref(),
            Some("/uploads/business-old.png")
        );
        assert_eq!(edited.business.address.as_deref(), Some("KN 5 Rd"));
    }

    #[tokio::test]
    async fn approved_only_listing_never_leaks_pending_rows() {
        let fx = fixture().await;
        for _ in 0..3 {
            fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();
        }
        let approved = fx.workflow.submit(draft(&fx), &fx.admin).await.unwrap();

        let page = fx
            .workflow
            .list_visible(BusinessFilters::default(), Some(&fx.admin))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].business.id, approved.id);
        assert!(page.items.iter().all(|d| d.business.is_approved));
    }

    #[tokio::test]
    async fn listing_all_states_is_admin_only() {
        let fx = fixture().await;
        fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();
        let filters = BusinessFilters {
            approved_only: false,
            ..Default::default()
        };

        assert!(matches!(
            fx.workflow.list_visible(filters.clone(), None).await,
            Err(DirectoryError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.workflow.list_visible(filters.clone(), Some(&fx.owner)).await,
            Err(DirectoryError::Forbidden(_))
        ));
        let page = fx
            .workflow
            .list_visible(filters, Some(&fx.admin))
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);
    }

    #[tokio::test]
    async fn listing_filters_search_and_paginates_newest_first() {
        let fx = fixture().await;
        let mut ids = Vec::new();
        for name in ["Alpha Salon", "Beta Bakery", "Gamma Bakery"] {
            let mut request = draft(&fx);
            request.name = Some(name.into());
            ids.push(fx.workflow.submit(request, &fx.admin).await.unwrap().id);
        }

        let page = fx
            .workflow
            .list_visible(
                BusinessFilters {
                    search: Some("bakery".into()),
                    limit: 1,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.items[0].business.id, ids[2]);

        let page = fx
            .workflow
            .list_visible(
                BusinessFilters {
                    category_id: Some(fx.category_id + 1000),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn pending_detail_is_hidden_from_strangers() {
        let fx = fixture().await;
        let business = fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();

        assert!(fx.workflow.get(business.id, Some(&fx.owner)).await.is_ok());
        assert!(fx.workflow.get(business.id, Some(&fx.admin)).await.is_ok());
        assert!(matches!(
            fx.workflow.get(business.id, Some(&fx.stranger)).await,
            Err(DirectoryError::NotFound(_))
        ));
        assert!(matches!(
            fx.workflow.get(business.id, None).await,
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn owners_see_all_their_businesses() {
        let fx = fixture().await;
        fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();
        let second = fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();
        fx.workflow.set_approval(second.id, true, &fx.admin).await.unwrap();
        fx.workflow.submit(draft(&fx), &fx.stranger).await.unwrap();

        let mine = fx.workflow.list_owned(&fx.owner).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id);
        assert!(mine.iter().all(|b| b.owner_id == fx.owner.id));
    }

    #[tokio::test]
    async fn featured_only_returns_approved_and_clamps_limit() {
        let fx = fixture().await;
        fx.workflow.submit(draft(&fx), &fx.owner).await.unwrap();
        for _ in 0..3 {
            fx.workflow.submit(draft(&fx), &fx.admin).await.unwrap();
        }

        let featured = fx.workflow.featured(Some(0)).await.unwrap();
        assert_eq!(featured.len(), 1);
        let featured = fx.workflow.featured(None).await.unwrap();
        assert_eq!(featured.len(), 3);
        assert!(featured.iter().all(|d| d.business.is_approved));
    }
}
