use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthenticatedActor, JwtService, MaybeActor};
use crate::database::DirectoryStore;
use crate::error::DirectoryError;
use crate::models::{
    ApiResponse, ApprovalRequest, AuthPayload, CategoryRequest, CreateBusinessRequest,
    FeaturedQuery, ListBusinessesQuery, LocationRequest, LoginRequest, NewUser, RegisterRequest,
    Role, UpdateBusinessRequest, UserProfile,
};
use crate::policy::{self, Action};
use crate::storage::ImageStore;
use crate::workflow::ApprovalWorkflow;

type HandlerResult = Result<HttpResponse, DirectoryError>;

/// Registers every route plus extractor error handlers on the given scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        DirectoryError::invalid("body", format!("Invalid request body: {err}")).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        DirectoryError::invalid("query", format!("Invalid query string: {err}")).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        DirectoryError::invalid("id", format!("Invalid path parameter: {err}")).into()
    }))
    // Health
    .service(health_check)
    // Auth
    .service(register)
    .service(login)
    .service(current_user)
    // Businesses (static segments before `{business_id}`)
    .service(list_businesses)
    .service(featured_businesses)
    .service(my_businesses)
    .service(get_business)
    .service(create_business)
    .service(update_business)
    .service(delete_business)
    .service(set_approval)
    // Categories
    .service(list_categories)
    .service(list_categories_with_count)
    .service(get_category)
    .service(create_category)
    .service(update_category)
    .service(delete_category)
    // Locations
    .service(list_locations)
    .service(list_locations_with_count)
    .service(get_location)
    .service(create_location)
    .service(update_location)
    .service(delete_location);
}

fn internal(context: &str, err: impl std::fmt::Display) -> DirectoryError {
    DirectoryError::Internal(format!("{context}: {err}"))
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "local-business-directory",
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// AUTH
// ============================================================================

#[post("/auth/register")]
pub async fn register(
    store: web::Data<dyn DirectoryStore>,
    jwt: web::Data<JwtService>,
    payload: web::Json<RegisterRequest>,
) -> HandlerResult {
    let body = payload.into_inner();
    body.validate()?;

    let password = body.password;
    let password_hash = web::block(move || hash_password(&password))
        .await
        .map_err(|err| internal("Password hashing was cancelled", err))?
        .map_err(|err| internal("Failed to hash password", err))?;

    let user = store
        .create_user(NewUser {
            name: body.name.trim().to_string(),
            email: body.email.trim().to_lowercase(),
            password_hash,
            role: Role::User,
        })
        .await?;

    let token = jwt
        .create_token(user.id, user.role)
        .map_err(|err| internal("Failed to issue token", err))?;

    log::info!("Registered user {}", user.id);
    Ok(HttpResponse::Created().json(
        ApiResponse::success(AuthPayload {
            token,
            user: UserProfile::from(user),
        })
        .with_message("User registered successfully"),
    ))
}

#[post("/auth/login")]
pub async fn login(
    store: web::Data<dyn DirectoryStore>,
    jwt: web::Data<JwtService>,
    payload: web::Json<LoginRequest>,
) -> HandlerResult {
    let body = payload.into_inner();
    body.validate()?;

    let invalid = || DirectoryError::unauthorized("Invalid credentials");
    let user = store
        .find_user_by_email(body.email.trim())
        .await?
        .ok_or_else(invalid)?;

    let password = body.password;
    let stored_hash = user.password_hash.clone();
    let matches = web::block(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|err| internal("Password check was cancelled", err))?;
    if !matches {
        return Err(invalid());
    }

    let token = jwt
        .create_token(user.id, user.role)
        .map_err(|err| internal("Failed to issue token", err))?;

    Ok(HttpResponse::Ok().json(
        ApiResponse::success(AuthPayload {
            token,
            user: UserProfile::from(user),
        })
        .with_message("Login successful"),
    ))
}

#[get("/auth/me")]
pub async fn current_user(
    store: web::Data<dyn DirectoryStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> HandlerResult {
    let user = store
        .find_user_by_id(actor.id)
        .await?
        .ok_or(DirectoryError::NotFound("User"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(UserProfile::from(user))))
}

// ============================================================================
// BUSINESSES
// ============================================================================

#[get("/businesses")]
pub async fn list_businesses(
    workflow: web::Data<ApprovalWorkflow>,
    MaybeActor(actor): MaybeActor,
    query: web::Query<ListBusinessesQuery>,
) -> HandlerResult {
    let filters = query.into_inner().into_filters();
    let page = workflow.list_visible(filters, actor.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::paginated(page.items, page.pagination)))
}

#[get("/businesses/featured")]
pub async fn featured_businesses(
    workflow: web::Data<ApprovalWorkflow>,
    query: web::Query<FeaturedQuery>,
) -> HandlerResult {
    let businesses = workflow.featured(query.limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(businesses)))
}

#[get("/businesses/user/my-businesses")]
pub async fn my_businesses(
    workflow: web::Data<ApprovalWorkflow>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> HandlerResult {
    let businesses = workflow.list_owned(&actor).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(businesses)))
}

#[get("/businesses/{business_id}")]
pub async fn get_business(
    workflow: web::Data<ApprovalWorkflow>,
    MaybeActor(actor): MaybeActor,
    business_id: web::Path<i64>,
) -> HandlerResult {
    let business = workflow.get(business_id.into_inner(), actor.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(business)))
}

#[post("/businesses")]
pub async fn create_business(
    workflow: web::Data<ApprovalWorkflow>,
    AuthenticatedActor(actor): AuthenticatedActor,
    payload: web::Json<CreateBusinessRequest>,
) -> HandlerResult {
    let business = workflow.submit(payload.into_inner(), &actor).await?;
    let message = if business.is_approved {
        "Business created successfully"
    } else {
        "Business submitted for approval"
    };
    Ok(HttpResponse::Created().json(ApiResponse::success(business).with_message(message)))
}

#[put("/businesses/{business_id}")]
pub async fn update_business(
    workflow: web::Data<ApprovalWorkflow>,
    images: web::Data<ImageStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
    business_id: web::Path<i64>,
    payload: web::Json<UpdateBusinessRequest>,
) -> HandlerResult {
    let edited = workflow
        .edit(business_id.into_inner(), payload.into_inner(), &actor)
        .await?;

    if let Some(previous) = &edited.replaced_image {
        images.release(previous).await;
    }

    Ok(HttpResponse::Ok().json(
        ApiResponse::success(edited.business).with_message("Business updated successfully"),
    ))
}

#[delete("/businesses/{business_id}")]
pub async fn delete_business(
    workflow: web::Data<ApprovalWorkflow>,
    images: web::Data<ImageStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
    business_id: web::Path<i64>,
) -> HandlerResult {
    let removed = workflow.remove(business_id.into_inner(), &actor).await?;

    if let Some(image) = &removed.released_image {
        images.release(image).await;
    }

    Ok(HttpResponse::Ok().json(
        ApiResponse::success(serde_json::json!({ "id": removed.business.id }))
            .with_message("Business deleted successfully"),
    ))
}

#[patch("/businesses/{business_id}/approve")]
pub async fn set_approval(
    workflow: web::Data<ApprovalWorkflow>,
    AuthenticatedActor(actor): AuthenticatedActor,
    business_id: web::Path<i64>,
    payload: web::Json<ApprovalRequest>,
) -> HandlerResult {
    let approved = payload.is_approved;
    let business = workflow
        .set_approval(business_id.into_inner(), approved, &actor)
        .await?;
    let message = if approved {
        "Business approved successfully"
    } else {
        "Business rejected"
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(business).with_message(message)))
}

// ============================================================================
// CATEGORIES
// ============================================================================

#[get("/categories")]
pub async fn list_categories(store: web::Data<dyn DirectoryStore>) -> HandlerResult {
    let categories = store.list_categories().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(categories)))
}

#[get("/categories/with-count")]
pub async fn list_categories_with_count(store: web::Data<dyn DirectoryStore>) -> HandlerResult {
    let categories = store.list_categories_with_count().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(categories)))
}

#[get("/categories/{category_id}")]
pub async fn get_category(
    store: web::Data<dyn DirectoryStore>,
    category_id: web::Path<i64>,
) -> HandlerResult {
    let category = store
        .get_category(category_id.into_inner())
        .await?
        .ok_or(DirectoryError::NotFound("Category"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(category)))
}

#[post("/categories")]
pub async fn create_category(
    store: web::Data<dyn DirectoryStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
    payload: web::Json<CategoryRequest>,
) -> HandlerResult {
    policy::enforce(Some(&actor), Action::ManageTaxonomy, None)?;
    let body = payload.into_inner();
    body.validate()?;

    let category = store.create_category(body.into_fields()).await?;
    log::info!("Category {} created by admin {}", category.id, actor.id);
    Ok(HttpResponse::Created()
        .json(ApiResponse::success(category).with_message("Category created successfully")))
}

#[put("/categories/{category_id}")]
pub async fn update_category(
    store: web::Data<dyn DirectoryStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
    category_id: web::Path<i64>,
    payload: web::Json<CategoryRequest>,
) -> HandlerResult {
    policy::enforce(Some(&actor), Action::ManageTaxonomy, None)?;
    let body = payload.into_inner();
    body.validate()?;

    let category = store
        .update_category(category_id.into_inner(), body.into_fields())
        .await?
        .ok_or(DirectoryError::NotFound("Category"))?;
    Ok(HttpResponse::Ok()
        .json(ApiResponse::success(category).with_message("Category updated successfully")))
}

#[delete("/categories/{category_id}")]
pub async fn delete_category(
    store: web::Data<dyn DirectoryStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
    category_id: web::Path<i64>,
) -> HandlerResult {
    policy::enforce(Some(&actor), Action::ManageTaxonomy, None)?;
    let category_id = category_id.into_inner();

    if !store.delete_category(category_id).await? {
        return Err(DirectoryError::NotFound("Category"));
    }
    log::info!("Category {} deleted by admin {}", category_id, actor.id);
    Ok(HttpResponse::Ok().json(
        ApiResponse::success(serde_json::json!({ "id": category_id }))
            .with_message("Category deleted successfully"),
    ))
}

// ============================================================================
// LOCATIONS
// ============================================================================

#[get("/locations")]
pub async fn list_locations(store: web::Data<dyn DirectoryStore>) -> HandlerResult {
    let locations = store.list_locations().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(locations)))
}

#[get("/locations/with-count")]
pub async fn list_locations_with_count(store: web::Data<dyn DirectoryStore>) -> HandlerResult {
    let locations = store.list_locations_with_count().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(locations)))
}

#[get("/locations/{location_id}")]
pub async fn get_location(
    store: web::Data<dyn DirectoryStore>,
    location_id: web::Path<i64>,
) -> HandlerResult {
    let location = store
        .get_location(location_id.into_inner())
        .await?
        .ok_or(DirectoryError::NotFound("Location"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(location)))
}

#[post("/locations")]
pub async fn create_location(
    store: web::Data<dyn DirectoryStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
    payload: web::Json<LocationRequest>,
) -> HandlerResult {
    policy::enforce(Some(&actor), Action::ManageTaxonomy, None)?;
    let body = payload.into_inner();
    body.validate()?;

    let location = store.create_location(body.into_fields()).await?;
    log::info!("Location {} created by admin {}", location.id, actor.id);
    Ok(HttpResponse::Created()
        .json(ApiResponse::success(location).with_message("Location created successfully")))
}

#[put("/locations/{location_id}")]
pub async fn update_location(
    store: web::Data<dyn DirectoryStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
    location_id: web::Path<i64>,
    payload: web::Json<LocationRequest>,
) -> HandlerResult {
    policy::enforce(Some(&actor), Action::ManageTaxonomy, None)?;
    let body = payload.into_inner();
    body.validate()?;

    let location = store
        .update_location(location_id.into_inner(), body.into_fields())
        .await?
        .ok_or(DirectoryError::NotFound("Location"))?;
    Ok(HttpResponse::Ok()
        .json(ApiResponse::success(location).with_message("Location updated successfully")))
}

#[delete("/locations/{location_id}")]
pub async fn delete_location(
    store: web::Data<dyn DirectoryStore>,
    AuthenticatedActor(actor): AuthenticatedActor,
    location_id: web::Path<i64>,
) -> HandlerResult {
    policy::enforce(Some(&actor), Action::ManageTaxonomy, None)?;
    let location_id = location_id.into_inner();

    if !store.delete_location(location_id).await? {
        return Err(DirectoryError::NotFound("Location"));
    }
    log::info!("Location {} deleted by admin {}", location_id, actor.id);
    Ok(HttpResponse::Ok().json(
        ApiResponse::success(serde_json::json!({ "id": location_id }))
            .with_message("Location deleted successfully"),
    ))
}
