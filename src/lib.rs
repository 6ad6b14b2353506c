pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod storage;
pub mod workflow;

use std::sync::Arc;

use actix_web::web;

use crate::auth::JwtService;
use crate::database::DirectoryStore;
use crate::storage::ImageStore;
use crate::workflow::ApprovalWorkflow;

/// Shared handles injected into every worker.
#[derive(Clone)]
pub struct AppState {
    store: web::Data<dyn DirectoryStore>,
    workflow: web::Data<ApprovalWorkflow>,
    jwt: web::Data<JwtService>,
    images: web::Data<ImageStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DirectoryStore>, jwt: JwtService, images: ImageStore) -> Self {
        Self {
            workflow: web::Data::new(ApprovalWorkflow::new(store.clone())),
            store: web::Data::from(store),
            jwt: web::Data::new(jwt),
            images: web::Data::new(images),
        }
    }

    /// Mounts application data and the `/api` routes.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.store.clone())
            .app_data(self.workflow.clone())
            .app_data(self.jwt.clone())
            .app_data(self.images.clone())
            .service(web::scope("/api").configure(handlers::configure));
    }
}
