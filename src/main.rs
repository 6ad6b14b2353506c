use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, App, HttpServer};

use local_business_directory::auth::JwtService;
use local_business_directory::config::AppConfig;
use local_business_directory::database::Database;
use local_business_directory::storage::ImageStore;
use local_business_directory::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|err| {
        log::error!("Invalid configuration: {err}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
    })?;

    let db = Database::connect(&config.database_url).await.map_err(|err| {
        log::error!("Failed to initialize database: {err:?}");
        std::io::Error::new(std::io::ErrorKind::Other, err)
    })?;

    let images = ImageStore::new(&config.uploads_dir);
    if let Err(err) = images.ensure_root().await {
        log::error!(
            "Failed to create uploads directory {}: {err}",
            images.root().display()
        );
    }

    let jwt = JwtService::new(
        &config.jwt_secret,
        config.jwt_issuer.clone(),
        config.jwt_expires_in_hours,
    );
    let state = AppState::new(Arc::new(db), jwt, images);
    let bind_address = config.bind_address();

    log::info!("🚀 Starting Local Business Directory API on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let state = state.clone();
        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .configure(move |cfg| state.configure(cfg))
    })
    .bind(&bind_address)?
    .run()
    .await
}
