use local_business_directory::auth::hash_password;
use local_business_directory::database::Database;
use local_business_directory::models::{NewUser, Role};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL must be set in environment")?;
    let email = std::env::var("ADMIN_EMAIL")
        .unwrap_or_else(|_| "admin@example.com".into())
        .trim()
        .to_lowercase();
    let name = std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin".into());
    let password = std::env::var("ADMIN_PASSWORD")
        .map_err(|_| "ADMIN_PASSWORD must be set in environment")?;

    if password.len() < 6 {
        return Err("ADMIN_PASSWORD must be at least 6 characters".into());
    }

    println!("Connecting to database to provision admin '{}'...", email);
    let db = Database::connect(&database_url).await?;

    let password_hash = hash_password(&password).map_err(|err| err.to_string())?;
    let admin = db
        .upsert_admin(NewUser {
            name,
            email,
            password_hash,
            role: Role::Admin,
        })
        .await?;

    println!("Admin user '{}' ready (id {}).", admin.email, admin.id);
    Ok(())
}
