//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, StoreError};
use crate::identity::{Role, email_local_part};
use crate::jwt::{ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS};
use crate::rate_limit::{DEFAULT_LOGIN_PER_MINUTE, DEFAULT_REGISTER_PER_MINUTE, RateLimitConfig};
use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

const GENERATED_PASSWORD_LENGTH: usize = 20;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "portfolio-auth",
    about = "Authentication service for the portfolio dashboard"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to the JSON user file
    #[arg(short, long, env = "USERS_FILE", default_value = "data/users.json")]
    pub users_file: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Set the Secure flag on the refresh cookie (enable behind HTTPS)
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = ACCESS_TOKEN_DURATION_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub access_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = REFRESH_TOKEN_DURATION_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_ttl: u64,

    /// Login attempts allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_LOGIN_PER_MINUTE)]
    pub login_rate_limit: u32,

    /// Registrations allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_REGISTER_PER_MINUTE)]
    pub register_rate_limit: u32,

    /// Create an admin account with this email on startup and print its password
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Seed demo accounts when the user file is empty
    #[arg(long)]
    pub seed_demo_users: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Random alphanumeric password for generated accounts.
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Handle `--create-admin`: create the admin account or report that it exists.
pub async fn handle_create_admin(db: &Database, email: &str) {
    if let Some(existing) = db.users().get_by_email(email).await {
        println!();
        println!(
            "User already exists: {} (role: {})",
            existing.email, existing.role
        );
        println!();
        return;
    }

    let password = generate_password();
    let name = email_local_part(email).to_string();
    match db.users().create(email, &password, &name, Role::Admin).await {
        Ok(record) => {
            info!(user_id = %record.id, "Admin user created");
            println!();
            println!("Admin user created: {}", record.email);
            println!("Password: {}", password);
            println!();
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}

/// Handle `--seed-demo-users`.
pub async fn handle_seed_demo_users(db: &Database) -> Result<(), StoreError> {
    let added = db.users().seed_demo_users().await?;
    if added > 0 {
        info!(count = added, "Seeded demo users");
    }
    Ok(())
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        secure_cookies: args.secure_cookies,
        access_ttl: args.access_ttl,
        refresh_ttl: args.refresh_ttl,
        rate_limit: RateLimitConfig::new(args.login_rate_limit, args.register_rate_limit),
    }
}

/// Open the user file, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, users = db.users().count().await, "User store opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open user store");
            None
        }
    }
}
