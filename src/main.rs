use std::net::SocketAddr;

use clap::Parser;
use portfolio_auth::cli::{
    Args, build_config, handle_create_admin, handle_seed_demo_users, init_logging,
    load_jwt_secret, open_database,
};
use portfolio_auth::create_app;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.users_file).await else {
        std::process::exit(1);
    };

    if args.seed_demo_users {
        if let Err(e) = handle_seed_demo_users(&db).await {
            error!(error = %e, "Failed to seed demo users");
            std::process::exit(1);
        }
    }

    if let Some(email) = args.create_admin.as_deref() {
        handle_create_admin(&db, email).await;
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(&args, db, jwt_secret);
    let app = create_app(&config);

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
