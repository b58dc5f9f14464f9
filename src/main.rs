mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use std::io;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::services::account_service::AccountService;
use crate::services::crypto_price_service::CryptoPriceService;
use crate::services::price_feed::{CoinGeckoFeed, PriceFeed};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Configuration
    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    // 2. Base de données + schéma
    info!("Connecting to database...");
    let db = db::establish_connection(&config.database_url)
        .await
        .map_err(|e| startup_error("Failed to connect to database", e))?;
    db::create_schema(&db)
        .await
        .map_err(|e| startup_error("Failed to create schema", e))?;
    info!("Database connected");

    // 3. Compte admin et prix de départ
    match &config.admin {
        Some(admin) => {
            let user = AccountService::ensure_admin(&db, admin)
                .await
                .map_err(|e| startup_error("Failed to bootstrap admin", e))?;
            info!("Admin account ready: {}", user.email);
        }
        None => warn!("ADMIN_EMAIL / ADMIN_PASSWORD not set, no admin account bootstrapped"),
    }

    if config.seed_crypto_prices {
        let seeded = CryptoPriceService::seed_defaults(&db)
            .await
            .map_err(|e| startup_error("Failed to seed crypto prices", e))?;
        if seeded > 0 {
            info!("Seeded {} default crypto prices", seeded);
        }
    }

    // 4. Flux de prix partagé
    let feed: Arc<dyn PriceFeed> = Arc::new(
        CoinGeckoFeed::new(&config.coingecko_url).map_err(|e| startup_error("Failed to build price feed", e))?,
    );
    let feed = web::Data::from(feed);

    let bind = (config.host.clone(), config.port);
    info!("Starting server on http://{}:{}", bind.0, bind.1);

    let config = web::Data::new(config);
    let db = web::Data::new(db);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(config.clone())
            .app_data(feed.clone())
            .configure(routes::configure_routes)
    })
    .bind(bind)?
    .run()
    .await
}
