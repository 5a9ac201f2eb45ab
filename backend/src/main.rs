use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod services;

use config::Config;
use services::clock::SystemClock;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(e)
    })?;

    log::info!(
        "Starting server at {}:{} (challenge timezone {})",
        config.host,
        config.port,
        config.timezone
    );

    let pool = db::connect(&config.database_url).await.map_err(|e| {
        log::error!("Failed to open database: {}", e);
        std::io::Error::other(e)
    })?;

    let bind_addr = (config.host.clone(), config.port);
    let cors_origins = config.cors_origins.clone();

    let app_state = web::Data::new(models::AppState {
        db: pool,
        config,
        clock: Arc::new(SystemClock),
    });

    HttpServer::new(move || {
        let allowed_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origin_str = origin.to_str().unwrap_or("");
                allowed_origins.iter().any(|allowed| origin_str == allowed)
            })
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(handlers::configure_routes)
            .default_service(web::route().to(handlers::not_found))
    })
    .bind(bind_addr)?
    .run()
    .await
}
