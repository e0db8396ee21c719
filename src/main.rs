use std::io;

use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};

use tracker_backend::config::AppConfig;
use tracker_backend::routes;
use tracker_backend::state::AppState;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::other(e)
    })?;
    let state = AppState::connect(&config).await.map_err(|e| {
        error!("Failed to create pool: {}", e);
        io::Error::other(e)
    })?;

    if let Some(seed) = &config.seed_user {
        state
            .auth
            .ensure_user(&seed.username, &seed.password)
            .await
            .map_err(|e| {
                error!("Failed to seed user {}: {}", seed.username, e);
                io::Error::other(e)
            })?;
        info!("Seed user {} is available", seed.username);
    }

    let state = web::Data::new(state);
    info!("Server running at http://{}", config.server_address);

    HttpServer::new(move || {
        App::new()
            .wrap(routes::routes::cors())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(routes::routes::json_config())
            .configure(routes::routes::configure)
    })
    .bind(&config.server_address)?
    .run()
    .await
}
