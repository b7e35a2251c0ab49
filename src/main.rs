use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, App, HttpServer};

use taskkeeper::{
    app::{self, AppServices},
    blob::{LocalBlobStore, SharedBlobStore},
    config::Config,
    db,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(to_io)?;
    let pool = db::connect(&config.database_url, config.database_max_connections)
        .await
        .map_err(to_io)?;
    db::migrate(&pool).await.map_err(to_io)?;

    let blobs: SharedBlobStore = Arc::new(LocalBlobStore::new(
        config.media_root.clone(),
        config.media_url.clone(),
    ));
    let services = AppServices::new(pool, blobs, &config);

    log::info!("Starting taskkeeper server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(|cfg| app::configure(cfg, &services))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}

fn to_io(e: taskkeeper::AppError) -> std::io::Error {
    log::error!("Startup failed: {}", e);
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}
