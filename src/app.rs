//! Application assembly shared by the binary and the integration tests.

use actix_web::{web, HttpRequest};
use sqlx::SqlitePool;

use crate::{
    auth::{AuthMiddleware, TokenKeys},
    blob::SharedBlobStore,
    config::Config,
    error::AppError,
    repository::TaskRepository,
    routes::{self, forms::MAX_UPLOAD_BYTES, health, media},
    store::{CredentialStore, TaskStore},
};

const MAX_JSON_BYTES: usize = 256 * 1024;

/// Shared state handed to every worker.
#[derive(Clone)]
pub struct AppServices {
    pub pool: SqlitePool,
    pub blobs: SharedBlobStore,
    pub credentials: CredentialStore,
    pub tasks: TaskRepository,
    pub tokens: TokenKeys,
}

impl AppServices {
    pub fn new(pool: SqlitePool, blobs: SharedBlobStore, config: &Config) -> Self {
        Self::with_settings(
            pool,
            blobs,
            &config.jwt_secret,
            config.token_ttl_hours,
            config.bcrypt_cost,
        )
    }

    pub fn with_settings(
        pool: SqlitePool,
        blobs: SharedBlobStore,
        jwt_secret: &str,
        token_ttl_hours: i64,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            credentials: CredentialStore::new(pool.clone(), blobs.clone(), bcrypt_cost),
            tasks: TaskRepository::new(TaskStore::new(pool.clone()), blobs.clone()),
            tokens: TokenKeys::new(jwt_secret, token_ttl_hours),
            pool,
            blobs,
        }
    }
}

/// Registers app data, the public endpoints and the authenticated `/api` scope.
pub fn configure(cfg: &mut web::ServiceConfig, services: &AppServices) {
    cfg.app_data(web::Data::new(services.pool.clone()))
        .app_data(web::Data::new(services.credentials.clone()))
        .app_data(web::Data::new(services.tasks.clone()))
        .app_data(web::Data::new(services.tokens.clone()))
        .app_data(web::Data::from(services.blobs.clone()))
        .app_data(
            web::JsonConfig::default()
                .limit(MAX_JSON_BYTES)
                .error_handler(|err, _req: &HttpRequest| {
                    AppError::BadRequest(format!("Invalid request body: {}", err)).into()
                }),
        )
        .app_data(web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
            AppError::BadRequest(format!("Invalid query string: {}", err)).into()
        }))
        // Either<Json, Multipart> buffers the whole body before choosing a side.
        .app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES + MAX_JSON_BYTES))
        .service(health::health)
        .service(media::media)
        .service(
            web::scope("/api")
                .wrap(AuthMiddleware)
                .configure(routes::config),
        );
}
