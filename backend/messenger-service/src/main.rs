use actix_web::{web, App, HttpServer};
use messenger_service::{
    config, db, error, logging, routes,
    state::{AppState, Stores},
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let stores = match cfg.database_url.as_deref() {
        Some(url) => Stores::postgres(db::init_pool(url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage, nothing will persist");
            Stores::in_memory()
        }
    };

    let state = AppState::new(cfg.clone(), stores);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(
        %bind_addr,
        env = %cfg.app_env,
        presence_broadcast = cfg.presence_broadcast,
        "starting messenger-service"
    );

    let origins = cfg.cors_origins.clone();
    HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(actix_cors::Cors::default(), |cors, origin| {
                cors.allowed_origin(origin)
            })
            .supports_credentials()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(actix_middleware::AccessLog)
            .wrap(actix_middleware::RequestId::new())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind {bind_addr}: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run server: {e}")))
}
