use crate::error::AppError;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use error_types::error_codes;

pub mod auth;
pub mod contacts;
pub mod messages;
pub mod users;
pub mod wsroute;

/// Register every HTTP and WebSocket route plus extractor error handlers.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::validation(error_codes::INVALID_REQUEST, err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::validation(error_codes::INVALID_REQUEST, err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::validation(error_codes::INVALID_REQUEST, err.to_string()).into()
    }))
    .service(health)
    .service(auth::register)
    .service(auth::login)
    .service(auth::current_user)
    .service(auth::logout)
    .service(contacts::list_contacts)
    .service(contacts::incoming_contacts)
    .service(contacts::add_contact)
    .service(contacts::remove_contact)
    .service(contacts::get_relationship)
    .service(users::search_users)
    .service(messages::get_history)
    .service(messages::send_message)
    .service(wsroute::ws_handler);
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "online_users": state.registry.online_user_count().await,
        "live_connections": state.registry.connection_count().await,
    }))
}
