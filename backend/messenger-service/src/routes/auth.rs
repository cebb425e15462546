use crate::config::SessionConfig;
use crate::error::AppError;
use crate::middleware::guards::AuthenticatedUser;
use crate::models::PublicUser;
use crate::state::AppState;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn same_site(cfg: &SessionConfig) -> SameSite {
    // Browsers drop SameSite=None cookies that are not Secure
    if cfg.cookie_secure {
        SameSite::None
    } else {
        SameSite::Lax
    }
}

fn session_cookie(cfg: &SessionConfig, token: String) -> Cookie<'static> {
    Cookie::build(cfg.cookie_name.clone(), token)
        .path("/")
        .http_only(true)
        .secure(cfg.cookie_secure)
        .same_site(same_site(cfg))
        .max_age(CookieDuration::hours(cfg.ttl_hours))
        .finish()
}

fn removal_cookie(cfg: &SessionConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build(cfg.cookie_name.clone(), "")
        .path("/")
        .http_only(true)
        .secure(cfg.cookie_secure)
        .same_site(same_site(cfg))
        .finish();
    cookie.make_removal();
    cookie
}

/// Create an account
/// POST /auth/register
#[post("/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<CredentialsRequest>,
) -> Result<HttpResponse, AppError> {
    let user = state.auth.register(&body.username, &body.password).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "status": "success",
        "user": PublicUser::from(&user),
    })))
}

/// Log in and set the session cookie
/// POST /auth/login
#[post("/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<CredentialsRequest>,
) -> Result<HttpResponse, AppError> {
    let (user, token) = state.auth.login(&body.username, &body.password).await?;

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&state.config.session, token))
        .json(serde_json::json!({
            "status": "success",
            "user": PublicUser::from(&user),
        })))
}

/// GET /auth/current-user
#[get("/auth/current-user")]
pub async fn current_user(user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(PublicUser::from(&user.0)))
}

/// Clear the session cookie. Succeeds without a session.
/// POST /auth/logout
#[post("/auth/logout")]
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(removal_cookie(&state.config.session))
        .json(serde_json::json!({ "status": "success" }))
}
