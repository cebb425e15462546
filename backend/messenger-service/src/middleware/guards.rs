//! Request guards resolving the session cookie to a user

use std::future::Future;
use std::pin::Pin;

use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;
use actix_web::{web, Error, FromRequest, HttpRequest};

/// Session token from the configured cookie, if present.
pub fn session_token(req: &HttpRequest, cookie_name: &str) -> Option<String> {
    req.cookie(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// The user behind the request's session cookie
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = state
            .as_ref()
            .and_then(|s| session_token(req, &s.config.session.cookie_name));

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                tracing::error!("AppState missing from app data");
                AppError::Internal
            })?;
            let user = state.binder.authenticate(token.as_deref()).await?;
            Ok(AuthenticatedUser(user))
        })
    }
}
