use crate::error::AppError;
use crate::middleware::guards::AuthenticatedUser;
use crate::models::{HistoryCursor, HistoryDirection, HistoryQuery, MessageView};
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub cursor: Option<String>,
    #[serde(default)]
    pub direction: HistoryDirection,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageView>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_uuid: String,
    pub text: String,
}

/// Conversation with another user, ascending
/// GET /messages/{uuid}?cursor=&direction=&limit=
#[get("/messages/{uuid}")]
pub async fn get_history(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    params: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    let history = &state.config.history;
    let limit = params
        .limit
        .unwrap_or(history.default_limit)
        .clamp(1, history.max_limit);

    let cursor = params
        .cursor
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(HistoryCursor::decode)
        .transpose()?;

    let query = HistoryQuery {
        cursor,
        direction: params.direction,
        limit,
    };
    let page = state.chat.history(&user.0, path.into_inner(), &query).await?;

    Ok(HttpResponse::Ok().json(HistoryResponse {
        messages: page.messages,
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}

/// Send over HTTP. All of the sender's live connections receive the echo.
/// POST /messages
#[post("/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let message = state
        .chat
        .send(&user.0, &body.recipient_uuid, &body.text, None)
        .await?;
    Ok(HttpResponse::Created().json(message))
}
