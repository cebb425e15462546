use crate::error::AppError;
use crate::middleware::guards::AuthenticatedUser;
use crate::models::RelationshipKind;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

const DEFAULT_SEARCH_LIMIT: i64 = 20;
const MAX_SEARCH_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub uuid: Uuid,
    pub username: String,
    pub relationship: RelationshipKind,
    /// Present only when the caller holds an edge to this user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
}

/// Username prefix search, excluding the caller
/// GET /users/search?q=
#[get("/users/search")]
pub async fn search_users(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let prefix = query.q.trim();
    if prefix.is_empty() {
        return Ok(HttpResponse::Ok().json(Vec::<SearchResult>::new()));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let found = state.users.search(prefix, user.0.id, limit).await?;

    let ids: Vec<i64> = found.iter().map(|u| u.id).collect();
    let kinds = state.contacts.relationship_kinds(user.0.id, &ids).await?;

    let watched: Vec<Uuid> = found
        .iter()
        .zip(&kinds)
        .filter(|(_, kind)| kind.is_outgoing())
        .map(|(u, _)| u.uuid)
        .collect();
    let online: HashSet<Uuid> = state.registry.online_among(&watched).await.into_iter().collect();

    let results: Vec<SearchResult> = found
        .into_iter()
        .zip(kinds)
        .map(|(u, relationship)| SearchResult {
            online: relationship.is_outgoing().then(|| online.contains(&u.uuid)),
            uuid: u.uuid,
            username: u.username,
            relationship,
        })
        .collect();

    Ok(HttpResponse::Ok().json(results))
}
