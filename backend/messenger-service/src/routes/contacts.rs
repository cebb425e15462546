use crate::error::{AppError, AppResult};
use crate::middleware::guards::AuthenticatedUser;
use crate::models::{RelationshipKind, User};
use crate::state::AppState;
use actix_web::{delete, get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
pub struct AddContactRequest {
    pub uuid: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub uuid: Uuid,
    pub username: String,
    pub relationship: RelationshipKind,
    /// Only reported for users the caller has added
    pub online: bool,
}

#[derive(Debug, Serialize)]
pub struct RelationshipResponse {
    pub uuid: Uuid,
    pub relationship: RelationshipKind,
}

async fn find_target(state: &AppState, uuid: Uuid) -> AppResult<User> {
    state
        .users
        .find_by_uuid(uuid)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

// ==================== Endpoints ====================

/// Contacts the caller has added
/// GET /contacts
#[get("/contacts")]
pub async fn list_contacts(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let edges = state.contacts.list_contacts(user.0.id).await?;
    let kinds: HashMap<i64, RelationshipKind> = edges.iter().copied().collect();
    let ids: Vec<i64> = edges.iter().map(|(id, _)| *id).collect();

    let users = state.users.find_many(&ids).await?;
    let uuids: Vec<Uuid> = users.iter().map(|u| u.uuid).collect();
    let online: HashSet<Uuid> = state.registry.online_among(&uuids).await.into_iter().collect();

    let contacts: Vec<ContactResponse> = users
        .into_iter()
        .map(|u| ContactResponse {
            relationship: kinds
                .get(&u.id)
                .copied()
                .unwrap_or(RelationshipKind::OneWayOutgoing),
            online: online.contains(&u.uuid),
            uuid: u.uuid,
            username: u.username,
        })
        .collect();

    Ok(HttpResponse::Ok().json(contacts))
}

/// Users who added the caller without being added back
/// GET /contacts/incoming
#[get("/contacts/incoming")]
pub async fn incoming_contacts(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let ids = state.contacts.incoming(user.0.id).await?;
    let users = state.users.find_many(&ids).await?;

    let pending: Vec<ContactResponse> = users
        .into_iter()
        .map(|u| ContactResponse {
            uuid: u.uuid,
            username: u.username,
            relationship: RelationshipKind::OneWayIncoming,
            online: false,
        })
        .collect();

    Ok(HttpResponse::Ok().json(pending))
}

/// Add a contact. 201 when created, 200 when it already existed.
/// POST /contacts
#[post("/contacts")]
pub async fn add_contact(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<AddContactRequest>,
) -> Result<HttpResponse, AppError> {
    let target = find_target(&state, body.uuid).await?;
    let created = state.contacts.add_contact(user.0.id, target.id).await?;
    let relationship = state.contacts.relationship_kind(user.0.id, target.id).await?;

    let contact = ContactResponse {
        online: state.registry.is_online(target.uuid).await,
        uuid: target.uuid,
        username: target.username,
        relationship,
    };

    if created {
        Ok(HttpResponse::Created().json(contact))
    } else {
        Ok(HttpResponse::Ok().json(contact))
    }
}

/// Remove a contact; the reverse edge is kept.
/// DELETE /contacts/{uuid}
#[delete("/contacts/{uuid}")]
pub async fn remove_contact(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if let Some(target) = state.users.find_by_uuid(path.into_inner()).await? {
        state.contacts.remove_contact(user.0.id, target.id).await?;
    }
    Ok(HttpResponse::NoContent().finish())
}

/// GET /contacts/{uuid}/relationship
#[get("/contacts/{uuid}/relationship")]
pub async fn get_relationship(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let target = find_target(&state, path.into_inner()).await?;
    let relationship = state.contacts.relationship_kind(user.0.id, target.id).await?;

    Ok(HttpResponse::Ok().json(RelationshipResponse {
        uuid: target.uuid,
        relationship,
    }))
}
