use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A registered account. `id` is internal and never serialized to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Wire representation of a user
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub username: String,
    pub uuid: Uuid,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            uuid: user.uuid,
        }
    }
}
