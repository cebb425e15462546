use crate::error::{AppError, AppResult};
use crate::models::RelationshipKind;
use crate::services::contact_store::ContactStore;
use error_types::error_codes;
use std::collections::HashSet;
use std::sync::Arc;

/// Contact graph rules on top of the directed edge store
///
/// `mutual` is never stored; it is derived from the two independent edges.
#[derive(Clone)]
pub struct ContactGraph {
    store: Arc<dyn ContactStore>,
}

impl ContactGraph {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    /// Add `owner -> target`. Idempotent; returns `true` when the edge is new.
    pub async fn add_contact(&self, owner_id: i64, target_id: i64) -> AppResult<bool> {
        if owner_id == target_id {
            return Err(AppError::validation(
                error_codes::INVALID_REQUEST,
                "cannot add yourself as a contact",
            ));
        }

        let created = self.store.insert_edge(owner_id, target_id).await?;
        tracing::debug!(owner_id, target_id, created, "add contact");
        Ok(created)
    }

    /// Remove `owner -> target` if present. The reverse edge is untouched.
    pub async fn remove_contact(&self, owner_id: i64, target_id: i64) -> AppResult<()> {
        let removed = self.store.delete_edge(owner_id, target_id).await?;
        tracing::debug!(owner_id, target_id, removed, "remove contact");
        Ok(())
    }

    pub async fn relationship_kind(&self, a: i64, b: i64) -> AppResult<RelationshipKind> {
        if a == b {
            return Ok(RelationshipKind::None);
        }
        let (a_to_b, b_to_a) = self.store.edges_between(a, b).await?;
        Ok(RelationshipKind::from_edges(a_to_b, b_to_a))
    }

    /// Everyone `owner` has added, labelled `OneWayOutgoing` or `Mutual`.
    pub async fn list_contacts(&self, owner_id: i64) -> AppResult<Vec<(i64, RelationshipKind)>> {
        let targets = self.store.targets_of(owner_id).await?;
        let added_me: HashSet<i64> = self.store.owners_of(owner_id).await?.into_iter().collect();

        Ok(targets
            .into_iter()
            .map(|t| (t, RelationshipKind::from_edges(true, added_me.contains(&t))))
            .collect())
    }

    /// Users who added `owner` and have not been added back.
    pub async fn incoming(&self, owner_id: i64) -> AppResult<Vec<i64>> {
        let mine: HashSet<i64> = self.store.targets_of(owner_id).await?.into_iter().collect();
        let owners = self.store.owners_of(owner_id).await?;
        Ok(owners.into_iter().filter(|o| !mine.contains(o)).collect())
    }

    /// Users entitled to observe `user_id`'s presence: everyone holding an edge to them.
    pub async fn watchers(&self, user_id: i64) -> AppResult<Vec<i64>> {
        self.store.owners_of(user_id).await
    }

    /// Users whose presence `user_id` may observe.
    pub async fn watched_by(&self, user_id: i64) -> AppResult<Vec<i64>> {
        self.store.targets_of(user_id).await
    }

    /// `relationship_kind(a, other)` for many `others` with two store reads.
    pub async fn relationship_kinds(&self, a: i64, others: &[i64]) -> AppResult<Vec<RelationshipKind>> {
        let outgoing: HashSet<i64> = self.store.targets_of(a).await?.into_iter().collect();
        let incoming: HashSet<i64> = self.store.owners_of(a).await?.into_iter().collect();

        Ok(others
            .iter()
            .map(|o| {
                if *o == a {
                    RelationshipKind::None
                } else {
                    RelationshipKind::from_edges(outgoing.contains(o), incoming.contains(o))
                }
            })
            .collect())
    }
}
