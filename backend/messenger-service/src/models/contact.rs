use serde::{Deserialize, Serialize};

/// Classification of the two directed edges between users `a` and `b`,
/// seen from `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    None,
    /// `a` added `b`, not reciprocated
    OneWayOutgoing,
    /// `b` added `a`, not reciprocated
    OneWayIncoming,
    Mutual,
}

impl RelationshipKind {
    pub fn from_edges(a_to_b: bool, b_to_a: bool) -> Self {
        match (a_to_b, b_to_a) {
            (true, true) => RelationshipKind::Mutual,
            (true, false) => RelationshipKind::OneWayOutgoing,
            (false, true) => RelationshipKind::OneWayIncoming,
            (false, false) => RelationshipKind::None,
        }
    }

    /// True when `a` holds an edge to `b`, which entitles `a` to see `b`'s presence.
    pub fn is_outgoing(self) -> bool {
        matches!(self, RelationshipKind::OneWayOutgoing | RelationshipKind::Mutual)
    }
}
