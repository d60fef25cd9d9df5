//! Relationship edge model.
//!
//! # Responsibility
//! - Define the directed, typed relationship record between two members.
//! - Compute the mandatory reciprocal for every relationship kind.
//!
//! # Invariants
//! - Edge `(A, B, Parent)` states "A is a parent of B".
//! - Every edge in the store must coexist with its reciprocal:
//!   Parent↔Child, Spouse↔Spouse.
//! - Edges are unique under `(source, target, kind)`.

use crate::model::member::{FamilyId, MemberId};
use serde::{Deserialize, Serialize};

/// Relationship kind between two members, read from the source's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Source is a parent of target.
    Parent,
    /// Source is a child of target.
    Child,
    /// Source is a spouse of target (symmetric).
    Spouse,
}

impl RelationshipKind {
    /// Returns the kind the inverse-direction edge must carry.
    pub fn reciprocal(self) -> Self {
        match self {
            Self::Parent => Self::Child,
            Self::Child => Self::Parent,
            Self::Spouse => Self::Spouse,
        }
    }
}

/// Directed, typed relationship record between two members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source_uuid: MemberId,
    pub target_uuid: MemberId,
    pub kind: RelationshipKind,
    /// Family scope both endpoints must belong to.
    pub family_uuid: FamilyId,
}

impl Edge {
    pub fn new(
        source_uuid: MemberId,
        target_uuid: MemberId,
        kind: RelationshipKind,
        family_uuid: FamilyId,
    ) -> Self {
        Self {
            source_uuid,
            target_uuid,
            kind,
            family_uuid,
        }
    }

    /// Returns the uniqueness key `(source, target, kind)`.
    pub fn key(&self) -> (MemberId, MemberId, RelationshipKind) {
        (self.source_uuid, self.target_uuid, self.kind)
    }

    /// Returns the mandatory inverse-direction edge.
    pub fn reciprocal(&self) -> Self {
        Self {
            source_uuid: self.target_uuid,
            target_uuid: self.source_uuid,
            kind: self.kind.reciprocal(),
            family_uuid: self.family_uuid,
        }
    }
}

/// Builds an edge together with its mandatory reciprocal.
pub fn edge_pair(
    source_uuid: MemberId,
    target_uuid: MemberId,
    kind: RelationshipKind,
    family_uuid: FamilyId,
) -> [Edge; 2] {
    let direct = Edge::new(source_uuid, target_uuid, kind, family_uuid);
    let inverse = direct.reciprocal();
    [direct, inverse]
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parent_and_child_are_mutual_reciprocals() {
        assert_eq!(
            RelationshipKind::Parent.reciprocal(),
            RelationshipKind::Child
        );
        assert_eq!(
            RelationshipKind::Child.reciprocal(),
            RelationshipKind::Parent
        );
    }

    #[test]
    fn spouse_is_self_reciprocal() {
        assert_eq!(
            RelationshipKind::Spouse.reciprocal(),
            RelationshipKind::Spouse
        );
    }

    #[test]
    fn edge_pair_flips_direction_and_kind() {
        let family = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let [direct, inverse] = edge_pair(a, b, RelationshipKind::Parent, family);

        assert_eq!(direct.source_uuid, a);
        assert_eq!(direct.target_uuid, b);
        assert_eq!(inverse.source_uuid, b);
        assert_eq!(inverse.target_uuid, a);
        assert_eq!(inverse.kind, RelationshipKind::Child);
        assert_eq!(direct.reciprocal().reciprocal(), direct);
    }
}
