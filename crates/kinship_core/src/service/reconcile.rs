//! Relationship reconciliation use-case service.
//!
//! # Responsibility
//! - Bring one member's edge set to match a caller-supplied desired state.
//! - Compute mandatory reciprocal edges and deduplicate the result.
//!
//! # Invariants
//! - Reconciliation is a full replace: every previous edge touching the
//!   member (either endpoint) is removed, then the desired set plus
//!   reciprocals is written, in one atomic store operation. Omitting a
//!   previously held relationship silently drops it.
//! - Every related member must exist and share the member's family scope.
//! - After a successful reconcile, no written edge lacks its reciprocal.

use crate::model::edge::{edge_pair, Edge, RelationshipKind};
use crate::model::member::{Member, MemberId};
use crate::repo::family_repo::{FamilyRepository, RepoError};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One desired relationship entry: "the member is `kind` of `related_id`".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesiredRelationship {
    pub kind: RelationshipKind,
    pub related_id: MemberId,
}

impl DesiredRelationship {
    pub fn new(kind: RelationshipKind, related_id: MemberId) -> Self {
        Self { kind, related_id }
    }
}

/// Errors from relationship reconciliation.
#[derive(Debug)]
pub enum ReconcileError {
    /// The member being reconciled does not exist.
    MemberNotFound(MemberId),
    /// A desired entry references a missing member.
    RelatedMemberNotFound(MemberId),
    /// A desired entry references a member in another family scope.
    CrossFamilyRelationship {
        member_id: MemberId,
        related_id: MemberId,
    },
    /// The atomic edge rewrite failed; the transaction rolled back.
    EdgeWrite(RepoError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemberNotFound(id) => write!(f, "member not found: {id}"),
            Self::RelatedMemberNotFound(id) => write!(f, "related member not found: {id}"),
            Self::CrossFamilyRelationship {
                member_id,
                related_id,
            } => write!(
                f,
                "relationship {member_id} -> {related_id} crosses family scopes"
            ),
            Self::EdgeWrite(err) => write!(f, "edge write failed: {err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EdgeWrite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReconcileError {
    fn from(value: RepoError) -> Self {
        Self::EdgeWrite(value)
    }
}

/// Reconciliation service facade over the family store.
pub struct ReconcileService<R: FamilyRepository> {
    repo: R,
}

impl<R: FamilyRepository> ReconcileService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Replaces the member's entire edge set with `desired` plus the
    /// computed reciprocals.
    ///
    /// # Contract
    /// - Callers supply the complete desired relationship set, not a
    ///   delta; dependent UI assumes last-write-wins full replacement.
    /// - Duplicate entries and double-listed reciprocals collapse to one
    ///   edge pair under the `(source, target, kind)` key.
    pub fn reconcile(
        &self,
        member_id: MemberId,
        desired: &[DesiredRelationship],
    ) -> Result<(), ReconcileError> {
        let member = self
            .repo
            .get_member(member_id)?
            .ok_or(ReconcileError::MemberNotFound(member_id))?;

        let edges = self.desired_edge_set(&member, desired)?;

        match self.repo.replace_edges(member_id, &edges) {
            Ok(()) => {
                info!(
                    "event=reconcile module=reconcile status=ok member={} edges={}",
                    member_id,
                    edges.len()
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=reconcile module=reconcile status=error member={} error={}",
                    member_id, err
                );
                Err(ReconcileError::EdgeWrite(err))
            }
        }
    }

    fn desired_edge_set(
        &self,
        member: &Member,
        desired: &[DesiredRelationship],
    ) -> Result<Vec<Edge>, ReconcileError> {
        let mut seen = HashSet::new();
        let mut edges = Vec::with_capacity(desired.len() * 2);

        for entry in desired {
            let related = self
                .repo
                .get_member(entry.related_id)?
                .ok_or(ReconcileError::RelatedMemberNotFound(entry.related_id))?;
            if related.family_uuid != member.family_uuid {
                return Err(ReconcileError::CrossFamilyRelationship {
                    member_id: member.uuid,
                    related_id: entry.related_id,
                });
            }

            for edge in edge_pair(member.uuid, entry.related_id, entry.kind, member.family_uuid) {
                if seen.insert(edge.key()) {
                    edges.push(edge);
                }
            }
        }

        Ok(edges)
    }
}
