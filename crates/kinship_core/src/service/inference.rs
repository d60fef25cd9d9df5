//! Sibling inference over parentless members.
//!
//! # Responsibility
//! - Cluster parentless members into plausible sibling groups by
//!   birth-year proximity.
//! - Synthesize (or reuse) one placeholder parent per cluster and wire
//!   the parent/child edge pairs through the reconciler.
//!
//! # Invariants
//! - Clustering is oldest-first greedy with a fixed one-generation span
//!   of 30 years.
//! - Singleton candidates stay unparented; no placeholder is created.
//! - Re-running inference on the same family creates no duplicate
//!   placeholders: synthesis is lookup-before-create by natural key, and
//!   synthetic members never re-enter the candidate pool.
//! - This is a plausibility heuristic, not genealogy: placeholders carry
//!   `is_synthetic` and are removable like any member.

use crate::model::edge::RelationshipKind;
use crate::model::member::{FamilyId, Gender, MaritalStatus, Member, MemberDraft, MemberId, MIN_YEAR};
use crate::repo::family_repo::{FamilyRepository, MemberRecord, RepoError};
use crate::service::reconcile::{DesiredRelationship, ReconcileError, ReconcileService};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Plausible span of one generation's sibling set, in years.
pub const SIBLING_SPAN_YEARS: i32 = 30;

/// Estimated gap between a placeholder parent and its oldest child.
const PARENT_AGE_GAP_YEARS: i32 = 30;

/// One inferred cluster: the placeholder parent and its adopted children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredCluster {
    pub parent: Member,
    pub child_ids: Vec<MemberId>,
}

/// Errors from sibling inference.
#[derive(Debug)]
pub enum InferenceError {
    Repo(RepoError),
    Reconcile(ReconcileError),
}

impl Display for InferenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Reconcile(err) => write!(f, "{err}"),
        }
    }
}

impl Error for InferenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Reconcile(err) => Some(err),
        }
    }
}

impl From<RepoError> for InferenceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ReconcileError> for InferenceError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

/// Sibling inference facade over the family store.
pub struct SiblingInferenceService<R: FamilyRepository> {
    reconciler: ReconcileService<R>,
}

impl<R: FamilyRepository> SiblingInferenceService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self {
            reconciler: ReconcileService::new(repo),
        }
    }

    /// Infers sibling clusters for one family and persists a placeholder
    /// parent per multi-member cluster.
    pub fn infer(&self, family_uuid: FamilyId) -> Result<Vec<InferredCluster>, InferenceError> {
        let records = self.reconciler.repo().list_members(family_uuid)?;
        let clusters = cluster_parentless(&records);

        let mut inferred = Vec::new();
        for child_ids in clusters {
            let min_birth_year = child_ids
                .iter()
                .filter_map(|id| birth_year_of(&records, *id))
                .min()
                .unwrap_or(0);
            let parent = self.synthesize_parent(family_uuid, min_birth_year)?;

            let desired: Vec<DesiredRelationship> = child_ids
                .iter()
                .map(|child| DesiredRelationship::new(RelationshipKind::Parent, *child))
                .collect();
            // One full replace on the placeholder writes every parent/child
            // pair without disturbing the children's other edges.
            self.reconciler.reconcile(parent.uuid, &desired)?;

            info!(
                "event=sibling_inference module=inference status=ok family={} parent={} children={}",
                family_uuid,
                parent.uuid,
                child_ids.len()
            );
            inferred.push(InferredCluster { parent, child_ids });
        }

        Ok(inferred)
    }

    fn synthesize_parent(
        &self,
        family_uuid: FamilyId,
        min_child_birth_year: i32,
    ) -> Result<Member, InferenceError> {
        // Clamped so clusters near the lower year bound still validate.
        let estimated_birth_year = (min_child_birth_year - PARENT_AGE_GAP_YEARS).max(MIN_YEAR);

        let mut draft = MemberDraft::new(family_uuid, placeholder_name(estimated_birth_year));
        draft.birth_year = Some(estimated_birth_year);
        draft.living_place = "Unknown".to_string();
        draft.marital_status = MaritalStatus::Unknown;
        draft.gender = Gender::Unknown;
        draft.is_synthetic = true;

        // create_member reuses the existing row when the natural key
        // matches, which is what makes re-runs idempotent.
        Ok(self.reconciler.repo().create_member(&draft)?)
    }
}

/// Deterministic placeholder name derived from the estimated birth year.
pub fn placeholder_name(estimated_birth_year: i32) -> String {
    format!("Unknown Parent (b. {estimated_birth_year})")
}

/// Groups parentless members into sibling clusters.
///
/// Candidates are members with no Child-kind edge (no recorded parent)
/// that are not synthetic and carry a birth year. Sorted ascending by
/// birth year, each unprocessed candidate anchors a cluster gathering all
/// other unprocessed candidates within [`SIBLING_SPAN_YEARS`]. Singleton
/// clusters are dropped.
pub fn cluster_parentless(records: &[MemberRecord]) -> Vec<Vec<MemberId>> {
    let mut candidates: Vec<(MemberId, i32)> = records
        .iter()
        .filter(|record| {
            !record.member.is_synthetic
                && record
                    .edges
                    .iter()
                    .all(|edge| edge.kind != RelationshipKind::Child)
        })
        .filter_map(|record| record.member.birth_year.map(|year| (record.member.uuid, year)))
        .collect();
    candidates.sort_by_key(|(_, year)| *year);

    let mut processed = vec![false; candidates.len()];
    let mut clusters = Vec::new();

    for anchor in 0..candidates.len() {
        if processed[anchor] {
            continue;
        }
        processed[anchor] = true;
        let (anchor_id, anchor_year) = candidates[anchor];

        let mut cluster = vec![anchor_id];
        for other in anchor + 1..candidates.len() {
            if processed[other] {
                continue;
            }
            let (other_id, other_year) = candidates[other];
            if (other_year - anchor_year).abs() <= SIBLING_SPAN_YEARS {
                processed[other] = true;
                cluster.push(other_id);
            }
        }

        if cluster.len() > 1 {
            clusters.push(cluster);
        }
    }

    clusters
}

fn birth_year_of(records: &[MemberRecord], id: MemberId) -> Option<i32> {
    records
        .iter()
        .find(|record| record.member.uuid == id)
        .and_then(|record| record.member.birth_year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::edge::Edge;
    use uuid::Uuid;

    fn record(family: FamilyId, name: &str, birth_year: Option<i32>) -> MemberRecord {
        MemberRecord {
            member: Member {
                uuid: Uuid::new_v4(),
                family_uuid: family,
                full_name: name.to_string(),
                birth_year,
                death_year: None,
                living_place: String::new(),
                marital_status: MaritalStatus::Single,
                gender: Gender::Unknown,
                occupation: None,
                is_synthetic: false,
            },
            edges: Vec::new(),
        }
    }

    #[test]
    fn close_birth_years_cluster_and_distant_ones_do_not() {
        let family = Uuid::new_v4();
        let a = record(family, "A", Some(1950));
        let b = record(family, "B", Some(1960));
        let c = record(family, "C", Some(1990));
        let records = vec![a.clone(), b.clone(), c];

        let clusters = cluster_parentless(&records);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0], vec![a.member.uuid, b.member.uuid]);
    }

    #[test]
    fn members_with_a_parent_edge_are_not_candidates() {
        let family = Uuid::new_v4();
        let parent = record(family, "P", Some(1910));
        let mut child = record(family, "C", Some(1955));
        child.edges.push(Edge::new(
            child.member.uuid,
            parent.member.uuid,
            RelationshipKind::Child,
            family,
        ));
        let other = record(family, "O", Some(1950));

        // Child has a recorded parent and is excluded; the remaining two
        // candidates are more than a generation apart, so no cluster forms.
        let clusters = cluster_parentless(&[parent, child, other]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn synthetic_members_never_re_enter_the_pool() {
        let family = Uuid::new_v4();
        let mut placeholder = record(family, &placeholder_name(1920), Some(1920));
        placeholder.member.is_synthetic = true;
        let near = record(family, "N", Some(1930));

        let clusters = cluster_parentless(&[placeholder, near]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn placeholder_name_is_deterministic() {
        assert_eq!(placeholder_name(1920), placeholder_name(1920));
        assert_ne!(placeholder_name(1920), placeholder_name(1921));
    }
}
