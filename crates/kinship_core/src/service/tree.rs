//! Generational tree reconstruction from the flat edge list.
//!
//! # Responsibility
//! - Transform member records with bidirectional edges into nested
//!   root/spouse/children nodes for presentation.
//! - Surface edge-set inconsistencies as diagnostics, never panics.
//!
//! # Invariants
//! - A member is a root iff it holds no Child-kind edge (no recorded
//!   parent).
//! - Children are derived from the child side: a member is rendered under
//!   a parent iff the member holds a Child-kind edge naming that parent.
//!   The unique `(source, target, kind)` key rules out double counting.
//! - A visited set keyed by member id short-circuits re-descent, so a
//!   malformed cyclic edge set always terminates.
//! - Sibling and root order is the insertion order of the input list.

use crate::model::edge::RelationshipKind;
use crate::model::member::{Member, MemberId};
use crate::repo::family_repo::MemberRecord;
use log::warn;
use std::collections::{HashMap, HashSet};

/// One rendered tree node: a member, its paired spouse, its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub member: Member,
    /// First spouse edge found; at most one spouse is rendered per node.
    pub spouse: Option<Member>,
    pub children: Vec<TreeNode>,
}

/// Non-fatal inconsistencies observed while reading the edge set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    /// Descent reached a member already on the current path.
    CycleDetected { member_id: MemberId },
    /// An edge exists without its mandatory reciprocal.
    MissingReciprocal {
        source_uuid: MemberId,
        target_uuid: MemberId,
        kind: RelationshipKind,
    },
    /// An edge references a member absent from the input records.
    DanglingEdge {
        source_uuid: MemberId,
        target_uuid: MemberId,
    },
}

/// Result of one tree build: roots plus observed diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOutcome {
    pub roots: Vec<TreeNode>,
    pub diagnostics: Vec<ConsistencyIssue>,
}

/// Builds the nested generational structure from flat member records.
pub fn build_tree(records: &[MemberRecord]) -> TreeOutcome {
    let by_id: HashMap<MemberId, &MemberRecord> = records
        .iter()
        .map(|record| (record.member.uuid, record))
        .collect();

    let mut diagnostics = Vec::new();
    for record in records {
        for edge in &record.edges {
            if !by_id.contains_key(&edge.target_uuid) {
                diagnostics.push(ConsistencyIssue::DanglingEdge {
                    source_uuid: edge.source_uuid,
                    target_uuid: edge.target_uuid,
                });
            }
        }
    }

    // Children come from the child's own Child-kind claim, not from the
    // parent's Parent-kind claim: on a reciprocity-broken edge set this
    // matches the side that also decides rootness.
    let mut children_of: HashMap<MemberId, Vec<MemberId>> = HashMap::new();
    for record in records {
        for edge in &record.edges {
            if edge.kind == RelationshipKind::Child && by_id.contains_key(&edge.target_uuid) {
                children_of
                    .entry(edge.target_uuid)
                    .or_default()
                    .push(record.member.uuid);
            }
        }
    }

    let mut consumed_as_spouse = HashSet::new();
    let mut roots = Vec::new();

    for record in records {
        let has_parent = record
            .edges
            .iter()
            .any(|edge| edge.kind == RelationshipKind::Child);
        if has_parent || consumed_as_spouse.contains(&record.member.uuid) {
            continue;
        }

        let mut visited = HashSet::new();
        let node = descend(
            record,
            &by_id,
            &children_of,
            &mut visited,
            &mut consumed_as_spouse,
            &mut diagnostics,
        );
        roots.push(node);
    }

    for issue in &diagnostics {
        if let ConsistencyIssue::CycleDetected { member_id } = issue {
            warn!(
                "event=tree_build module=tree status=degraded error_code=cycle_detected member={member_id}"
            );
        }
    }

    TreeOutcome { roots, diagnostics }
}

fn descend(
    record: &MemberRecord,
    by_id: &HashMap<MemberId, &MemberRecord>,
    children_of: &HashMap<MemberId, Vec<MemberId>>,
    visited: &mut HashSet<MemberId>,
    consumed_as_spouse: &mut HashSet<MemberId>,
    diagnostics: &mut Vec<ConsistencyIssue>,
) -> TreeNode {
    visited.insert(record.member.uuid);

    // Dangling spouse edges are already in the diagnostics from the
    // upfront scan; here they just yield no spouse.
    let spouse = record
        .edges
        .iter()
        .find(|edge| edge.kind == RelationshipKind::Spouse)
        .and_then(|edge| by_id.get(&edge.target_uuid))
        .map(|spouse_record| spouse_record.member.clone());
    if let Some(spouse_member) = &spouse {
        consumed_as_spouse.insert(spouse_member.uuid);
    }

    let mut children = Vec::new();
    if let Some(child_ids) = children_of.get(&record.member.uuid) {
        for child_id in child_ids {
            let Some(child_record) = by_id.get(child_id) else {
                continue;
            };
            if visited.contains(child_id) {
                diagnostics.push(ConsistencyIssue::CycleDetected {
                    member_id: *child_id,
                });
                continue;
            }
            children.push(descend(
                child_record,
                by_id,
                children_of,
                visited,
                consumed_as_spouse,
                diagnostics,
            ));
        }
    }

    TreeNode {
        member: record.member.clone(),
        spouse,
        children,
    }
}

/// Scans the edge set for edges lacking their mandatory reciprocal.
///
/// Diagnostics only: callers decide whether to repair or report.
pub fn scan_reciprocity(records: &[MemberRecord]) -> Vec<ConsistencyIssue> {
    let mut keys = HashSet::new();
    for record in records {
        for edge in &record.edges {
            keys.insert(edge.key());
        }
    }

    let mut issues = Vec::new();
    for record in records {
        for edge in &record.edges {
            let reciprocal = edge.reciprocal();
            if !keys.contains(&reciprocal.key()) {
                issues.push(ConsistencyIssue::MissingReciprocal {
                    source_uuid: edge.source_uuid,
                    target_uuid: edge.target_uuid,
                    kind: edge.kind,
                });
            }
        }
    }
    issues
}
