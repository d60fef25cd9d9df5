//! Core domain logic for the Kinship family relationship graph engine.
//! This crate is the single source of truth for business invariants:
//! reciprocal edge maintenance, bulk import normalization, sibling
//! inference, and generational tree reconstruction.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::edge::{edge_pair, Edge, RelationshipKind};
pub use model::member::{
    FamilyId, Gender, MaritalStatus, Member, MemberDraft, MemberId, MemberValidationError,
    NaturalKey,
};
pub use repo::family_repo::{
    FamilyRepository, MemberRecord, RepoError, RepoResult, SqliteFamilyRepository,
};
pub use service::import::{
    normalize, ImportError, ImportPlan, ImportReport, ImportService, ImportWarnings,
    NameResolutionContext, RawRow, RelationshipIntent, SkippedRelationship,
};
pub use service::inference::{
    cluster_parentless, InferenceError, InferredCluster, SiblingInferenceService,
    SIBLING_SPAN_YEARS,
};
pub use service::reconcile::{DesiredRelationship, ReconcileError, ReconcileService};
pub use service::tree::{build_tree, scan_reciprocity, ConsistencyIssue, TreeNode, TreeOutcome};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
