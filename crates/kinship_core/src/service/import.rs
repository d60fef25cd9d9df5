//! Bulk import normalization and execution.
//!
//! # Responsibility
//! - Parse loosely-structured tabular rows into member drafts plus
//!   name-based relationship intents (`normalize`, pure).
//! - Execute an import plan against the store: create members with
//!   natural-key dedup, resolve names to ids in a second pass, and hand
//!   each member its complete relationship set for reconciliation.
//!
//! # Invariants
//! - Header matching is case/space-insensitive through one declarative
//!   alias table resolved per import, never ad hoc string matching.
//! - Row-level problems are aggregated as warnings; a single bad row
//!   never aborts the batch.
//! - Relationship intents reference names, not ids: resolution happens
//!   only after every member row exists, so forward references resolve.

use crate::model::edge::{edge_pair, Edge, RelationshipKind};
use crate::model::member::{FamilyId, Member, MemberDraft, MemberId, MAX_YEAR, MIN_YEAR};
use crate::repo::family_repo::{FamilyRepository, RepoError};
use crate::service::reconcile::{DesiredRelationship, ReconcileError, ReconcileService};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid header normalization regex"));

/// One loosely-typed spreadsheet row: raw header text to raw cell text.
pub type RawRow = HashMap<String, String>;

/// Birth year assigned when a row carries none: `1970 + row index`,
/// clamped to [`MAX_YEAR`] so large batches still pass validation.
const DEFAULT_BIRTH_YEAR_BASE: i32 = 1970;

/// Canonical semantic fields recognized in import headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ImportField {
    FullName,
    BirthYear,
    DeathYear,
    LivingPlace,
    MaritalStatus,
    Gender,
    Occupation,
    Parents,
    Spouses,
    Children,
}

/// Canonical field -> accepted header spellings. Spellings are compared
/// after lowercasing and stripping every non-alphanumeric character, so
/// "Year of Birth", "birth_year" and "yearOfBirth" all converge.
const FIELD_ALIASES: &[(ImportField, &[&str])] = &[
    (ImportField::FullName, &["fullname", "name", "membername"]),
    (
        ImportField::BirthYear,
        &["birthyear", "yearofbirth", "yob", "born"],
    ),
    (
        ImportField::DeathYear,
        &["deathyear", "yearofdeath", "yod", "died"],
    ),
    (
        ImportField::LivingPlace,
        &["livingplace", "place", "residence", "location"],
    ),
    (
        ImportField::MaritalStatus,
        &["maritalstatus", "marital", "status"],
    ),
    (ImportField::Gender, &["gender", "sex"]),
    (ImportField::Occupation, &["occupation", "profession", "job"]),
    (ImportField::Parents, &["parents", "parent"]),
    (ImportField::Spouses, &["spouses", "spouse", "partners"]),
    (ImportField::Children, &["children", "child", "kids"]),
];

/// Name-based relationship intent: "the row member is `kind` of the
/// related name". Ids are resolved in a later pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipIntent {
    pub member_name: String,
    pub related_name: String,
    pub kind: RelationshipKind,
}

/// Aggregated, non-fatal row-level problems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportWarnings {
    /// Row indexes whose full name was missing and synthesized.
    pub missing_names: Vec<usize>,
    /// Row indexes whose birth year was missing/out-of-range and defaulted.
    pub defaulted_birth_years: Vec<usize>,
    /// Normalized names appearing on more than one row; the first
    /// occurrence stays canonical for name resolution.
    pub duplicate_names: Vec<String>,
}

impl ImportWarnings {
    pub fn is_empty(&self) -> bool {
        self.missing_names.is_empty()
            && self.defaulted_birth_years.is_empty()
            && self.duplicate_names.is_empty()
    }
}

/// Output of `normalize`: drafts, name-based intents, and warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    pub drafts: Vec<MemberDraft>,
    pub intents: Vec<RelationshipIntent>,
    pub warnings: ImportWarnings,
}

/// Relationship dropped because a name never resolved to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRelationship {
    pub member_name: String,
    pub related_name: String,
    pub kind: RelationshipKind,
}

/// Result envelope for one executed import batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Members now backing the batch rows (created or natural-key reused).
    pub members: Vec<Member>,
    pub warnings: ImportWarnings,
    /// Intents whose names never resolved; reported, never fatal.
    pub skipped_relationships: Vec<SkippedRelationship>,
    /// Count of members whose edge set was reconciled.
    pub reconciled_members: usize,
}

/// Errors from import execution. Row-level problems are warnings, not
/// errors; these are store/reconcile failures only.
#[derive(Debug)]
pub enum ImportError {
    Repo(RepoError),
    Reconcile(ReconcileError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Reconcile(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Reconcile(err) => Some(err),
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ReconcileError> for ImportError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

/// Explicit name -> id resolution state threaded through import passes.
///
/// Exists so resolution never leans on ambient/global maps: the context
/// is built during member creation and consumed during intent resolution.
#[derive(Debug, Default)]
pub struct NameResolutionContext {
    by_normalized_name: HashMap<String, MemberId>,
}

impl NameResolutionContext {
    /// Registers a name, keeping the first occurrence canonical.
    /// Returns false when the normalized name was already registered.
    pub fn register(&mut self, name: &str, id: MemberId) -> bool {
        let key = normalize_name(name);
        if self.by_normalized_name.contains_key(&key) {
            return false;
        }
        self.by_normalized_name.insert(key, id);
        true
    }

    /// Resolves a name to the canonical member id, if any.
    pub fn resolve(&self, name: &str) -> Option<MemberId> {
        self.by_normalized_name.get(&normalize_name(name)).copied()
    }
}

/// Parses raw rows into an import plan. Pure: touches no store.
pub fn normalize(rows: &[RawRow], family_uuid: FamilyId) -> ImportPlan {
    let mut drafts = Vec::with_capacity(rows.len());
    let mut intents = Vec::new();
    let mut warnings = ImportWarnings::default();
    let mut seen_names = HashSet::new();

    for (row_index, row) in rows.iter().enumerate() {
        let fields = map_row_fields(row);

        let full_name = match fields.get(&ImportField::FullName) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => {
                warnings.missing_names.push(row_index);
                format!("Unknown {row_index}")
            }
        };

        let normalized = normalize_name(&full_name);
        if !seen_names.insert(normalized) {
            warnings.duplicate_names.push(full_name.clone());
        }

        let birth_year = match fields
            .get(&ImportField::BirthYear)
            .and_then(|value| value.trim().parse::<i32>().ok())
        {
            Some(year) if (MIN_YEAR..=MAX_YEAR).contains(&year) => year,
            _ => {
                warnings.defaulted_birth_years.push(row_index);
                (DEFAULT_BIRTH_YEAR_BASE + row_index as i32).min(MAX_YEAR)
            }
        };

        let mut draft = MemberDraft::new(family_uuid, full_name.clone());
        draft.birth_year = Some(birth_year);
        draft.death_year = fields
            .get(&ImportField::DeathYear)
            .and_then(|value| value.trim().parse::<i32>().ok())
            .filter(|year| (MIN_YEAR..=MAX_YEAR).contains(year) && *year >= birth_year);
        if let Some(place) = fields.get(&ImportField::LivingPlace) {
            draft.living_place = place.trim().to_string();
        }
        if let Some(status) = fields.get(&ImportField::MaritalStatus) {
            if let Some(parsed) = parse_marital_status(status) {
                draft.marital_status = parsed;
            }
        }
        if let Some(gender) = fields.get(&ImportField::Gender) {
            if let Some(parsed) = parse_gender(gender) {
                draft.gender = parsed;
            }
        }
        draft.occupation = fields
            .get(&ImportField::Occupation)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        drafts.push(draft);

        for (field, kind) in [
            // A listed parent makes the row member their child, and so on.
            (ImportField::Parents, RelationshipKind::Child),
            (ImportField::Spouses, RelationshipKind::Spouse),
            (ImportField::Children, RelationshipKind::Parent),
        ] {
            if let Some(raw_list) = fields.get(&field) {
                for related_name in split_name_list(raw_list) {
                    intents.push(RelationshipIntent {
                        member_name: full_name.clone(),
                        related_name,
                        kind,
                    });
                }
            }
        }
    }

    ImportPlan {
        drafts,
        intents,
        warnings,
    }
}

/// Import execution facade: member creation plus reconciliation.
pub struct ImportService<R: FamilyRepository> {
    reconciler: ReconcileService<R>,
}

impl<R: FamilyRepository> ImportService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self {
            reconciler: ReconcileService::new(repo),
        }
    }

    /// Normalizes and executes one import batch.
    pub fn import(
        &self,
        rows: &[RawRow],
        family_uuid: FamilyId,
    ) -> Result<ImportReport, ImportError> {
        let plan = normalize(rows, family_uuid);
        self.execute(plan)
    }

    /// Executes a previously normalized plan.
    ///
    /// # Contract
    /// - Pass 1 creates every draft (natural-key dedup applies) and fills
    ///   the resolution context; pass 2 resolves intents, so forward
    ///   references between rows work regardless of row order.
    /// - The canonical edge set is symmetric-closed and deduplicated, and
    ///   each member is reconciled with its complete set: later full
    ///   replaces re-insert pairs earlier ones wrote, so the sequence
    ///   converges for any member order.
    pub fn execute(&self, plan: ImportPlan) -> Result<ImportReport, ImportError> {
        let repo = self.reconciler.repo();
        let mut context = NameResolutionContext::default();
        let mut members = Vec::with_capacity(plan.drafts.len());

        for draft in &plan.drafts {
            let member = repo.create_member(draft)?;
            context.register(&member.full_name, member.uuid);
            members.push(member);
        }

        let mut skipped = Vec::new();
        let mut seen_edges = HashSet::new();
        let mut desired_by_member: HashMap<MemberId, Vec<DesiredRelationship>> = HashMap::new();

        for intent in &plan.intents {
            let (member_id, related_id) =
                match (context.resolve(&intent.member_name), context.resolve(&intent.related_name))
                {
                    (Some(member_id), Some(related_id)) => (member_id, related_id),
                    _ => {
                        skipped.push(SkippedRelationship {
                            member_name: intent.member_name.clone(),
                            related_name: intent.related_name.clone(),
                            kind: intent.kind,
                        });
                        continue;
                    }
                };

            for edge in edge_pair(member_id, related_id, intent.kind, plan_family(&plan)) {
                if seen_edges.insert(edge.key()) {
                    push_desired(&mut desired_by_member, &edge);
                }
            }
        }

        let mut reconciled_members = 0;
        for member in &members {
            if let Some(desired) = desired_by_member.get(&member.uuid) {
                self.reconciler.reconcile(member.uuid, desired)?;
                reconciled_members += 1;
            }
        }

        if !skipped.is_empty() {
            warn!(
                "event=import module=import status=partial skipped_relationships={}",
                skipped.len()
            );
        }
        info!(
            "event=import module=import status=ok members={} reconciled={} warnings={}",
            members.len(),
            reconciled_members,
            !plan.warnings.is_empty()
        );

        Ok(ImportReport {
            members,
            warnings: plan.warnings,
            skipped_relationships: skipped,
            reconciled_members,
        })
    }
}

fn plan_family(plan: &ImportPlan) -> FamilyId {
    // normalize() stamps every draft with the same family scope.
    plan.drafts
        .first()
        .map(|draft| draft.family_uuid)
        .unwrap_or_else(FamilyId::nil)
}

fn push_desired(desired_by_member: &mut HashMap<MemberId, Vec<DesiredRelationship>>, edge: &Edge) {
    desired_by_member
        .entry(edge.source_uuid)
        .or_default()
        .push(DesiredRelationship::new(edge.kind, edge.target_uuid));
}

fn map_row_fields(row: &RawRow) -> HashMap<ImportField, String> {
    let mut fields = HashMap::new();
    for (header, value) in row {
        let normalized = normalize_header(header);
        for (field, aliases) in FIELD_ALIASES {
            if aliases.contains(&normalized.as_str()) {
                // First matching header wins for a given field.
                fields.entry(*field).or_insert_with(|| value.clone());
                break;
            }
        }
    }
    fields
}

fn normalize_header(header: &str) -> String {
    NON_ALNUM_RE
        .replace_all(&header.to_lowercase(), "")
        .into_owned()
}

/// Normalizes a person name for resolution lookups: trim + lowercase.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn split_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_marital_status(value: &str) -> Option<crate::model::member::MaritalStatus> {
    use crate::model::member::MaritalStatus;
    match value.trim().to_lowercase().as_str() {
        "single" => Some(MaritalStatus::Single),
        "married" => Some(MaritalStatus::Married),
        "divorced" => Some(MaritalStatus::Divorced),
        "widowed" => Some(MaritalStatus::Widowed),
        "unknown" => Some(MaritalStatus::Unknown),
        _ => None,
    }
}

fn parse_gender(value: &str) -> Option<crate::model::member::Gender> {
    use crate::model::member::Gender;
    match value.trim().to_lowercase().as_str() {
        "male" | "m" => Some(Gender::Male),
        "female" | "f" => Some(Gender::Female),
        "other" => Some(Gender::Other),
        "unknown" => Some(Gender::Unknown),
        _ => None,
    }
}
