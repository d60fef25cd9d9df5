//! Family store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable member CRUD and edge upsert/delete APIs over the
//!   canonical `members` and `relationship_edges` tables.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `validate()` before SQL mutations.
//! - `create_member` performs a natural-key lookup first and reuses an
//!   existing row instead of inserting a duplicate person.
//! - `replace_edges` removes and rewrites a member's edge set in one
//!   immediate transaction, so readers never observe the half-applied
//!   delete/insert window.
//! - A member row is never deleted while edges still reference it; edge
//!   deletion cascades first.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::edge::{Edge, RelationshipKind};
use crate::model::member::{
    FamilyId, Gender, MaritalStatus, Member, MemberDraft, MemberId, MemberValidationError,
    NaturalKey,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const MEMBER_SELECT_SQL: &str = "SELECT
    uuid,
    family_uuid,
    full_name,
    birth_year,
    death_year,
    living_place,
    marital_status,
    gender,
    occupation,
    is_synthetic
FROM members";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for member and edge persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(MemberValidationError),
    Db(DbError),
    MemberNotFound(MemberId),
    /// Edge endpoints do not both belong to the edge's family scope.
    CrossFamilyEdge {
        source_uuid: MemberId,
        target_uuid: MemberId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::MemberNotFound(id) => write!(f, "member not found: {id}"),
            Self::CrossFamilyEdge {
                source_uuid,
                target_uuid,
            } => write!(
                f,
                "edge {source_uuid} -> {target_uuid} crosses family scopes"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "family repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "family repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted family data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MemberValidationError> for RepoError {
    fn from(value: MemberValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Member read model carrying the edges the member sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub member: Member,
    /// Edges where the member is the source endpoint.
    pub edges: Vec<Edge>,
}

/// Edge-store contract the graph engine consumes.
///
/// Implementations must keep `upsert_edges` idempotent under
/// `(source, target, kind)` and `replace_edges` atomic.
pub trait FamilyRepository {
    fn find_member_by_natural_key(&self, key: &NaturalKey) -> RepoResult<Option<Member>>;
    /// Creates a member, or returns the existing one matching the draft's
    /// natural key (idempotent duplicate-person defense).
    fn create_member(&self, draft: &MemberDraft) -> RepoResult<Member>;
    fn get_member(&self, id: MemberId) -> RepoResult<Option<Member>>;
    fn update_member(&self, member: &Member) -> RepoResult<()>;
    /// Deletes a member after cascading both-direction edge deletion.
    fn delete_member(&self, id: MemberId) -> RepoResult<()>;
    fn find_members_by_name(&self, name: &str, family_uuid: FamilyId) -> RepoResult<Vec<Member>>;
    /// Lists family members with their sourced edges, in insertion order.
    fn list_members(&self, family_uuid: FamilyId) -> RepoResult<Vec<MemberRecord>>;
    /// Deletes every edge where the member appears as source or target.
    fn delete_edges(&self, member_id: MemberId) -> RepoResult<()>;
    /// Inserts edges, ignoring rows already present under the key.
    fn upsert_edges(&self, edges: &[Edge]) -> RepoResult<()>;
    /// Atomically replaces every edge touching `member_id` with `edges`.
    fn replace_edges(&self, member_id: MemberId, edges: &[Edge]) -> RepoResult<()>;
}

/// SQLite-backed family repository.
pub struct SqliteFamilyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFamilyRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl FamilyRepository for SqliteFamilyRepository<'_> {
    fn find_member_by_natural_key(&self, key: &NaturalKey) -> RepoResult<Option<Member>> {
        // `IS` instead of `=` so a NULL birth year still matches itself.
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE family_uuid = ?1
               AND full_name = ?2
               AND birth_year IS ?3
               AND living_place = ?4
             ORDER BY created_at ASC, rowid ASC
             LIMIT 1;"
        ))?;

        let mut rows = stmt.query(params![
            key.family_uuid.to_string(),
            key.full_name.as_str(),
            key.birth_year,
            key.living_place.as_str(),
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    fn create_member(&self, draft: &MemberDraft) -> RepoResult<Member> {
        draft.validate()?;

        if let Some(existing) = self.find_member_by_natural_key(&draft.natural_key())? {
            return Ok(existing);
        }

        let member = draft.clone().into_member(Uuid::new_v4());
        self.conn.execute(
            "INSERT INTO members (
                uuid,
                family_uuid,
                full_name,
                birth_year,
                death_year,
                living_place,
                marital_status,
                gender,
                occupation,
                is_synthetic
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                member.uuid.to_string(),
                member.family_uuid.to_string(),
                member.full_name.as_str(),
                member.birth_year,
                member.death_year,
                member.living_place.as_str(),
                marital_status_to_db(member.marital_status),
                gender_to_db(member.gender),
                member.occupation.as_deref(),
                bool_to_int(member.is_synthetic),
            ],
        )?;

        Ok(member)
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<Member>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    fn update_member(&self, member: &Member) -> RepoResult<()> {
        member.validate()?;

        let changed = self.conn.execute(
            "UPDATE members
             SET
                full_name = ?1,
                birth_year = ?2,
                death_year = ?3,
                living_place = ?4,
                marital_status = ?5,
                gender = ?6,
                occupation = ?7,
                is_synthetic = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?9;",
            params![
                member.full_name.as_str(),
                member.birth_year,
                member.death_year,
                member.living_place.as_str(),
                marital_status_to_db(member.marital_status),
                gender_to_db(member.gender),
                member.occupation.as_deref(),
                bool_to_int(member.is_synthetic),
                member.uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::MemberNotFound(member.uuid));
        }

        Ok(())
    }

    fn delete_member(&self, id: MemberId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM relationship_edges
             WHERE source_uuid = ?1 OR target_uuid = ?1;",
            [id.to_string()],
        )?;
        let changed = tx.execute("DELETE FROM members WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::MemberNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn find_members_by_name(&self, name: &str, family_uuid: FamilyId) -> RepoResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE family_uuid = ?1
               AND lower(trim(full_name)) = lower(trim(?2))
             ORDER BY created_at ASC, rowid ASC;"
        ))?;

        let mut rows = stmt.query(params![family_uuid.to_string(), name])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }
        Ok(members)
    }

    fn list_members(&self, family_uuid: FamilyId) -> RepoResult<Vec<MemberRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE family_uuid = ?1
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([family_uuid.to_string()])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(MemberRecord {
                member: parse_member_row(row)?,
                edges: Vec::new(),
            });
        }

        let mut edge_stmt = self.conn.prepare(
            "SELECT source_uuid, target_uuid, kind, family_uuid
             FROM relationship_edges
             WHERE family_uuid = ?1
             ORDER BY rowid ASC;",
        )?;
        let mut edge_rows = edge_stmt.query([family_uuid.to_string()])?;
        let mut edges = Vec::new();
        while let Some(row) = edge_rows.next()? {
            edges.push(parse_edge_row(row)?);
        }

        for record in &mut records {
            record.edges = edges
                .iter()
                .filter(|edge| edge.source_uuid == record.member.uuid)
                .cloned()
                .collect();
        }

        Ok(records)
    }

    fn delete_edges(&self, member_id: MemberId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM relationship_edges
             WHERE source_uuid = ?1 OR target_uuid = ?1;",
            [member_id.to_string()],
        )?;
        Ok(())
    }

    fn upsert_edges(&self, edges: &[Edge]) -> RepoResult<()> {
        for edge in edges {
            ensure_edge_in_family(self.conn, edge)?;
            insert_edge(self.conn, edge)?;
        }
        Ok(())
    }

    fn replace_edges(&self, member_id: MemberId, edges: &[Edge]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        for edge in edges {
            ensure_edge_in_family(&tx, edge)?;
        }

        tx.execute(
            "DELETE FROM relationship_edges
             WHERE source_uuid = ?1 OR target_uuid = ?1;",
            [member_id.to_string()],
        )?;
        for edge in edges {
            insert_edge(&tx, edge)?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn insert_edge(conn: &Connection, edge: &Edge) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO relationship_edges (source_uuid, target_uuid, kind, family_uuid)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (source_uuid, target_uuid, kind) DO NOTHING;",
        params![
            edge.source_uuid.to_string(),
            edge.target_uuid.to_string(),
            relationship_kind_to_db(edge.kind),
            edge.family_uuid.to_string(),
        ],
    )?;
    Ok(())
}

fn ensure_edge_in_family(conn: &Connection, edge: &Edge) -> RepoResult<()> {
    for endpoint in [edge.source_uuid, edge.target_uuid] {
        let family: Option<String> = conn
            .query_row(
                "SELECT family_uuid FROM members WHERE uuid = ?1;",
                [endpoint.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match family {
            None => return Err(RepoError::MemberNotFound(endpoint)),
            Some(value) if value == edge.family_uuid.to_string() => {}
            Some(_) => {
                return Err(RepoError::CrossFamilyEdge {
                    source_uuid: edge.source_uuid,
                    target_uuid: edge.target_uuid,
                })
            }
        }
    }
    Ok(())
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<Member> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "members.uuid")?;
    let family_text: String = row.get("family_uuid")?;
    let family_uuid = parse_uuid(&family_text, "members.family_uuid")?;

    let status_text: String = row.get("marital_status")?;
    let marital_status = parse_marital_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid marital status `{status_text}` in members.marital_status"
        ))
    })?;

    let gender_text: String = row.get("gender")?;
    let gender = parse_gender(&gender_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid gender `{gender_text}` in members.gender"))
    })?;

    let is_synthetic = match row.get::<_, i64>("is_synthetic")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_synthetic value `{other}` in members.is_synthetic"
            )));
        }
    };

    let member = Member {
        uuid,
        family_uuid,
        full_name: row.get("full_name")?,
        birth_year: row.get("birth_year")?,
        death_year: row.get("death_year")?,
        living_place: row.get("living_place")?,
        marital_status,
        gender,
        occupation: row.get("occupation")?,
        is_synthetic,
    };
    member.validate()?;
    Ok(member)
}

fn parse_edge_row(row: &Row<'_>) -> RepoResult<Edge> {
    let source_text: String = row.get("source_uuid")?;
    let target_text: String = row.get("target_uuid")?;
    let family_text: String = row.get("family_uuid")?;
    let kind_text: String = row.get("kind")?;

    let kind = parse_relationship_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid relationship kind `{kind_text}` in relationship_edges.kind"
        ))
    })?;

    Ok(Edge {
        source_uuid: parse_uuid(&source_text, "relationship_edges.source_uuid")?,
        target_uuid: parse_uuid(&target_text, "relationship_edges.target_uuid")?,
        kind,
        family_uuid: parse_uuid(&family_text, "relationship_edges.family_uuid")?,
    })
}

fn relationship_kind_to_db(kind: RelationshipKind) -> &'static str {
    match kind {
        RelationshipKind::Parent => "parent",
        RelationshipKind::Child => "child",
        RelationshipKind::Spouse => "spouse",
    }
}

fn parse_relationship_kind(value: &str) -> Option<RelationshipKind> {
    match value {
        "parent" => Some(RelationshipKind::Parent),
        "child" => Some(RelationshipKind::Child),
        "spouse" => Some(RelationshipKind::Spouse),
        _ => None,
    }
}

fn marital_status_to_db(status: MaritalStatus) -> &'static str {
    match status {
        MaritalStatus::Single => "single",
        MaritalStatus::Married => "married",
        MaritalStatus::Divorced => "divorced",
        MaritalStatus::Widowed => "widowed",
        MaritalStatus::Unknown => "unknown",
    }
}

fn parse_marital_status(value: &str) -> Option<MaritalStatus> {
    match value {
        "single" => Some(MaritalStatus::Single),
        "married" => Some(MaritalStatus::Married),
        "divorced" => Some(MaritalStatus::Divorced),
        "widowed" => Some(MaritalStatus::Widowed),
        "unknown" => Some(MaritalStatus::Unknown),
        _ => None,
    }
}

fn gender_to_db(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Other => "other",
        Gender::Unknown => "unknown",
    }
}

fn parse_gender(value: &str) -> Option<Gender> {
    match value {
        "male" => Some(Gender::Male),
        "female" => Some(Gender::Female),
        "other" => Some(Gender::Other),
        "unknown" => Some(Gender::Unknown),
        _ => None,
    }
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["members", "relationship_edges"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &'static str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
