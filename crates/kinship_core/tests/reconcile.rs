use kinship_core::db::open_db_in_memory;
use kinship_core::{
    scan_reciprocity, DesiredRelationship, FamilyRepository, MemberDraft, ReconcileError,
    ReconcileService, RelationshipKind, SqliteFamilyRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn member(conn: &Connection, family: Uuid, name: &str, birth_year: i32) -> kinship_core::Member {
    let repo = SqliteFamilyRepository::try_new(conn).unwrap();
    let mut draft = MemberDraft::new(family, name);
    draft.birth_year = Some(birth_year);
    repo.create_member(&draft).unwrap()
}

fn edge_rows(conn: &Connection) -> Vec<(String, String, String)> {
    let mut stmt = conn
        .prepare(
            "SELECT source_uuid, target_uuid, kind
             FROM relationship_edges
             ORDER BY source_uuid, target_uuid, kind;",
        )
        .unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut result = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        result.push((
            row.get(0).unwrap(),
            row.get(1).unwrap(),
            row.get(2).unwrap(),
        ));
    }
    result
}

#[test]
fn reconcile_writes_reciprocal_pairs() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let parent = member(&conn, family, "Parent", 1940);
    let child = member(&conn, family, "Child", 1970);

    let service = ReconcileService::new(SqliteFamilyRepository::try_new(&conn).unwrap());
    service
        .reconcile(
            parent.uuid,
            &[DesiredRelationship::new(
                RelationshipKind::Parent,
                child.uuid,
            )],
        )
        .unwrap();

    let rows = edge_rows(&conn);
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&(
        parent.uuid.to_string(),
        child.uuid.to_string(),
        "parent".to_string()
    )));
    assert!(rows.contains(&(
        child.uuid.to_string(),
        parent.uuid.to_string(),
        "child".to_string()
    )));
}

#[test]
fn every_edge_has_its_reciprocal_after_reconcile_sequences() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let a = member(&conn, family, "A", 1940);
    let b = member(&conn, family, "B", 1942);
    let c = member(&conn, family, "C", 1970);
    let d = member(&conn, family, "D", 1972);

    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let service = ReconcileService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    service
        .reconcile(
            a.uuid,
            &[
                DesiredRelationship::new(RelationshipKind::Spouse, b.uuid),
                DesiredRelationship::new(RelationshipKind::Parent, c.uuid),
                DesiredRelationship::new(RelationshipKind::Parent, d.uuid),
            ],
        )
        .unwrap();
    service
        .reconcile(
            c.uuid,
            &[
                DesiredRelationship::new(RelationshipKind::Child, a.uuid),
                DesiredRelationship::new(RelationshipKind::Spouse, d.uuid),
            ],
        )
        .unwrap();
    service
        .reconcile(
            d.uuid,
            &[DesiredRelationship::new(RelationshipKind::Spouse, c.uuid)],
        )
        .unwrap();

    let records = repo.list_members(family).unwrap();
    assert!(scan_reciprocity(&records).is_empty());
}

#[test]
fn reconcile_is_a_full_replace() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let m = member(&conn, family, "M", 1970);
    let p = member(&conn, family, "P", 1940);
    let s = member(&conn, family, "S", 1972);

    let service = ReconcileService::new(SqliteFamilyRepository::try_new(&conn).unwrap());
    service
        .reconcile(
            m.uuid,
            &[DesiredRelationship::new(RelationshipKind::Child, p.uuid)],
        )
        .unwrap();
    service
        .reconcile(
            m.uuid,
            &[DesiredRelationship::new(RelationshipKind::Spouse, s.uuid)],
        )
        .unwrap();

    let rows = edge_rows(&conn);
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .all(|(_, _, kind)| kind == "spouse"));
    assert!(!rows
        .iter()
        .any(|(source, _, _)| source == &p.uuid.to_string()));
}

#[test]
fn duplicate_desired_entries_collapse_to_one_pair() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let a = member(&conn, family, "A", 1950);
    let b = member(&conn, family, "B", 1952);

    let service = ReconcileService::new(SqliteFamilyRepository::try_new(&conn).unwrap());
    service
        .reconcile(
            a.uuid,
            &[
                DesiredRelationship::new(RelationshipKind::Spouse, b.uuid),
                DesiredRelationship::new(RelationshipKind::Spouse, b.uuid),
            ],
        )
        .unwrap();

    assert_eq!(edge_rows(&conn).len(), 2);
}

#[test]
fn reconcile_rejects_missing_related_member() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let a = member(&conn, family, "A", 1950);
    let ghost = Uuid::new_v4();

    let service = ReconcileService::new(SqliteFamilyRepository::try_new(&conn).unwrap());
    let err = service
        .reconcile(
            a.uuid,
            &[DesiredRelationship::new(RelationshipKind::Spouse, ghost)],
        )
        .unwrap_err();
    assert!(matches!(err, ReconcileError::RelatedMemberNotFound(id) if id == ghost));
}

#[test]
fn reconcile_rejects_cross_family_relationships() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let other_family = Uuid::new_v4();
    let a = member(&conn, family, "A", 1950);
    let outsider = member(&conn, other_family, "Outsider", 1952);

    let service = ReconcileService::new(SqliteFamilyRepository::try_new(&conn).unwrap());
    let err = service
        .reconcile(
            a.uuid,
            &[DesiredRelationship::new(
                RelationshipKind::Spouse,
                outsider.uuid,
            )],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::CrossFamilyRelationship { related_id, .. } if related_id == outsider.uuid
    ));
    assert!(edge_rows(&conn).is_empty());
}

#[test]
fn failed_edge_write_rolls_back_the_previous_edge_set() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let m = member(&conn, family, "M", 1970);
    let p = member(&conn, family, "P", 1940);
    let s = member(&conn, family, "S", 1972);

    let service = ReconcileService::new(SqliteFamilyRepository::try_new(&conn).unwrap());
    service
        .reconcile(
            m.uuid,
            &[DesiredRelationship::new(RelationshipKind::Child, p.uuid)],
        )
        .unwrap();

    conn.execute_batch(&format!(
        "CREATE TRIGGER relationship_edges_fail_insert_test
         BEFORE INSERT ON relationship_edges
         WHEN NEW.target_uuid = '{}'
         BEGIN
             SELECT RAISE(ABORT, 'forced insert failure');
         END;",
        s.uuid
    ))
    .unwrap();

    let result = service.reconcile(
        m.uuid,
        &[DesiredRelationship::new(RelationshipKind::Spouse, s.uuid)],
    );
    assert!(matches!(result, Err(ReconcileError::EdgeWrite(_))));

    // The old parent/child pair must still be intact after rollback.
    let rows = edge_rows(&conn);
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&(
        m.uuid.to_string(),
        p.uuid.to_string(),
        "child".to_string()
    )));
}
