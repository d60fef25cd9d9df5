use kinship_core::db::open_db_in_memory;
use kinship_core::{
    build_tree, scan_reciprocity, FamilyRepository, ImportService, RawRow, SqliteFamilyRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn row(pairs: &[(&str, &str)]) -> RawRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn edge_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM relationship_edges;", [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn import_scenario_produces_one_edge_pair_and_a_rooted_tree() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    let rows = vec![
        row(&[("full_name", "A"), ("year_of_birth", "1950")]),
        row(&[
            ("full_name", "B"),
            ("year_of_birth", "1952"),
            ("parents", "A"),
        ]),
    ];
    let report = service.import(&rows, family).unwrap();

    assert_eq!(report.members.len(), 2);
    assert!(report.warnings.is_empty());
    assert!(report.skipped_relationships.is_empty());
    assert_eq!(edge_count(&conn), 2);

    let repo = SqliteFamilyRepository::try_new(&conn).unwrap();
    let records = repo.list_members(family).unwrap();
    assert!(scan_reciprocity(&records).is_empty());

    let outcome = build_tree(&records);
    assert_eq!(outcome.roots.len(), 1);
    assert_eq!(outcome.roots[0].member.full_name, "A");
    assert_eq!(outcome.roots[0].children.len(), 1);
    assert_eq!(outcome.roots[0].children[0].member.full_name, "B");
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn forward_references_resolve_after_all_rows_exist() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    // The child row precedes its parent's row.
    let rows = vec![
        row(&[
            ("name", "Child"),
            ("born", "1980"),
            ("parents", "Parent"),
        ]),
        row(&[("name", "Parent"), ("born", "1950")]),
    ];
    let report = service.import(&rows, family).unwrap();

    assert!(report.skipped_relationships.is_empty());
    assert_eq!(edge_count(&conn), 2);
}

#[test]
fn bidirectional_declarations_collapse_to_one_pair() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    // The same edge described from both sides: a `children` field on the
    // parent row and a `parents` field on the child row.
    let rows = vec![
        row(&[
            ("name", "Parent"),
            ("born", "1950"),
            ("children", "Child"),
        ]),
        row(&[
            ("name", "Child"),
            ("born", "1980"),
            ("parents", "Parent"),
        ]),
    ];
    service.import(&rows, family).unwrap();

    assert_eq!(edge_count(&conn), 2);
}

#[test]
fn unresolvable_names_are_skipped_not_fatal() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    let rows = vec![row(&[
        ("name", "Ali"),
        ("born", "1950"),
        ("spouses", "Nobody Known"),
    ])];
    let report = service.import(&rows, family).unwrap();

    assert_eq!(report.members.len(), 1);
    assert_eq!(report.skipped_relationships.len(), 1);
    assert_eq!(report.skipped_relationships[0].related_name, "Nobody Known");
    assert_eq!(edge_count(&conn), 0);
}

#[test]
fn defaulted_rows_still_import_with_warnings() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    let rows = vec![
        row(&[("occupation", "farmer")]),
        row(&[("name", "Dated"), ("born", "50")]),
    ];
    let report = service.import(&rows, family).unwrap();

    assert_eq!(report.members.len(), 2);
    assert_eq!(report.warnings.missing_names, vec![0]);
    assert_eq!(report.warnings.defaulted_birth_years, vec![0, 1]);
    assert_eq!(report.members[0].full_name, "Unknown 0");
    assert_eq!(report.members[0].birth_year, Some(1970));
    assert_eq!(report.members[1].birth_year, Some(1971));
}

#[test]
fn large_batches_of_missing_birth_years_still_import() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    let rows: Vec<RawRow> = (0..140)
        .map(|index| {
            let name = format!("Person {index}");
            row(&[("full_name", name.as_str())])
        })
        .collect();
    let report = service.import(&rows, family).unwrap();

    assert_eq!(report.members.len(), 140);
    assert_eq!(report.warnings.defaulted_birth_years.len(), 140);
    assert!(report
        .members
        .iter()
        .all(|member| member.birth_year.is_some()
            && member.birth_year <= Some(kinship_core::model::member::MAX_YEAR)));
}

#[test]
fn duplicate_names_keep_first_row_canonical_for_relationships() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    let rows = vec![
        row(&[("name", "Ali"), ("born", "1950")]),
        row(&[("name", "ali"), ("born", "1990")]),
        row(&[("name", "Sara"), ("born", "1975"), ("parents", "Ali")]),
    ];
    let report = service.import(&rows, family).unwrap();

    assert_eq!(report.warnings.duplicate_names, vec!["ali".to_string()]);

    // Sara's parent edge must point at the first Ali row.
    let first_ali = report
        .members
        .iter()
        .find(|member| member.birth_year == Some(1950))
        .unwrap();
    let sara = report
        .members
        .iter()
        .find(|member| member.full_name == "Sara")
        .unwrap();
    let linked: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM relationship_edges
             WHERE source_uuid = ?1 AND target_uuid = ?2 AND kind = 'parent';",
            [first_ali.uuid.to_string(), sara.uuid.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(linked, 1);
}

#[test]
fn reimporting_the_same_batch_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let family = Uuid::new_v4();
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn).unwrap());

    let rows = vec![
        row(&[("name", "A"), ("born", "1950"), ("spouses", "B")]),
        row(&[("name", "B"), ("born", "1952")]),
    ];
    let first = service.import(&rows, family).unwrap();
    let second = service.import(&rows, family).unwrap();

    assert_eq!(first.members, second.members);
    let member_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM members;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(member_count, 2);
    assert_eq!(edge_count(&conn), 2);
}
