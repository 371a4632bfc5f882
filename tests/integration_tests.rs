//! Integration tests for complete geolint runs
//!
//! Each test writes a JSON-lines fixture, runs one or more checks end to end
//! and inspects the files left in the output directory:
//! - `<channel>.jsonl` flagged entities (readable as input again)
//! - `geoms-<check>.db` feature layers
//! - `stats-<check>.db` counters keyed by the data timestamp
//!
//! Run with: cargo test --test integration_tests

use std::path::{Path, PathBuf};

use geolint_check::relations::RelationMode;
use geolint_check::{colocated, orphans, relations, unusual_tags, CheckConfig, OrphanPolicy};
use geolint_index::DedupConfig;
use geolint_model::{
    parse_timestamp, Cutoff, Entity, EntitySource, JsonlSource, KindMask, ModelError,
};
use rusqlite::Connection;
use tempfile::tempdir;

const FIXTURE: &str = r#"
{"type":"point","id":1,"timestamp":"2020-01-01T00:00:00Z","loc":[100,200]}
{"type":"point","id":2,"timestamp":"2020-03-01T00:00:00Z","loc":[100,200]}
{"type":"point","id":3,"timestamp":"2020-05-01T00:00:00Z","tags":{"created_by":"JOSM"},"loc":[300,400]}
{"type":"point","id":4,"timestamp":"2020-05-01T00:00:00Z","tags":{"amenity":"bench"},"loc":[500,600]}
{"type":"point","id":5,"timestamp":"2020-05-01T00:00:00Z","loc":[700,800]}
{"type":"point","id":6,"timestamp":"2020-05-01T00:00:00Z","loc":[700,900]}
{"type":"line","id":10,"timestamp":"2020-06-01T00:00:00Z","tags":{"landuse":"forest"},"refs":[{"id":1,"loc":[100,200]},{"id":5,"loc":[700,800]},{"id":6,"loc":[700,900]},{"id":1,"loc":[100,200]}]}
{"type":"line","id":11,"timestamp":"2020-06-01T00:00:00Z","tags":{"landuse":"meadow"},"refs":[{"id":5,"loc":[700,800]},{"id":6,"loc":[700,900]},{"id":2,"loc":[100,200]},{"id":5,"loc":[700,800]}]}
{"type":"line","id":12,"timestamp":"2020-06-01T00:00:00Z","refs":[{"id":5},{"id":6}]}
{"type":"group","id":20,"timestamp":"2020-07-01T00:00:00Z","tags":{"type":"multipolygon","landuse":"forest"},"members":[{"kind":"line","id":10,"role":"outer"},{"kind":"line","id":11,"role":"outer"},{"kind":"line","id":10,"role":"outer"}]}
{"type":"group","id":21,"timestamp":"2021-02-01T00:00:00Z","tags":{"type":"boundary","k":"v"},"members":[{"kind":"line","id":12,"role":""}]}
"#;

fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("input.jsonl");
    std::fs::write(&path, FIXTURE.trim_start()).unwrap();
    path
}

fn ids(path: &Path) -> Vec<i64> {
    let source = JsonlSource::open(path).unwrap();
    let entities: Vec<Entity> = source
        .open(KindMask::ALL)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    entities.iter().map(Entity::id).collect()
}

fn stats(dir: &Path, check: &str) -> Vec<(String, String, i64)> {
    let conn = Connection::open(dir.join(format!("stats-{check}.db"))).unwrap();
    let mut stmt = conn
        .prepare("SELECT date, key, value FROM stats ORDER BY rowid")
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .map(Result::unwrap)
        .collect();
    rows
}

fn stat(dir: &Path, check: &str, key: &str) -> i64 {
    stats(dir, check)
        .into_iter()
        .find(|(_, k, _)| k == key)
        .map(|(_, _, v)| v)
        .unwrap_or_else(|| panic!("no stat {key} for {check}"))
}

// ============================================================================
// colocated-nodes
// ============================================================================

#[test]
fn test_colocated_nodes_end_to_end() {
    let dir = tempdir().unwrap();
    let input = JsonlSource::open(write_fixture(dir.path())).unwrap();
    let out = dir.path().join("out");

    let report = colocated::run(
        &input,
        &CheckConfig::new(&out),
        &DedupConfig::new(dir.path()).with_buffer_capacity(1),
    )
    .unwrap();

    assert_eq!(ids(&out.join("colocated_nodes.jsonl")), vec![1, 2, 10, 11]);
    assert_eq!(report.counters.get("ways_referencing_colocated_nodes"), 2);
    assert_eq!(stat(&out, "colocated-nodes", "locations_with_colocated_nodes"), 1);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("locations_"))
        .collect();
    assert!(leftovers.is_empty(), "bucket files left: {leftovers:?}");
}

// ============================================================================
// orphans
// ============================================================================

#[test]
fn test_orphans_end_to_end() {
    let dir = tempdir().unwrap();
    let input = JsonlSource::open(write_fixture(dir.path())).unwrap();
    let out = dir.path().join("out");

    orphans::run(&input, &CheckConfig::new(&out), OrphanPolicy::default()).unwrap();

    // 3 only carries an ignorable tag, 4 is a real feature.
    assert_eq!(ids(&out.join("orphan_points.jsonl")), vec![3]);
    assert!(ids(&out.join("orphan_lines.jsonl")).is_empty());
    // 20 is tagged; 21's only extra key is not ignorable either.
    assert!(ids(&out.join("orphan_groups.jsonl")).is_empty());
    assert_eq!(stat(&out, "orphans", "orphan_nodes"), 1);
}

#[test]
fn test_orphans_respect_the_cutoff() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("input.jsonl"),
        concat!(
            r#"{"type":"point","id":1,"timestamp":"2020-01-01T00:00:00Z","loc":[1,1]}"#,
            "\n",
            r#"{"type":"point","id":2,"timestamp":"2022-01-01T00:00:00Z","loc":[2,2]}"#,
            "\n",
        ),
    )
    .unwrap();
    let input = JsonlSource::open(dir.path().join("input.jsonl")).unwrap();
    let out = dir.path().join("out");
    let config = CheckConfig::new(&out)
        .with_cutoff(Cutoff::before(parse_timestamp("2021-01-01T00:00:00Z").unwrap()));

    let report = orphans::run(&input, &config, OrphanPolicy::default()).unwrap();
    assert_eq!(ids(&out.join("orphan_points.jsonl")), vec![1]);
    // The data timestamp still covers entities past the cutoff.
    assert_eq!(
        report.run_timestamp,
        parse_timestamp("2022-01-01T00:00:00Z").unwrap()
    );
}

// ============================================================================
// relation-problems / multipolygon-problems
// ============================================================================

#[test]
fn test_relation_problems_end_to_end() {
    let dir = tempdir().unwrap();
    let input = JsonlSource::open(write_fixture(dir.path())).unwrap();
    let out = dir.path().join("out");

    let report = relations::run(
        &input,
        &CheckConfig::new(&out),
        RelationMode::RelationProblems,
    )
    .unwrap();

    assert_eq!(ids(&out.join("multipolygon_duplicate_way.jsonl")), vec![20]);
    assert_eq!(ids(&out.join("multipolygon_same_tags.jsonl")), vec![20]);
    assert_eq!(ids(&out.join("multipolygon_same_keys.jsonl")), vec![20]);
    assert_eq!(ids(&out.join("boundary_empty_role.jsonl")), vec![21]);
    assert_eq!(ids(&out.join("boundary_no_boundary_tag.jsonl")), vec![21]);
    assert!(ids(&out.join("multipolygon_old_style.jsonl")).is_empty());

    // Line 10 is listed twice but written once per member channel.
    assert_eq!(
        ids(&out.join("multipolygon_same_tags_all.jsonl")),
        vec![10, 11]
    );
    assert_eq!(report.counters.get("boundary_empty_role_members"), 1);

    let conn = Connection::open(out.join("geoms-relation-problems.db")).unwrap();
    let marked: Vec<i64> = conn
        .prepare("SELECT DISTINCT member_id FROM multipolygon_same_keys_lines WHERE mark = 1")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(marked, vec![11]);

    let geometry_type: String = conn
        .query_row(
            "SELECT geometry_type FROM geometry_columns WHERE table_name = ?1",
            ["multipolygon_same_tags_lines"],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(geometry_type, "LINESTRING");
}

#[test]
fn test_multipolygon_problems_end_to_end() {
    let dir = tempdir().unwrap();
    let input = JsonlSource::open(write_fixture(dir.path())).unwrap();
    let out = dir.path().join("out");

    relations::run(
        &input,
        &CheckConfig::new(&out),
        RelationMode::MultipolygonProblems,
    )
    .unwrap();

    assert_eq!(stat(&out, "multipolygon-problems", "multipolygon_relations"), 1);
    assert_eq!(
        stat(&out, "multipolygon-problems", "multipolygon_relation_members"),
        3
    );
    assert!(!out.join("boundary_empty_role.jsonl").exists());
}

// ============================================================================
// unusual-tags
// ============================================================================

#[test]
fn test_unusual_tags_end_to_end() {
    let dir = tempdir().unwrap();
    let input = JsonlSource::open(write_fixture(dir.path())).unwrap();
    let out = dir.path().join("out");

    unusual_tags::run(&input, &CheckConfig::new(&out)).unwrap();

    assert_eq!(ids(&out.join("nwr_key_short.jsonl")), vec![21]);
    assert_eq!(stat(&out, "unusual-tags", "nodes"), 6);
    assert_eq!(stat(&out, "unusual-tags", "ways"), 3);
    assert_eq!(stat(&out, "unusual-tags", "relations"), 2);
}

// ============================================================================
// Stats and errors
// ============================================================================

#[test]
fn test_stats_rows_accumulate_per_run() {
    let dir = tempdir().unwrap();
    let input = JsonlSource::open(write_fixture(dir.path())).unwrap();
    let out = dir.path().join("out");

    for _ in 0..2 {
        unusual_tags::run(&input, &CheckConfig::new(&out)).unwrap();
    }

    let rows = stats(&out, "unusual-tags");
    let node_rows: Vec<_> = rows.iter().filter(|(_, k, _)| k == "nodes").collect();
    assert_eq!(node_rows.len(), 2);
    assert!(node_rows
        .iter()
        .all(|(date, _, value)| date == "2021-02-01T00:00:00Z" && *value == 6));
}

#[test]
fn test_malformed_input_aborts_the_run() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.jsonl");
    std::fs::write(
        &path,
        concat!(
            r#"{"type":"point","id":1,"timestamp":"2020-01-01T00:00:00Z","loc":[1,1]}"#,
            "\n",
            r#"{"type":"point","id":2"#,
            "\n",
        ),
    )
    .unwrap();
    let input = JsonlSource::open(&path).unwrap();

    let err = unusual_tags::run(&input, &CheckConfig::new(dir.path().join("out"))).unwrap_err();
    assert!(matches!(
        err,
        geolint_check::CheckError::Model(ModelError::Malformed { line: 2, .. })
    ));
    assert!(!dir.path().join("out").join("stats-unusual-tags.db").exists());
}

#[test]
fn test_channel_output_is_valid_input() {
    let dir = tempdir().unwrap();
    let input = JsonlSource::open(write_fixture(dir.path())).unwrap();
    let out = dir.path().join("out");
    colocated::run(&input, &CheckConfig::new(&out), &DedupConfig::new(dir.path())).unwrap();

    // Re-running on the flagged points alone finds the same location.
    let flagged = JsonlSource::open(out.join("colocated_nodes.jsonl")).unwrap();
    let again = dir.path().join("again");
    let report =
        colocated::run(&flagged, &CheckConfig::new(&again), &DedupConfig::new(&again)).unwrap();
    assert_eq!(report.counters.get("locations_with_colocated_nodes"), 1);
    assert_eq!(ids(&again.join("colocated_nodes.jsonl")), vec![1, 2, 10, 11]);
}
