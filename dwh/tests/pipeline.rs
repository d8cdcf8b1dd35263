//! End-to-end load pipeline tests over the in-memory source and store.

use std::collections::HashSet;

use chrono::NaiveDate;

use dwh::error::ErrorKind;
use dwh::pipeline::LoadPipeline;
use dwh::schema::{
    DimensionRef, DimensionSchema, FactSchema, MeasureColumn, MeasureKind, WarehouseSchema,
};
use dwh::source::memory::MemorySnapshotSource;
use dwh::store::WarehouseStore;
use dwh::store::memory::MemoryWarehouse;
use dwh::types::{Cell, DimensionVersion, StagingRow, SurrogateKey, open_valid_to};

fn date(raw: &str) -> NaiveDate {
    raw.parse().unwrap()
}

fn row(value: serde_json::Value) -> StagingRow {
    StagingRow::from_json(&value).unwrap()
}

fn school_schema() -> WarehouseSchema {
    WarehouseSchema {
        dimensions: vec![
            DimensionSchema::type2("students", "student_id"),
            DimensionSchema::type2("teachers", "teacher_id"),
        ],
        facts: vec![FactSchema {
            name: "lessons".to_string(),
            natural_key: "lesson_id".to_string(),
            event_date: "scheduled_start_time".to_string(),
            references: vec![
                DimensionRef {
                    role: "student".to_string(),
                    dimension: "students".to_string(),
                    key_column: "student_id".to_string(),
                },
                DimensionRef {
                    role: "teacher".to_string(),
                    dimension: "teachers".to_string(),
                    key_column: "teacher_id".to_string(),
                },
            ],
            measures: vec![
                MeasureColumn {
                    name: "duration_minutes".to_string(),
                    kind: MeasureKind::Int,
                },
                MeasureColumn {
                    name: "lesson_status".to_string(),
                    kind: MeasureKind::Text,
                },
            ],
        }],
    }
}

async fn seed_empty_snapshots(source: &MemorySnapshotSource) {
    source.set_dimension_snapshot("students", vec![]).await;
    source.set_dimension_snapshot("teachers", vec![]).await;
    source.set_fact_snapshot("lessons", vec![]).await;
}

/// Structural projection of a version for comparisons that should ignore
/// freshness markers.
fn shape(version: &DimensionVersion) -> (i64, i64, NaiveDate, NaiveDate, bool, Vec<(String, Cell)>) {
    (
        version.surrogate_key.get(),
        version.natural_key,
        version.valid_from,
        version.valid_to,
        version.is_current,
        version
            .attributes
            .iter()
            .map(|(column, cell)| (column.clone(), cell.clone()))
            .collect(),
    )
}

#[tokio::test]
async fn test_versioning_scenario_for_a_grade_change() {
    let source = MemorySnapshotSource::new();
    let store = MemoryWarehouse::new();
    seed_empty_snapshots(&source).await;
    let pipeline = LoadPipeline::new(school_schema(), source.clone(), store.clone());

    // 2024-01-01: Ann first appears in grade 5A.
    source
        .set_dimension_snapshot(
            "students",
            vec![row(serde_json::json!({"student_id": 55, "name": "Ann", "grade": "5A"}))],
        )
        .await;
    pipeline.run(date("2024-01-01")).await.unwrap();

    // 2024-02-01: unchanged reload.
    let report = pipeline.run(date("2024-02-01")).await.unwrap();
    assert_eq!(report.dimensions[0].1.unchanged, 1);

    let rows = store.dimension_rows("students").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].surrogate_key, SurrogateKey::new(1));
    assert!(rows[0].is_current);
    assert_eq!(rows[0].valid_to, open_valid_to());

    // 2024-03-01: Ann moves to grade 6A.
    source
        .set_dimension_snapshot(
            "students",
            vec![row(serde_json::json!({"student_id": 55, "name": "Ann", "grade": "6A"}))],
        )
        .await;
    pipeline.run(date("2024-03-01")).await.unwrap();

    let rows = store.dimension_rows("students").await;
    assert_eq!(rows.len(), 2);

    let closed = &rows[0];
    assert_eq!(closed.surrogate_key, SurrogateKey::new(1));
    assert_eq!(closed.valid_from, date("2024-01-01"));
    assert_eq!(closed.valid_to, date("2024-02-29"));
    assert!(!closed.is_current);
    assert_eq!(closed.attributes.get("grade"), Some(&Cell::String("5A".to_string())));

    let open = &rows[1];
    assert_eq!(open.surrogate_key, SurrogateKey::new(2));
    assert_eq!(open.valid_from, date("2024-03-01"));
    assert_eq!(open.valid_to, open_valid_to());
    assert!(open.is_current);
    assert_eq!(open.attributes.get("grade"), Some(&Cell::String("6A".to_string())));
    // The unchanged attribute carries through onto the new version.
    assert_eq!(open.attributes.get("name"), Some(&Cell::String("Ann".to_string())));
}

#[tokio::test]
async fn test_identical_rerun_is_idempotent() {
    let source = MemorySnapshotSource::new();
    let store = MemoryWarehouse::new();
    seed_empty_snapshots(&source).await;
    let pipeline = LoadPipeline::new(school_schema(), source.clone(), store.clone());

    source
        .set_dimension_snapshot(
            "students",
            vec![
                row(serde_json::json!({"student_id": 55, "name": "Ann", "grade": "5A"})),
                row(serde_json::json!({"student_id": 56, "name": "Bob", "grade": "6B"})),
            ],
        )
        .await;

    pipeline.run(date("2024-01-01")).await.unwrap();
    let emissions_after_first = store.version_emissions("students").await.len();

    let report = pipeline.run(date("2024-01-15")).await.unwrap();

    // No new versions, no key allocations, no validity changes.
    assert_eq!(report.dimensions[0].1.unchanged, 2);
    assert_eq!(report.dimensions[0].1.opened, 0);
    assert_eq!(
        store.version_emissions("students").await.len(),
        emissions_after_first
    );

    let rows = store.dimension_rows("students").await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|version| version.valid_from == date("2024-01-01")));
}

#[tokio::test]
async fn test_exactly_one_current_version_per_natural_key() {
    let source = MemorySnapshotSource::new();
    let store = MemoryWarehouse::new();
    seed_empty_snapshots(&source).await;
    let pipeline = LoadPipeline::new(school_schema(), source.clone(), store.clone());

    // Three loads, two of which change tracked attributes.
    for (load_date, grade, status) in [
        ("2024-01-01", "5A", "active"),
        ("2024-03-01", "6A", "active"),
        ("2024-05-01", "6A", "inactive"),
    ] {
        source
            .set_dimension_snapshot(
                "students",
                vec![row(
                    serde_json::json!({"student_id": 55, "grade": grade, "status": status}),
                )],
            )
            .await;
        pipeline.run(date(load_date)).await.unwrap();
    }

    let rows = store.dimension_rows("students").await;
    assert_eq!(rows.len(), 3);

    let current: Vec<_> = rows.iter().filter(|version| version.is_current).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].valid_to, open_valid_to());
    // The deactivated entity still has its full history; its latest version
    // just reflects the new status.
    assert_eq!(
        current[0].attributes.get("status"),
        Some(&Cell::String("inactive".to_string()))
    );

    // Closed windows are contiguous and ordered.
    assert_eq!(rows[0].valid_to, date("2024-02-29"));
    assert_eq!(rows[1].valid_from, date("2024-03-01"));
    assert_eq!(rows[1].valid_to, date("2024-04-30"));
    assert_eq!(rows[2].valid_from, date("2024-05-01"));
}

#[tokio::test]
async fn test_surrogate_keys_are_never_reused() {
    let source = MemorySnapshotSource::new();
    let store = MemoryWarehouse::new();
    seed_empty_snapshots(&source).await;
    let pipeline = LoadPipeline::new(school_schema(), source.clone(), store.clone());

    for (load_date, grade) in [("2024-01-01", "5A"), ("2024-03-01", "6A"), ("2024-06-01", "7A")] {
        source
            .set_dimension_snapshot(
                "students",
                vec![row(serde_json::json!({"student_id": 55, "grade": grade}))],
            )
            .await;
        pipeline.run(date(load_date)).await.unwrap();
    }

    let rows = store.dimension_rows("students").await;
    let keys: HashSet<i64> = rows.iter().map(|version| version.surrogate_key.get()).collect();
    assert_eq!(keys.len(), rows.len());
    assert_eq!(keys, HashSet::from([1, 2, 3]));
}

#[tokio::test]
async fn test_facts_resolve_as_of_the_event_date() {
    let source = MemorySnapshotSource::new();
    let store = MemoryWarehouse::new();
    seed_empty_snapshots(&source).await;
    let pipeline = LoadPipeline::new(school_schema(), source.clone(), store.clone());

    source
        .set_dimension_snapshot(
            "students",
            vec![row(serde_json::json!({"student_id": 55, "grade": "5A"}))],
        )
        .await;
    source
        .set_dimension_snapshot(
            "teachers",
            vec![row(serde_json::json!({"teacher_id": 9, "hourly_rate": 25.0}))],
        )
        .await;
    pipeline.run(date("2024-01-01")).await.unwrap();

    // The teacher's hourly rate changes on 2024-03-01, and the lessons
    // snapshot carries one lesson from before the change and one from after.
    source
        .set_dimension_snapshot(
            "teachers",
            vec![row(serde_json::json!({"teacher_id": 9, "hourly_rate": 30.0}))],
        )
        .await;
    source
        .set_fact_snapshot(
            "lessons",
            vec![
                row(serde_json::json!({
                    "lesson_id": 1, "scheduled_start_time": "2024-02-10T10:00:00Z",
                    "student_id": 55, "teacher_id": 9,
                    "duration_minutes": 60, "lesson_status": "completed"
                })),
                row(serde_json::json!({
                    "lesson_id": 2, "scheduled_start_time": "2024-03-02T10:00:00Z",
                    "student_id": 55, "teacher_id": 9,
                    "duration_minutes": 90, "lesson_status": "scheduled"
                })),
            ],
        )
        .await;
    pipeline.run(date("2024-03-01")).await.unwrap();

    let teacher_rows = store.dimension_rows("teachers").await;
    assert_eq!(teacher_rows.len(), 2);
    let pre_change_key = teacher_rows[0].surrogate_key;
    let post_change_key = teacher_rows[1].surrogate_key;

    let lessons = store.fact_rows("lessons").await;
    assert_eq!(lessons.len(), 2);

    // The lesson dated before the rate change resolves to the pre-change
    // version, not the teacher's present-day one.
    assert_eq!(lessons[0].fact_key, 1);
    assert_eq!(lessons[0].dimension_keys.get("teacher"), Some(&pre_change_key));
    assert_eq!(lessons[0].date_key, 20240210);

    assert_eq!(lessons[1].dimension_keys.get("teacher"), Some(&post_change_key));
    assert_eq!(lessons[1].date_key, 20240302);
}

#[tokio::test]
async fn test_unknown_reference_quarantines_without_aborting_the_batch() {
    let source = MemorySnapshotSource::new();
    let store = MemoryWarehouse::new();
    seed_empty_snapshots(&source).await;
    let pipeline = LoadPipeline::new(school_schema(), source.clone(), store.clone());

    source
        .set_dimension_snapshot(
            "students",
            vec![row(serde_json::json!({"student_id": 55, "grade": "5A"}))],
        )
        .await;
    source
        .set_dimension_snapshot(
            "teachers",
            vec![row(serde_json::json!({"teacher_id": 9, "hourly_rate": 25.0}))],
        )
        .await;
    source
        .set_fact_snapshot(
            "lessons",
            vec![
                row(serde_json::json!({
                    "lesson_id": 1, "scheduled_start_time": "2024-01-10T10:00:00Z",
                    "student_id": 404, "teacher_id": 9
                })),
                row(serde_json::json!({
                    "lesson_id": 2, "scheduled_start_time": "2024-01-10T11:00:00Z",
                    "student_id": 55, "teacher_id": 9
                })),
            ],
        )
        .await;

    let report = pipeline.run(date("2024-01-01")).await.unwrap();

    let (_, lesson_stats) = &report.facts[0];
    assert_eq!(lesson_stats.loaded, 1);
    assert_eq!(lesson_stats.unresolved_quarantined, 1);
    assert_eq!(report.quarantined_rows(), 1);

    let lessons = store.fact_rows("lessons").await;
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0].fact_key, 2);
}

#[tokio::test]
async fn test_missing_dimension_snapshot_aborts_before_facts() {
    let source = MemorySnapshotSource::new();
    let store = MemoryWarehouse::new();
    let pipeline = LoadPipeline::new(school_schema(), source.clone(), store.clone());

    // Only students is registered; the teachers snapshot is missing.
    source
        .set_dimension_snapshot(
            "students",
            vec![row(serde_json::json!({"student_id": 55, "grade": "5A"}))],
        )
        .await;
    source
        .set_fact_snapshot(
            "lessons",
            vec![row(serde_json::json!({
                "lesson_id": 1, "scheduled_start_time": "2024-01-10T10:00:00Z",
                "student_id": 55, "teacher_id": 9
            }))],
        )
        .await;

    let err = pipeline.run(date("2024-01-01")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SnapshotMissing);

    // The fact stage never ran.
    assert!(store.fact_emissions("lessons").await.is_empty());

    // The lock was released on abort, so a repaired re-run goes through.
    source.set_dimension_snapshot("teachers", vec![]).await;
    let report = pipeline.run(date("2024-01-01")).await.unwrap();
    assert_eq!(report.dimensions.len(), 2);
}

#[tokio::test]
async fn test_restart_after_mid_run_abort_converges() {
    let schema = school_schema();

    let students = vec![row(serde_json::json!({"student_id": 55, "grade": "5A"}))];
    let teachers = vec![row(serde_json::json!({"teacher_id": 9, "hourly_rate": 25.0}))];
    let lessons = vec![row(serde_json::json!({
        "lesson_id": 1, "scheduled_start_time": "2024-01-20T10:00:00Z",
        "student_id": 55, "teacher_id": 9,
        "duration_minutes": 60, "lesson_status": "completed"
    }))];

    // Interrupted warehouse: the first run aborts in the fact stage because
    // the lessons snapshot is unreadable, after dimensions were written.
    let source = MemorySnapshotSource::new();
    let interrupted = MemoryWarehouse::new();
    let pipeline = LoadPipeline::new(schema.clone(), source.clone(), interrupted.clone());

    source.set_dimension_snapshot("students", students.clone()).await;
    source.set_dimension_snapshot("teachers", teachers.clone()).await;

    let err = pipeline.run(date("2024-01-15")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SnapshotMissing);
    assert!(!interrupted.dimension_rows("students").await.is_empty());

    // Full re-run from the beginning once the snapshot is available.
    source.set_fact_snapshot("lessons", lessons.clone()).await;
    pipeline.run(date("2024-01-15")).await.unwrap();

    // Uninterrupted warehouse loaded in one clean run.
    let source = MemorySnapshotSource::new();
    let uninterrupted = MemoryWarehouse::new();
    let pipeline = LoadPipeline::new(schema, source.clone(), uninterrupted.clone());

    source.set_dimension_snapshot("students", students).await;
    source.set_dimension_snapshot("teachers", teachers).await;
    source.set_fact_snapshot("lessons", lessons).await;
    pipeline.run(date("2024-01-15")).await.unwrap();

    // Both warehouses converge to the same visible state.
    let interrupted_students: Vec<_> = interrupted
        .dimension_rows("students")
        .await
        .iter()
        .map(shape)
        .collect();
    let uninterrupted_students: Vec<_> = uninterrupted
        .dimension_rows("students")
        .await
        .iter()
        .map(shape)
        .collect();
    assert_eq!(interrupted_students, uninterrupted_students);

    let interrupted_lessons: Vec<_> = interrupted
        .fact_rows("lessons")
        .await
        .iter()
        .map(|fact| (fact.fact_key, fact.date_key, fact.dimension_keys.clone()))
        .collect();
    let uninterrupted_lessons: Vec<_> = uninterrupted
        .fact_rows("lessons")
        .await
        .iter()
        .map(|fact| (fact.fact_key, fact.date_key, fact.dimension_keys.clone()))
        .collect();
    assert_eq!(interrupted_lessons, uninterrupted_lessons);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected_by_the_run_lock() {
    let source = MemorySnapshotSource::new();
    let store = MemoryWarehouse::new();
    seed_empty_snapshots(&source).await;
    let pipeline = LoadPipeline::new(school_schema(), source.clone(), store.clone());

    // Another writer holds the lock.
    store.acquire_run_lock().await.unwrap();

    let err = pipeline.run(date("2024-01-01")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    store.release_run_lock().await.unwrap();
    pipeline.run(date("2024-01-01")).await.unwrap();
}
