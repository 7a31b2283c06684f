mod common;

use common::MockDestination;
use esw::app::{Application, RunSummary};
use esw::config::Config;
use esw::WriterError;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn data_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let tables = dir.path().join("in").join("tables");
    fs::create_dir_all(&tables).unwrap();
    for (name, content) in files {
        fs::write(tables.join(name), content).unwrap();
    }
    dir
}

fn app(tables: Value, dir: &Path) -> Application {
    let config = Config::from_value(json!({
        "parameters": {
            "elastic": { "host": "localhost", "port": 9200, "bulkSize": 2 },
            "tables": tables
        }
    }))
    .unwrap();
    Application::new(config, dir).unwrap()
}

#[tokio::test]
async fn loads_exported_tables_and_skips_the_rest() {
    let dir = data_dir(&[
        ("in.c-main.lang.csv", "id,name\n1,czech\n2,english\n3,french\n"),
        ("extra.CSV", "id,name\n1,x\n"),
    ]);
    let app = app(
        json!([
            { "tableId": "in.c-main.lang", "index": "lang", "type": "language", "id": "id",
              "items": [ { "name": "id", "dbName": "id", "type": "long", "nullable": false } ] },
            { "file": "extra.CSV", "index": "extra", "type": "doc", "export": false }
        ]),
        dir.path(),
    );
    let dest = MockDestination::new();

    let summary = app.run(&dest).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            processed: 1,
            skipped: 1,
            documents: 3
        }
    );
    assert_eq!(dest.batch_sizes(), vec![2, 1]);
    assert_eq!(dest.doc_count("lang"), 3);
    assert_eq!(dest.doc_count("extra"), 0);
}

#[tokio::test]
async fn uploaded_file_must_be_csv() {
    let dir = data_dir(&[("data.txt", "id\n1\n")]);
    let app = app(json!([{ "file": "data.txt", "index": "idx", "type": "doc" }]), dir.path());

    let err = app.run(&MockDestination::new()).await.unwrap_err();

    assert!(err.is_user_error());
    assert_eq!(err.to_string(), "File data.txt - Export failed. Only csv files are supported");
}

#[tokio::test]
async fn missing_source_file_is_a_user_error() {
    let dir = data_dir(&[]);
    let app = app(json!([{ "tableId": "in.c-main.gone", "index": "idx", "type": "doc" }]), dir.path());

    let err = app.run(&MockDestination::new()).await.unwrap_err();

    assert!(err.is_user_error());
    assert!(err.to_string().starts_with("Table in.c-main.gone - Cannot open source file"));
}

#[tokio::test]
async fn first_failure_stops_remaining_tables() {
    let dir = data_dir(&[
        ("first.csv", "name\nczech\n"),
        ("second.csv", "id,name\n1,english\n"),
    ]);
    let app = app(
        json!([
            { "tableId": "first", "index": "first", "type": "doc", "id": "id" },
            { "tableId": "second", "index": "second", "type": "doc", "id": "id" }
        ]),
        dir.path(),
    );
    let dest = MockDestination::new();

    let err = app.run(&dest).await.unwrap_err();

    assert!(matches!(err, WriterError::Table { .. }));
    assert_eq!(
        err.to_string(),
        "Table first - CSV error: Missing id column \"id\" on line \"2\"."
    );
    assert!(dest.batch_sizes().is_empty());
    assert_eq!(dest.doc_count("second"), 0);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_load() {
    let config = Config::from_value(json!({
        "parameters": {
            "elastic": { "host": "localhost", "port": 9200 },
            "tables": [ { "tableId": "a", "file": "a.csv", "index": "idx", "type": "doc" } ]
        }
    }))
    .unwrap();

    let err = Application::new(config, "/nonexistent").err().unwrap();
    assert!(matches!(err, WriterError::Config(_)));
}

#[tokio::test]
async fn mapping_action_reports_indices() {
    let config = Config::from_value(json!({
        "action": "mapping",
        "parameters": { "elastic": { "host": "localhost", "port": 9200 } }
    }))
    .unwrap();
    let app = Application::new(config, "/nonexistent").unwrap();
    let dest = MockDestination::typed();
    dest.add_index("lang", json!({ "language": { "properties": {} } }));
    dest.add_index("empty", json!({}));

    let report = app.mapping_action(&dest).await.unwrap();

    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({ "indices": [
            { "id": "empty", "mappings": [] },
            { "id": "lang", "mappings": [ { "id": "language" } ] }
        ] })
    );
}
