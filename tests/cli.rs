//! `jvs-cli check` exit codes and `$ref` resolution against sibling files.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn jvs_cli(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jvs-cli"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("jvs-cli runs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// `order.json` references `item.json`; documents sit next to them.
fn order_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("item.json"),
        r#"{"type": "object", "required": ["sku"], "properties": {"sku": {"type": "string"}}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("order.json"),
        r#"{"type": "object", "properties": {"items": {"type": "array", "items": {"$ref": "item.json"}}}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("good.json"), r#"{"items": [{"sku": "A1"}]}"#).unwrap();
    fs::write(dir.path().join("bad.json"), r#"{"items": [{"sku": 7}]}"#).unwrap();
    // Not a schema; must not stop the siblings from loading.
    fs::write(dir.path().join("list.json"), "[1, 2, 3]").unwrap();
    dir
}

#[test]
fn valid_documents_exit_zero() {
    let dir = order_dir();
    let output = jvs_cli(dir.path(), &["check", "--schema", "order.json", "good.json"]);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert!(stdout(&output).contains("good.json: valid"));
}

#[test]
fn invalid_document_exits_one() {
    let dir = order_dir();
    let output = jvs_cli(
        dir.path(),
        &["check", "--schema", "./order.json", "good.json", "bad.json"],
    );

    assert_eq!(output.status.code(), Some(1), "{output:?}");
    let out = stdout(&output);
    assert!(out.contains("good.json: valid"));
    assert!(out.contains("bad.json: invalid"));
    assert!(out.contains("/items/0/sku"));
}

#[test]
fn schema_given_by_absolute_path_resolves_siblings() {
    let dir = order_dir();
    let schema = dir.path().join("order.json");
    let document = dir.path().join("bad.json");
    let elsewhere = tempfile::tempdir().unwrap();

    let output = jvs_cli(
        elsewhere.path(),
        &["check", "--schema", schema.to_str().unwrap(), document.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1), "{output:?}");
}

#[test]
fn missing_document_exits_two() {
    let dir = order_dir();
    let output = jvs_cli(dir.path(), &["check", "--schema", "order.json", "absent.json"]);

    assert_eq!(output.status.code(), Some(2), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.json"));
}

#[test]
fn unresolvable_reference_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lonely.json"), r#"{"$ref": "nowhere.json"}"#).unwrap();
    fs::write(dir.path().join("doc.json"), "{}").unwrap();

    let output = jvs_cli(dir.path(), &["check", "--schema", "lonely.json", "doc.json"]);
    assert_eq!(output.status.code(), Some(2), "{output:?}");
}
