//! Command-line runs against temporary sheets and exports
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const SHEET: &str = "\
Código,Nombre,Existencia
Almacén:,,
CA,Cancún,
TSR-23SD-N,Refrigerador,5
ZZZ-900,Empaque,2
";

const EXPORT: &str = r#"{
  "products": {
    "p1": {"sku": "TSR-23SD-N", "name": "Refrigerador", "price": 10, "stock": 0}
  },
  "users": {"u1": {"email": "a@b.mx"}}
}"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("inventario.csv"), SHEET).unwrap();
    fs::write(dir.path().join("database-export.json"), EXPORT).unwrap();
    dir
}

fn stockmerge(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stockmerge"))
        .current_dir(dir)
        .args(["--no-color", "--out-dir", "out"])
        .args(args)
        .output()
        .unwrap()
}

fn outputs(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir.join("out")) else {
        return Vec::new();
    };
    entries
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect()
}

#[test]
fn merge_then_verify() {
    let dir = workspace();
    let merged = stockmerge(
        dir.path(),
        &["merge", "inventario.csv", "--db", "database-export.json"],
    );
    assert!(merged.status.success(), "{:?}", merged);

    let written = outputs(dir.path(), "stock-merge-");
    assert_eq!(written.len(), 1);
    let doc: Value = serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
    assert_eq!(doc["products"]["p1"]["stock"], 5);
    assert_eq!(doc["products"]["p1"]["warehouse"], "CA");
    assert_eq!(doc["products"]["p1"]["price"], 10);
    assert_eq!(doc["spareparts"]["ZZZ-900"]["stock"], 2);
    assert_eq!(doc["users"]["u1"]["email"], "a@b.mx");

    let verified = stockmerge(dir.path(), &["verify", "inventario.csv", "--db", "out"]);
    assert_eq!(verified.status.code(), Some(0), "{:?}", verified);

    let stale = stockmerge(
        dir.path(),
        &["verify", "inventario.csv", "--db", "database-export.json"],
    );
    assert_eq!(stale.status.code(), Some(1));
}

#[test]
fn dry_run_writes_nothing() {
    let dir = workspace();
    let out = stockmerge(
        dir.path(),
        &["merge", "inventario.csv", "--db", "database-export.json", "--dry-run"],
    );
    assert!(out.status.success());
    assert!(outputs(dir.path(), "").is_empty());

    let out = stockmerge(
        dir.path(),
        &["repair", "--db", "database-export.json", "--dry-run", "fields"],
    );
    assert!(out.status.success(), "{:?}", out);
    assert!(outputs(dir.path(), "").is_empty());
}

#[test]
fn exit_codes() {
    let dir = workspace();
    let missing = stockmerge(dir.path(), &["merge", "nope.csv", "--db", "database-export.json"]);
    assert_eq!(missing.status.code(), Some(1));

    let bad_config = Command::new(env!("CARGO_BIN_EXE_stockmerge"))
        .current_dir(dir.path())
        .env("STOCKMERGE_THROTTLE__EVERY", "0")
        .args(["config", "show"])
        .output()
        .unwrap();
    assert_eq!(bad_config.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&bad_config.stderr);
    assert!(stderr.contains("[INVALID_CONFIG]"));
    assert!(stderr.contains("throttle.every"));

    let no_remote = stockmerge(dir.path(), &["remote", "pull", "products"]);
    assert_eq!(no_remote.status.code(), Some(2));
}

#[test]
fn match_report_is_written() {
    let dir = workspace();
    let out = stockmerge(
        dir.path(),
        &["match", "inventario.csv", "--db", "database-export.json"],
    );
    assert!(out.status.success(), "{:?}", out);

    let reports = outputs(dir.path(), "match-report-");
    assert_eq!(reports.len(), 1);
    let report: Value = serde_json::from_str(&fs::read_to_string(&reports[0]).unwrap()).unwrap();
    assert_eq!(report["items"], 2);
    assert_eq!(report["counts"]["exact"], 1);
    assert_eq!(report["unmatched"][0], "ZZZ-900");
}
