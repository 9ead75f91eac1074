//! Snapshot and output file helpers

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use errors::StockError;
use serde::Serialize;
use stock_model::{DatabaseDocument, DocumentScope};
use tracing::{debug, info};

/// `YYYYMMDD_HHMMSS` stamp used in every output name
pub fn timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// `<dir>/<stem>-<timestamp>.<ext>`
pub fn timestamped_path(dir: &Path, stem: &str, ext: &str, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}-{}.{}", stem, timestamp(now), ext))
}

/// Newest `.json` file in `dir` whose name starts with one of `prefixes`
pub fn latest_snapshot(dir: &Path, prefixes: &[String]) -> Result<PathBuf> {
    let mut best: Option<(SystemTime, PathBuf)> = None;
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {:?}", dir))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".json") || !prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if best.as_ref().map_or(true, |(time, _)| modified > *time) {
            best = Some((modified, path));
        }
    }

    best.map(|(_, path)| path).ok_or_else(|| {
        StockError::SnapshotNotFound {
            dir: dir.display().to_string(),
            prefix: prefixes.join("|"),
        }
        .into()
    })
}

/// A file path as given, or the latest snapshot when it is a directory
pub fn resolve_input(path: &Path, prefixes: &[String]) -> Result<PathBuf> {
    if path.is_dir() {
        let found = latest_snapshot(path, prefixes)?;
        info!("Latest snapshot: {}", found.display());
        Ok(found)
    } else if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(StockError::FileNotFound(path.display().to_string()).into())
    }
}

pub fn load_document(path: &Path, scope: Option<DocumentScope>) -> Result<DatabaseDocument> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {:?}", path))?;
    let doc = DatabaseDocument::from_json_str(&text, scope).map_err(|e| StockError::ParseError {
        file: path.display().to_string(),
        error: e.to_string(),
    })?;
    debug!(
        "Loaded {:?} with sections {:?}",
        path,
        doc.section_names().collect::<Vec<_>>()
    );
    Ok(doc)
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }
    Ok(())
}

pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StockError::Serialization(e.to_string()))?;
    fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Write `doc` in its loaded shape as `<out_dir>/<stem>-<ts>.json`
pub fn write_document(doc: &DatabaseDocument, out_dir: &Path, stem: &str) -> Result<PathBuf> {
    let path = timestamped_path(out_dir, stem, "json", Local::now());
    write_json_pretty(&path, &doc.to_value())?;
    Ok(path)
}

/// `key<TAB>error` lines, one per failed item
pub fn write_failure_log(path: &Path, failures: &[(String, String)]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut file =
        fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    for (key, error) in failures {
        let error = error.replace(['\n', '\r', '\t'], " ");
        writeln!(file, "{}\t{}", key, error)?;
    }
    Ok(())
}

/// Keys listed in a failure log, in order, without blanks
pub fn read_failure_log(path: &Path) -> Result<Vec<String>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok(text
        .lines()
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_timestamped_path() {
        let now = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        let path = timestamped_path(Path::new("out"), "stock-merge", "json", now);
        assert_eq!(path, PathBuf::from("out/stock-merge-20260307_090501.json"));
    }

    #[test]
    fn test_latest_snapshot_by_mtime_and_prefix() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("database-export-b.json");
        let new = dir.path().join("database-export-a.json");
        let other = dir.path().join("notes.json");
        for path in [&old, &new, &other] {
            fs::write(path, "{}").unwrap();
        }
        let base = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(base)
            .unwrap();
        fs::File::options()
            .write(true)
            .open(&other)
            .unwrap()
            .set_modified(base + Duration::from_secs(7200))
            .unwrap();

        let prefixes = vec!["database-export".to_string()];
        assert_eq!(latest_snapshot(dir.path(), &prefixes).unwrap(), new);
        assert_eq!(resolve_input(dir.path(), &prefixes).unwrap(), new);

        let missing = latest_snapshot(dir.path(), &["nothing".to_string()]).unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<StockError>(),
            Some(StockError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_input_is_file_not_found() {
        let err = resolve_input(Path::new("/definitely/not/here.json"), &[]).unwrap_err();
        assert_eq!(err.downcast_ref::<StockError>().unwrap().exit_code(), 1);
    }

    #[test]
    fn test_failure_log_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/push-stock-failures.log");
        let failures = vec![
            ("TSR-23SD-N".to_string(), "HTTP 401\nUnauthorized".to_string()),
            ("MBF8505".to_string(), "timeout".to_string()),
        ];
        write_failure_log(&path, &failures).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "TSR-23SD-N\tHTTP 401 Unauthorized\nMBF8505\ttimeout\n");
        assert_eq!(read_failure_log(&path).unwrap(), vec!["TSR-23SD-N", "MBF8505"]);
    }

    #[test]
    fn test_document_written_in_loaded_shape() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("products.json");
        fs::write(&input, r#"{"p1": {"sku": "A-1", "stock": 2}}"#).unwrap();
        let doc = load_document(&input, None).unwrap();
        let out = write_document(&doc, dir.path(), "stock-merge").unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(written["p1"]["stock"], 2);
    }
}
