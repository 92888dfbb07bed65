//! Output seams: a local JSON file sink (implemented) and a relational
//! sink (interface only — the database writer itself is an external
//! collaborator, out of scope for this crate).

use crate::types::ExecutionResult;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write result document to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize result document: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Writes a result document as indented, camelCase JSON. Given a base
/// path, successive calls with `rotated == true` pick the first numbered
/// sibling (`base-1.json`, `base-2.json`, …) that does not already exist.
pub struct ResultSink;

impl ResultSink {
    pub fn write(path: &Path, result: &ExecutionResult) -> Result<()> {
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(path, json).map_err(|source| SinkError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "wrote result document");
        Ok(())
    }

    /// Numbered rotation under span/auto-flush mode (spec.md §4.3).
    pub fn next_rotated_path(base: &Path) -> PathBuf {
        let mut n = 1usize;
        loop {
            let candidate = numbered(base, n);
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn numbered(base: &Path, n: usize) -> PathBuf {
    let stem = base.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    match base.extension() {
        Some(ext) => base.with_file_name(format!("{stem}-{n}.{}", ext.to_string_lossy())),
        None => base.with_file_name(format!("{stem}-{n}")),
    }
}

/// `(session, scenario, description, runId, timestamp, document)` row
/// shape a relational sink would persist. The core never drives a real
/// database connection; this trait exists so a caller can plug one in.
pub trait SqlSink: Send + Sync {
    fn write_row(
        &self,
        session: &str,
        scenario: Option<&str>,
        description: Option<&str>,
        run_id: &str,
        result: &ExecutionResult,
    ) -> Result<()>;
}

/// Default sink used when `--sql` is supplied without a wired driver:
/// logs and otherwise does nothing, so the JSON file output remains the
/// source of truth.
pub struct NoOpSqlSink {
    pub table: String,
}

impl SqlSink for NoOpSqlSink {
    fn write_row(
        &self,
        session: &str,
        scenario: Option<&str>,
        _description: Option<&str>,
        run_id: &str,
        _result: &ExecutionResult,
    ) -> Result<()> {
        warn!(
            table = %self.table,
            session,
            scenario = scenario.unwrap_or("-"),
            run_id,
            "no relational driver configured; skipping --sql write"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_path_inserts_number_before_extension() {
        let base = Path::new("/tmp/benchctl-test-does-not-exist/out.json");
        assert_eq!(ResultSink::next_rotated_path(base), PathBuf::from("/tmp/benchctl-test-does-not-exist/out-1.json"));
    }

    #[test]
    fn rotated_path_handles_missing_extension() {
        let base = Path::new("/tmp/benchctl-test-does-not-exist/out");
        assert_eq!(ResultSink::next_rotated_path(base), PathBuf::from("/tmp/benchctl-test-does-not-exist/out-1"));
    }

    #[test]
    fn rotated_path_skips_existing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("out.json");
        std::fs::write(dir.path().join("out-1.json"), "{}").unwrap();
        assert_eq!(ResultSink::next_rotated_path(&base), dir.path().join("out-2.json"));
    }
}
