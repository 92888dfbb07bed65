//! Trace file destination naming (spec.md §4.3).

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Extension is `.etl.zip` on Windows when `collect`, `.trace.zip`
/// otherwise when `collect`, else `.nettrace`.
fn trace_extension(collect: bool, os: &str) -> &'static str {
    if collect && os.eq_ignore_ascii_case("windows") {
        "etl.zip"
    } else if collect {
        "trace.zip"
    } else {
        "nettrace"
    }
}

/// Destination is `traceOutput` if set, else `jobName`. If it does not
/// already end with the trace extension, a `.<MM-dd-HH-mm-ss>` stamp and
/// the extension are appended.
pub fn trace_destination(job_name: &str, trace_output: Option<&str>, collect: bool, os: &str, now: DateTime<Utc>) -> PathBuf {
    let base = trace_output.unwrap_or(job_name).to_string();
    let extension = trace_extension(collect, os);
    let suffix = format!(".{extension}");
    if base.ends_with(&suffix) {
        PathBuf::from(base)
    } else {
        let stamp = now.format("%m-%d-%H-%M-%S");
        PathBuf::from(format!("{base}.{stamp}.{extension}"))
    }
}
