//! Pure helpers over the dependency list: span keep-alive and output
//! filename rotation (spec.md §4.3).

/// True iff `job_name` stays up across passes of a span: the span must
/// still be active, a `--repeat` anchor must be set, and `job_name` must
/// strictly precede the anchor (case-insensitively) in `dependencies`.
pub fn span_should_keep_running(
    job_name: &str,
    dependencies: &[String],
    repeat_anchor: Option<&str>,
    span_active: bool,
) -> bool {
    if !span_active {
        return false;
    }
    let Some(anchor) = repeat_anchor else {
        return false;
    };
    let anchor_idx = dependencies.iter().position(|d| d.eq_ignore_ascii_case(anchor));
    let job_idx = dependencies.iter().position(|d| d.eq_ignore_ascii_case(job_name));
    match (anchor_idx, job_idx) {
        (Some(anchor_idx), Some(job_idx)) => job_idx < anchor_idx,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps() -> Vec<String> {
        vec!["server".to_string(), "loadgen".to_string()]
    }

    #[test]
    fn job_before_anchor_is_kept_alive() {
        assert!(span_should_keep_running("server", &deps(), Some("loadgen"), true));
    }

    #[test]
    fn anchor_itself_is_not_kept_alive() {
        assert!(!span_should_keep_running("loadgen", &deps(), Some("loadgen"), true));
    }

    #[test]
    fn inactive_span_never_keeps_jobs_alive() {
        assert!(!span_should_keep_running("server", &deps(), Some("loadgen"), false));
    }

    #[test]
    fn no_anchor_means_nothing_is_kept_alive() {
        assert!(!span_should_keep_running("server", &deps(), None, true));
    }

    #[test]
    fn anchor_lookup_is_case_insensitive() {
        assert!(span_should_keep_running("Server", &deps(), Some("LOADGEN"), true));
    }
}
