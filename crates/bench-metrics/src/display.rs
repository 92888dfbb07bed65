//! Human-readable rendering of a job's summary, grouped by measurement
//! source with a `## <source>:` header per spec.md §4.5.

use crate::aggregator::{format_value_for_display, group_by_source};
use bench_agent::MeasurementMetadata;
use comfy_table::{presets::UTF8_FULL, Table};
use std::collections::HashMap;

pub fn render_job_summary(job_name: &str, summary: &HashMap<String, serde_json::Value>, metadata: &[MeasurementMetadata]) -> String {
    let mut out = format!("# {job_name}\n");
    for (source, metas) in group_by_source(metadata) {
        out.push_str(&format!("## {source}:\n"));
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(vec!["metric", "value"]);
        for meta in metas {
            let Some(value) = summary.get(&meta.name) else { continue };
            table.add_row(vec![meta.short_description.clone(), format_value_for_display(value, meta.format.as_deref())]);
        }
        out.push_str(&table.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_agent::Operation;

    #[test]
    fn renders_one_section_per_source() {
        let metadata = vec![MeasurementMetadata {
            name: "rps".to_string(),
            source: "loadgen".to_string(),
            short_description: "requests/sec".to_string(),
            format: None,
            aggregate: Operation::Avg,
            reduce: Operation::Avg,
        }];
        let mut summary = HashMap::new();
        summary.insert("rps".to_string(), serde_json::json!(1234.5));
        let rendered = render_job_summary("srv", &summary, &metadata);
        assert!(rendered.contains("## loadgen:"));
        assert!(rendered.contains("requests/sec"));
    }
}
