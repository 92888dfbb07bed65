//! Aggregate-then-reduce pipeline (spec.md §4.5).
//!
//! Two passes over the same operation set: `aggregate` collapses one
//! agent's raw sample sequence per metric name; `reduce` collapses the
//! per-agent summaries across agents. Both passes share the numeric
//! reduction core; only the grouping axis differs.

use bench_agent::{Measurement, MeasurementMetadata, Operation};
use std::collections::{BTreeMap, HashMap};

/// Rewrite `format: "json"` metadata entries to `"object"`, parsing each
/// matching measurement's string value in place. Unknown metadata names
/// are left untouched.
pub fn normalize(metadata: &mut [MeasurementMetadata], measurements: &mut [Measurement]) {
    for meta in metadata.iter_mut() {
        if meta.format.as_deref() != Some("json") {
            continue;
        }
        for measurement in measurements.iter_mut().filter(|m| m.name == meta.name) {
            if let serde_json::Value::String(raw) = &measurement.value {
                if let Ok(parsed) = serde_json::from_str(raw) {
                    measurement.value = parsed;
                }
            }
        }
        meta.format = Some("object".to_string());
    }
}

/// Aggregate one agent's measurement stream into a summary keyed by
/// metric name, applying each metadata entry's `aggregate` operation.
pub fn aggregate_agent(
    measurements: &[Measurement],
    metadata: &[MeasurementMetadata],
) -> HashMap<String, serde_json::Value> {
    let mut out = HashMap::new();
    for meta in metadata {
        let values: Vec<serde_json::Value> = measurements
            .iter()
            .filter(|m| m.name == meta.name)
            .map(|m| m.value.clone())
            .collect();
        if values.is_empty() {
            continue;
        }
        let summary = coerce_for_format(apply_operation(meta.aggregate, &values), meta.format.as_deref());
        out.insert(meta.name.clone(), summary);
    }
    out
}

/// Reduce per-agent summaries into one summary. A single agent is
/// returned verbatim; otherwise each metric's values are flattened
/// across agents and reduced using its `reduce` operation.
pub fn reduce_across_agents(
    per_agent: &[HashMap<String, serde_json::Value>],
    metadata: &[MeasurementMetadata],
) -> HashMap<String, serde_json::Value> {
    if per_agent.len() == 1 {
        return per_agent[0].clone();
    }
    let mut out = HashMap::new();
    for meta in metadata {
        let values: Vec<serde_json::Value> = per_agent
            .iter()
            .filter_map(|summary| summary.get(&meta.name).cloned())
            .collect();
        if values.is_empty() {
            continue;
        }
        let reduced = coerce_for_format(apply_operation(meta.reduce, &values), meta.format.as_deref());
        out.insert(meta.name.clone(), reduced);
    }
    out
}

fn apply_operation(op: Operation, values: &[serde_json::Value]) -> serde_json::Value {
    match op {
        Operation::All => serde_json::Value::Array(values.to_vec()),
        Operation::First => values.first().cloned().unwrap_or(serde_json::Value::Null),
        Operation::Last => values.last().cloned().unwrap_or(serde_json::Value::Null),
        Operation::Count => serde_json::json!(values.len() as i64),
        Operation::Avg | Operation::Max | Operation::Min | Operation::Sum | Operation::Delta | Operation::Median => {
            let numeric: Vec<f64> = values.iter().filter_map(numeric_coerce).collect();
            serde_json::json!(reduce_numeric(op, &numeric))
        }
    }
}

fn numeric_coerce(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn reduce_numeric(op: Operation, values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match op {
        Operation::Sum => values.iter().sum(),
        Operation::Avg => values.iter().sum::<f64>() / values.len() as f64,
        Operation::Max => values.iter().cloned().fold(f64::MIN, f64::max),
        Operation::Min => values.iter().cloned().fold(f64::MAX, f64::min),
        Operation::Delta => {
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            max - min
        }
        Operation::Median => percentile_50(values),
        _ => 0.0,
    }
}

/// 50th percentile per the normative definition: `nth := ceil(L*50/100)`;
/// return `sorted[nth]` if `L > nth`, else `0`.
fn percentile_50(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("non-NaN measurement"));
    let len = sorted.len();
    let nth = ((len as f64) * 50.0 / 100.0).ceil() as usize;
    if len > nth {
        sorted[nth]
    } else {
        0.0
    }
}

fn coerce_for_format(value: serde_json::Value, format: Option<&str>) -> serde_json::Value {
    match format {
        Some(f) if f != "object" => serde_json::json!(numeric_coerce(&value).unwrap_or(0.0)),
        _ => value,
    }
}

/// Render a textual form: non-object numeric formats use the format hint
/// (`N0`/`N2`-style thousands grouping, else plain fixed-point); other
/// values use their default textual form.
pub fn format_value_for_display(value: &serde_json::Value, format: Option<&str>) -> String {
    match format {
        Some(hint) if hint != "object" => format_numeric_hint(value, hint),
        _ => default_textual_form(value),
    }
}

fn default_textual_form(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn format_numeric_hint(value: &serde_json::Value, hint: &str) -> String {
    let num = value.as_f64().unwrap_or(0.0);
    let decimals: usize = hint.chars().skip(1).collect::<String>().parse().unwrap_or(2);
    if hint.to_ascii_lowercase().starts_with('n') {
        format_with_thousands(num, decimals)
    } else {
        format!("{num:.decimals$}")
    }
}

fn format_with_thousands(num: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, num);
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
    let negative = int_part.starts_with('-');
    let digits = int_part.trim_start_matches('-');
    let mut grouped: Vec<char> = Vec::new();
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped.reverse();
    let sign = if negative { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{}", grouped.into_iter().collect::<String>())
    } else {
        format!("{sign}{}.{frac_part}", grouped.into_iter().collect::<String>())
    }
}

/// Group metadata by `source` for display purposes, preserving a stable
/// (alphabetical) source ordering.
pub fn group_by_source(metadata: &[MeasurementMetadata]) -> BTreeMap<String, Vec<&MeasurementMetadata>> {
    let mut grouped: BTreeMap<String, Vec<&MeasurementMetadata>> = BTreeMap::new();
    for meta in metadata {
        grouped.entry(meta.source.clone()).or_default().push(meta);
    }
    grouped
}
