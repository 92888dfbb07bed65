//! Minimal Liquid-style template evaluation.
//!
//! `{{ expression }}` and `{% tag %}` delimiters are rendered against a
//! merged variable environment. A template that fails to parse is passed
//! through untouched rather than surfaced as an error — string leaves in a
//! configuration are not required to be templates, only *may* be one.

use crate::value::ConfigValue;
use liquid::model::{Object, Value as LiquidValue};
use liquid::ParserBuilder;

/// Render `s` against `vars` if it looks like a template (contains `{`).
/// Parse or render failure returns `s` unchanged.
pub fn maybe_render(s: &str, vars: &ConfigValue) -> String {
    if !s.contains('{') {
        return s.to_string();
    }
    let parser = match ParserBuilder::with_stdlib().build() {
        Ok(p) => p,
        Err(_) => return s.to_string(),
    };
    let template = match parser.parse(s) {
        Ok(t) => t,
        Err(_) => return s.to_string(),
    };
    let globals = to_liquid_object(vars);
    template.render(&globals).unwrap_or_else(|_| s.to_string())
}

fn to_liquid_object(vars: &ConfigValue) -> Object {
    match vars.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| (k.clone().into(), to_liquid_value(v)))
            .collect(),
        None => Object::new(),
    }
}

fn to_liquid_value(v: &ConfigValue) -> LiquidValue {
    match v {
        ConfigValue::Null => LiquidValue::Nil,
        ConfigValue::Bool(b) => LiquidValue::scalar(*b),
        ConfigValue::Num(n) => LiquidValue::scalar(*n),
        ConfigValue::Str(s) => LiquidValue::scalar(s.clone()),
        ConfigValue::Array(a) => LiquidValue::Array(a.iter().map(to_liquid_value).collect()),
        ConfigValue::Object(o) => LiquidValue::Object(
            o.iter()
                .map(|(k, v)| (k.clone().into(), to_liquid_value(v)))
                .collect(),
        ),
    }
}

/// Walk every string leaf of `node`, rendering it in place against `vars`.
pub fn render_tree(node: &mut ConfigValue, vars: &ConfigValue) {
    match node {
        ConfigValue::Str(s) => {
            *s = maybe_render(s, vars);
        }
        ConfigValue::Array(items) => {
            for item in items {
                render_tree(item, vars);
            }
        }
        ConfigValue::Object(map) => {
            for (_, v) in map.iter_mut() {
                render_tree(v, vars);
            }
        }
        _ => {}
    }
}
