//! The dynamic configuration tree.
//!
//! The assembled configuration is heterogeneous until template evaluation
//! completes, so it is represented as a tagged-variant tree with
//! case-insensitive object lookup rather than a typed struct. Two distinct
//! merge algorithms operate on this tree: [`patch_object`] (object-recurse,
//! array-append, scalar-replace, case-insensitive) used during scenario
//! instantiation and profile application, and [`merge_variables`]
//! (array-replace, null-keep, object-recursive-merge) used only when
//! building the template variable environment. Do not use one where the
//! other is called for.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Vec<ConfigValue>),
    Object(IndexMap<String, ConfigValue>),
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::Null
    }
}

impl ConfigValue {
    pub fn empty_object() -> Self {
        ConfigValue::Object(IndexMap::new())
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Num(n) => Some(*n),
            ConfigValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Case-insensitive lookup within an object. Non-object values yield `None`.
    pub fn get_ci(&self, key: &str) -> Option<&ConfigValue> {
        let map = self.as_object()?;
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Traverse a dot-separated path, case-insensitively at each segment.
    pub fn get_path_ci(&self, path: &str) -> Option<&ConfigValue> {
        let mut cur = self;
        for seg in path.split('.') {
            cur = cur.get_ci(seg)?;
        }
        Some(cur)
    }

    pub fn from_json(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(b),
            serde_json::Value::Number(n) => ConfigValue::Num(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => ConfigValue::Str(s),
            serde_json::Value::Array(a) => {
                ConfigValue::Array(a.into_iter().map(ConfigValue::from_json).collect())
            }
            serde_json::Value::Object(o) => ConfigValue::Object(
                o.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn from_yaml(v: serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(b),
            serde_yaml::Value::Number(n) => ConfigValue::Num(n.as_f64().unwrap_or(0.0)),
            serde_yaml::Value::String(s) => ConfigValue::Str(s),
            serde_yaml::Value::Sequence(a) => {
                ConfigValue::Array(a.into_iter().map(ConfigValue::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(m) => ConfigValue::Object(
                m.into_iter()
                    .filter_map(|(k, v)| {
                        let key = match k {
                            serde_yaml::Value::String(s) => s,
                            other => serde_yaml::to_string(&other).ok()?.trim().to_string(),
                        };
                        Some((key, ConfigValue::from_yaml(v)))
                    })
                    .collect(),
            ),
            serde_yaml::Value::Tagged(t) => ConfigValue::from_yaml(t.value),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::Bool(b) => serde_json::Value::Bool(*b),
            ConfigValue::Num(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ConfigValue::Str(s) => serde_json::Value::String(s.clone()),
            ConfigValue::Array(a) => serde_json::Value::Array(a.iter().map(|v| v.to_json()).collect()),
            ConfigValue::Object(o) => serde_json::Value::Object(
                o.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// PatchObject: object-recurse, array-append, scalar-replace, case-insensitive.
///
/// For each key in `patch`: if `source` has the same key case-insensitively
/// and both values are objects, recurse; if both are arrays, append patch's
/// (cloned) elements to source's array; otherwise assign `source[key] :=
/// patch[key]`. Keys missing from `source` are added, using patch's casing.
pub fn patch_object(source: &mut ConfigValue, patch: &ConfigValue) {
    let patch_map = match patch.as_object() {
        Some(m) => m,
        None => return,
    };
    if !matches!(source, ConfigValue::Object(_)) {
        *source = ConfigValue::empty_object();
    }
    let source_map = source.as_object_mut().expect("just normalized to Object");

    for (pkey, pval) in patch_map {
        let existing_key = source_map
            .keys()
            .find(|k| k.eq_ignore_ascii_case(pkey))
            .cloned();

        match existing_key {
            Some(ekey) => {
                let existing = source_map.get_mut(&ekey).expect("key just found");
                match (&mut *existing, pval) {
                    (ConfigValue::Object(_), ConfigValue::Object(_)) => {
                        patch_object(existing, pval);
                    }
                    (ConfigValue::Array(existing_arr), ConfigValue::Array(patch_arr)) => {
                        existing_arr.extend(patch_arr.iter().cloned());
                    }
                    _ => {
                        *existing = pval.clone();
                    }
                }
            }
            None => {
                source_map.insert(pkey.clone(), pval.clone());
            }
        }
    }
}

/// Variable-scope merge: arrays *replaced*, nulls *kept* (an overlay null
/// does not erase a base value), objects *recursively merged*. Case
/// sensitive, unlike [`patch_object`]. Used only to build the template
/// variable environment — never to merge configuration documents.
pub fn merge_variables(base: &ConfigValue, overlay: &ConfigValue) -> ConfigValue {
    match (base, overlay) {
        (ConfigValue::Object(base_map), ConfigValue::Object(overlay_map)) => {
            let mut result = base_map.clone();
            for (k, overlay_val) in overlay_map {
                if overlay_val.is_null() {
                    // null keeps the base value; if there is none, the key stays null.
                    result.entry(k.clone()).or_insert(ConfigValue::Null);
                    continue;
                }
                match result.get(k) {
                    Some(base_val) => {
                        result.insert(k.clone(), merge_variables(base_val, overlay_val));
                    }
                    None => {
                        result.insert(k.clone(), overlay_val.clone());
                    }
                }
            }
            ConfigValue::Object(result)
        }
        (_, ConfigValue::Null) => base.clone(),
        (_, overlay) => overlay.clone(),
    }
}
