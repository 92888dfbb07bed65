//! ConfigLoader: fetch one configuration document, validate it, resolve
//! local paths, and expand `imports` recursively.

use crate::error::{ConfigError, Result};
use crate::value::{patch_object, ConfigValue};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

const EMBEDDED_SCHEMA: &str = include_str!("../schema/benchmarks.schema.json");
static SCHEMA_VALIDATOR: OnceLock<jsonschema::Validator> = OnceLock::new();

fn schema_validator() -> &'static jsonschema::Validator {
    SCHEMA_VALIDATOR.get_or_init(|| {
        let schema: serde_json::Value =
            serde_json::from_str(EMBEDDED_SCHEMA).expect("embedded benchmarks.schema.json is valid JSON");
        jsonschema::validator_for(&schema).expect("embedded benchmarks.schema.json compiles")
    })
}

pub struct ConfigLoader {
    client: reqwest::Client,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with default TLS backend"),
        }
    }

    /// Load `source`, resolve local paths, and recursively expand its
    /// `imports` array, returning the fully merged document.
    pub async fn load(&self, source: &str) -> Result<ConfigValue> {
        let mut doc = self.load_one(source).await?;
        if !is_url(source) {
            if let Some(base_dir) = Path::new(source).parent() {
                resolve_local_folders(&mut doc, base_dir);
            }
        }
        self.expand_imports(&mut doc).await?;
        Ok(doc)
    }

    async fn load_one(&self, source: &str) -> Result<ConfigValue> {
        let ext = extension_of(source).ok_or_else(|| ConfigError::UnsupportedFormat(source.to_string()))?;
        let content = self.fetch(source).await?;
        match ext.as_str() {
            "json" => {
                let parsed: serde_json::Value = serde_json::from_str(&content)?;
                Ok(ConfigValue::from_json(parsed))
            }
            "yml" | "yaml" => {
                let parsed: serde_yaml::Value = serde_yaml::from_str(&content)?;
                let value = ConfigValue::from_yaml(parsed);
                validate_against_schema(&value, source)?;
                Ok(value)
            }
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    async fn fetch(&self, source: &str) -> Result<String> {
        if is_url(source) {
            let response = self
                .client
                .get(source)
                .send()
                .await
                .map_err(|_| ConfigError::ConfigNotFound(source.to_string()))?;
            if !response.status().is_success() {
                return Err(ConfigError::ConfigNotFound(source.to_string()));
            }
            Ok(response.text().await?)
        } else {
            std::fs::read_to_string(source).map_err(|_| ConfigError::ConfigNotFound(source.to_string()))
        }
    }

    async fn expand_imports(&self, doc: &mut ConfigValue) -> Result<()> {
        let imports: Vec<String> = doc
            .get_ci("imports")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        if let Some(map) = doc.as_object_mut() {
            let key = map.keys().find(|k| k.eq_ignore_ascii_case("imports")).cloned();
            if let Some(key) = key {
                map.shift_remove(&key);
            }
        }

        for import_source in imports {
            debug!(import = %import_source, "expanding configuration import");
            // Imports are recursively loaded, then merged into the current
            // document: the import acts as the PatchObject patch.
            let imported = Box::pin(self.load(&import_source)).await?;
            patch_object(doc, &imported);
        }
        Ok(())
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http")
}

fn extension_of(source: &str) -> Option<String> {
    let without_query = source.split(['?', '#']).next().unwrap_or(source);
    Path::new(without_query)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

fn validate_against_schema(doc: &ConfigValue, source: &str) -> Result<()> {
    let instance = doc.to_json();
    let validator = schema_validator();
    if let Err(err) = validator.validate(&instance) {
        let dump_path = dump_invalid_document(&instance);
        warn!(source, dump = %dump_path, "configuration failed schema validation");
        return Err(ConfigError::ConfigInvalid(format!(
            "{source}: {err} (at {}); offending document written to {dump_path}",
            err.instance_path
        )));
    }
    Ok(())
}

fn dump_invalid_document(instance: &serde_json::Value) -> String {
    let pretty = serde_json::to_string_pretty(instance).unwrap_or_default();
    match tempfile::Builder::new()
        .prefix("benchctl-invalid-config-")
        .suffix(".json")
        .tempfile()
    {
        Ok(mut file) => {
            use std::io::Write;
            let _ = file.write_all(pretty.as_bytes());
            match file.keep() {
                Ok((_, path)) => path.display().to_string(),
                Err(_) => "<unavailable>".to_string(),
            }
        }
        Err(_) => "<unavailable>".to_string(),
    }
}

/// Rewrite every `jobs.*.source.localFolder` that is a non-URL relative
/// path into an absolute path resolved against `base_dir`.
fn resolve_local_folders(doc: &mut ConfigValue, base_dir: &Path) {
    let jobs_key = match doc.as_object() {
        Some(map) => map.keys().find(|k| k.eq_ignore_ascii_case("jobs")).cloned(),
        None => None,
    };
    let Some(jobs_key) = jobs_key else { return };
    let Some(jobs) = doc.as_object_mut().and_then(|m| m.get_mut(&jobs_key)) else {
        return;
    };
    let Some(jobs_map) = jobs.as_object_mut() else { return };

    for (_, job) in jobs_map.iter_mut() {
        let source_key = job.as_object().and_then(|m| m.keys().find(|k| k.eq_ignore_ascii_case("source")).cloned());
        let Some(source_key) = source_key else { continue };
        let Some(source_val) = job.as_object_mut().and_then(|m| m.get_mut(&source_key)) else {
            continue;
        };
        let folder_key = source_val
            .as_object()
            .and_then(|m| m.keys().find(|k| k.eq_ignore_ascii_case("localFolder")).cloned());
        let Some(folder_key) = folder_key else { continue };
        let Some(folder_val) = source_val.as_object_mut().and_then(|m| m.get_mut(&folder_key)) else {
            continue;
        };
        if let ConfigValue::Str(s) = folder_val {
            if !is_url(s) && !Path::new(s).is_absolute() {
                *s = base_dir.join(&s).to_string_lossy().into_owned();
            }
        }
    }
}
