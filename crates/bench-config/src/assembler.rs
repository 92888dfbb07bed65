//! ConfigAssembler: merges configuration documents, instantiates scenario
//! jobs, applies profiles and CLI overrides, and evaluates templates — in
//! the fixed order spec.md §4.2 requires.

use crate::error::{ConfigError, Result};
use crate::loader::ConfigLoader;
use crate::model::{Configuration, JobTemplate};
use crate::template;
use crate::value::{merge_variables, patch_object, ConfigValue};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct AssembleRequest {
    pub sources: Vec<String>,
    pub scenario: Option<String>,
    pub custom_jobs: Vec<String>,
    /// Dotted path + raw string value, applied in order.
    pub overrides: Vec<(String, String)>,
    pub cli_variables: ConfigValue,
    pub profiles: Vec<String>,
    /// Shared across every `JobConnection` of this invocation; forced onto
    /// each job alongside `selfContained`/`service`.
    pub run_id: String,
}

#[derive(Debug)]
pub struct AssembledConfig {
    pub configuration: Configuration,
    /// The ordered job-name worklist: scenario service order, or the raw
    /// `--job` list when no scenario was given.
    pub dependencies: Vec<String>,
}

pub struct ConfigAssembler {
    loader: ConfigLoader,
}

impl Default for ConfigAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigAssembler {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
        }
    }

    pub async fn assemble(&self, req: &AssembleRequest) -> Result<AssembledConfig> {
        let mut root = ConfigValue::empty_object();
        for source in &req.sources {
            let doc = self.loader.load(source).await?;
            // Step 1: document merge — recurse objects, concatenate arrays,
            // later source wins on scalars. Identical shape to PatchObject.
            patch_object(&mut root, &doc);
        }

        // Step 2: scenario instantiation.
        let mut dependencies = match &req.scenario {
            Some(scenario_name) => instantiate_scenario(&mut root, scenario_name)?,
            None => Vec::new(),
        };

        // Step 3: custom jobs.
        register_custom_jobs(&mut root, &req.custom_jobs);
        if req.scenario.is_none() {
            dependencies = req.custom_jobs.clone();
        }

        // Step 4: invariant forcing.
        force_invariants(&mut root, &req.run_id);

        // Step 5: profile application.
        for profile_name in &req.profiles {
            apply_profile(&mut root, profile_name)?;
        }

        // Step 6: dotted-path overrides.
        for (path, value) in &req.overrides {
            apply_override(&mut root, path, value)?;
        }

        // Step 7: template evaluation.
        evaluate_templates(&mut root, &req.cli_variables);

        let configuration = build_configuration(&root, &dependencies)?;
        Ok(AssembledConfig {
            configuration,
            dependencies,
        })
    }
}

/// Get-or-create a case-insensitive top-level key as an `Object` node.
fn object_entry<'a>(root: &'a mut ConfigValue, key: &str) -> &'a mut ConfigValue {
    if root.as_object().is_none() {
        *root = ConfigValue::empty_object();
    }
    let existing = root
        .as_object()
        .unwrap()
        .keys()
        .find(|k| k.eq_ignore_ascii_case(key))
        .cloned();
    let map = root.as_object_mut().unwrap();
    let resolved = existing.unwrap_or_else(|| key.to_string());
    let entry = map.entry(resolved).or_insert_with(ConfigValue::empty_object);
    if entry.as_object().is_none() {
        *entry = ConfigValue::empty_object();
    }
    entry
}

fn instantiate_scenario(root: &mut ConfigValue, scenario_name: &str) -> Result<Vec<String>> {
    let scenario = root
        .get_ci("scenarios")
        .and_then(|s| s.get_ci(scenario_name))
        .cloned()
        .ok_or_else(|| ConfigError::ConfigInvalid(format!("scenario '{scenario_name}' not found")))?;
    let service_map = scenario
        .as_object()
        .ok_or_else(|| ConfigError::ConfigInvalid(format!("scenario '{scenario_name}' is not an object")))?;

    let mut dependency_order = Vec::new();
    let mut instantiated: Vec<(String, ConfigValue)> = Vec::new();

    for (service_name, dependency) in service_map {
        let job_name = dependency
            .get_ci("job")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ConfigError::ConfigInvalid(format!("service '{service_name}' is missing a 'job' reference"))
            })?;
        let template = root
            .get_ci("jobs")
            .and_then(|jobs| jobs.get_ci(job_name))
            .cloned()
            .ok_or_else(|| {
                ConfigError::ConfigInvalid(format!(
                    "job '{job_name}' referenced by service '{service_name}' was not found"
                ))
            })?;

        let mut instance = template;
        patch_object(&mut instance, dependency);
        instantiated.push((service_name.clone(), instance));
        dependency_order.push(service_name.clone());
    }

    let jobs_map = object_entry(root, "jobs")
        .as_object_mut()
        .expect("object_entry normalizes to Object");
    for (service_name, instance) in instantiated {
        jobs_map.insert(service_name, instance);
    }

    Ok(dependency_order)
}

fn register_custom_jobs(root: &mut ConfigValue, custom_jobs: &[String]) {
    let jobs_map = object_entry(root, "jobs")
        .as_object_mut()
        .expect("object_entry normalizes to Object");
    for name in custom_jobs {
        let exists = jobs_map.keys().any(|k| k.eq_ignore_ascii_case(name));
        if !exists {
            jobs_map.insert(name.clone(), ConfigValue::empty_object());
        }
    }
}

fn force_invariants(root: &mut ConfigValue, run_id: &str) {
    let jobs_map = object_entry(root, "jobs")
        .as_object_mut()
        .expect("object_entry normalizes to Object");
    for (key, job) in jobs_map.iter_mut() {
        if job.as_object().is_none() {
            *job = ConfigValue::empty_object();
        }
        let map = job.as_object_mut().unwrap();
        map.insert("selfContained".to_string(), ConfigValue::Bool(true));
        map.insert("service".to_string(), ConfigValue::Str(key.clone()));
        map.insert("runId".to_string(), ConfigValue::Str(run_id.to_string()));
    }
}

fn apply_profile(root: &mut ConfigValue, profile_name: &str) -> Result<()> {
    let mut profile = root
        .get_ci("profiles")
        .and_then(|p| p.get_ci(profile_name))
        .cloned()
        .ok_or_else(|| ConfigError::ConfigInvalid(format!("profile '{profile_name}' not found")))?;

    let profile_variables = profile.get_ci("variables").cloned();
    if let Some(variables) = profile_variables {
        if let Some(profile_map) = profile.as_object_mut() {
            let jobs_key = profile_map.keys().find(|k| k.eq_ignore_ascii_case("jobs")).cloned();
            if let Some(jobs_key) = jobs_key {
                if let Some(jobs_val) = profile_map.get_mut(&jobs_key) {
                    if let Some(jobs_map) = jobs_val.as_object_mut() {
                        for (_, job) in jobs_map.iter_mut() {
                            if job.as_object().is_none() {
                                *job = ConfigValue::empty_object();
                            }
                            let job_map = job.as_object_mut().unwrap();
                            let var_key = job_map
                                .keys()
                                .find(|k| k.eq_ignore_ascii_case("variables"))
                                .cloned()
                                .unwrap_or_else(|| "variables".to_string());
                            let var_entry = job_map.entry(var_key).or_insert_with(ConfigValue::empty_object);
                            // Profile variables shadow root variables at job scope:
                            // patch them into the job's own variables block first.
                            patch_object(var_entry, &variables);
                        }
                    }
                }
            }
        }
    }

    patch_object(root, &profile);
    Ok(())
}

fn apply_override(root: &mut ConfigValue, path: &str, raw_value: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::ConfigInvalid(format!("malformed override path '{path}'")));
    }

    let mut cursor = object_entry(root, "jobs");
    for seg in &segments[..segments.len() - 1] {
        let next_key = cursor
            .as_object()
            .and_then(|m| m.keys().find(|k| k.eq_ignore_ascii_case(seg)).cloned())
            .ok_or_else(|| ConfigError::ConfigInvalid(format!("override path '{path}' has no segment '{seg}'")))?;
        cursor = cursor.as_object_mut().unwrap().get_mut(&next_key).unwrap();
    }

    let last = segments[segments.len() - 1];
    let last_key = cursor
        .as_object()
        .and_then(|m| m.keys().find(|k| k.eq_ignore_ascii_case(last)).cloned())
        .ok_or_else(|| ConfigError::ConfigInvalid(format!("override path '{path}' has no segment '{last}'")))?;
    let target = cursor.as_object_mut().unwrap().get_mut(&last_key).unwrap();
    apply_override_to_target(target, raw_value, path)
}

fn apply_override_to_target(target: &mut ConfigValue, raw_value: &str, path: &str) -> Result<()> {
    match target {
        ConfigValue::Array(arr) => {
            arr.push(coerce_scalar(raw_value));
            Ok(())
        }
        ConfigValue::Object(map) => {
            let (k, v) = raw_value.split_once('=').ok_or_else(|| {
                ConfigError::ConfigInvalid(format!("override '{path}' targets an object; value must be K=V"))
            })?;
            map.insert(k.to_string(), ConfigValue::Str(v.to_string()));
            Ok(())
        }
        ConfigValue::Bool(_) => {
            *target = ConfigValue::Bool(raw_value.eq_ignore_ascii_case("true"));
            Ok(())
        }
        ConfigValue::Num(_) => {
            let parsed: f64 = raw_value
                .parse()
                .map_err(|_| ConfigError::ConfigInvalid(format!("override '{path}' expects a number, got '{raw_value}'")))?;
            *target = ConfigValue::Num(parsed);
            Ok(())
        }
        ConfigValue::Str(_) | ConfigValue::Null => {
            *target = ConfigValue::Str(raw_value.to_string());
            Ok(())
        }
    }
}

fn coerce_scalar(raw: &str) -> ConfigValue {
    if let Ok(n) = raw.parse::<f64>() {
        ConfigValue::Num(n)
    } else if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
        ConfigValue::Bool(raw.eq_ignore_ascii_case("true"))
    } else {
        ConfigValue::Str(raw.to_string())
    }
}

fn evaluate_templates(root: &mut ConfigValue, cli_variables: &ConfigValue) {
    let root_variables = root.get_ci("variables").cloned().unwrap_or(ConfigValue::empty_object());
    let jobs_map = object_entry(root, "jobs")
        .as_object_mut()
        .expect("object_entry normalizes to Object");
    let job_names: Vec<String> = jobs_map.keys().cloned().collect();
    for name in job_names {
        let job = jobs_map.get_mut(&name).unwrap();
        let job_variables = job.get_ci("variables").cloned().unwrap_or(ConfigValue::empty_object());
        let merged = merge_variables(&merge_variables(&root_variables, &job_variables), cli_variables);
        template::render_tree(job, &merged);
    }
}

/// Only jobs actually listed in `dependencies` are materialized and
/// validated — a scenario's reusable base templates may legitimately lack
/// a source/endpoints of their own, relying on per-service patching to
/// complete them, and are never themselves run.
fn build_configuration(root: &ConfigValue, dependencies: &[String]) -> Result<Configuration> {
    let jobs_map: IndexMap<String, ConfigValue> = root
        .get_ci("jobs")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let mut jobs = IndexMap::new();
    for dep in dependencies {
        let (key, value) = jobs_map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(dep))
            .map(|(k, v)| (k.clone(), v.clone()))
            .ok_or_else(|| ConfigError::ConfigInvalid(format!("dependency '{dep}' has no matching job entry")))?;
        jobs.insert(key.clone(), JobTemplate::from_value(&key, &value)?);
    }

    let variables = root.get_ci("variables").cloned().unwrap_or(ConfigValue::empty_object());
    Ok(Configuration { jobs, variables })
}
