//! Configuration assembly for the benchmark controller.
//!
//! ```text
//!  cmdline+env ──► ConfigLoader ──► ConfigAssembler ──► Configuration
//! ```
//!
//! [`loader::ConfigLoader`] fetches and parses one configuration document
//! (local file or URL, JSON or YAML), schema-validates YAML, resolves local
//! paths, and recursively expands `imports`. [`assembler::ConfigAssembler`]
//! merges documents, instantiates scenario jobs from job templates plus
//! `ServiceDependency` overrides, applies profiles and dotted-path CLI
//! overrides, and evaluates `{{ }}`/`{% %}` templates against a merged
//! variable environment. [`value::ConfigValue`] is the dynamic tree the
//! whole pipeline operates on before [`model::Configuration`] is
//! materialized at the end.

pub mod assembler;
pub mod error;
pub mod loader;
pub mod model;
pub mod template;
pub mod value;

pub use assembler::{AssembleRequest, AssembledConfig, ConfigAssembler};
pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
pub use model::{Configuration, JobOptions, JobSource, JobTemplate};
pub use value::{merge_variables, patch_object, ConfigValue};
