//! Two-level aggregate-then-reduce measurement pipeline (spec.md §4.5).
//!
//! ```text
//! per-agent Measurement[]  ──normalize──>  ──aggregate(op)──>  per-agent summary
//!                                                                    │
//!                                          (>1 agent) ──reduce(op)──>  job summary
//! ```
//!
//! Depends on [`bench_agent`] for the wire types (`Measurement`,
//! `MeasurementMetadata`, `Operation`) so the pipeline and the protocol
//! that produces its input share one definition.

pub mod aggregator;
pub mod display;
pub mod sink;
pub mod types;

pub use aggregator::{aggregate_agent, format_value_for_display, normalize, reduce_across_agents};
pub use display::render_job_summary;
pub use sink::{NoOpSqlSink, ResultSink, SinkError, SqlSink};
pub use types::{ExecutionResult, JobResult, JobResults};
