//! HTTP client for the wire protocol a remote agent speaks (spec.md §4.4).
//!
//! ```text
//! ExecutionEngine
//!      │  owns one JobConnection per (job, endpoint)
//!      ▼
//! JobConnection  ──poll loop──>  MeasurementQueue
//!      │ reqwest::Client, per-endpoint
//!      ▼
//! remote agent process
//! ```
//!
//! `JobConnectionOps` is a trait so the engine can be driven against an
//! in-process fake agent in integration tests without opening real sockets.

pub mod connection;
pub mod error;
pub mod protocol;
pub mod queue;

pub use connection::{JobConnection, JobConnectionOps};
pub use error::{AgentError, Result};
pub use protocol::{AgentInfo, JobSnapshot, JobState, Measurement, MeasurementMetadata, Operation};
pub use queue::MeasurementQueue;
