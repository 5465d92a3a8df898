//! # flowctl-core
//!
//! Shared primitives for the flowctl data-plane compilation substrate:
//! the logical-flow UUID type, the crate-wide error taxonomy, atomic
//! telemetry counters, the compiled-artifact abstraction, environment
//! driven configuration defaults, structured debug logging, and the
//! optional background worker pool (spec.md §5).
//!
//! Nothing in here is specific to the cache (`lflow-cache`), the
//! allocator (`conj-ids`) or the engine (`inc-engine`) — those crates
//! depend on this one, not the other way around.

pub mod artifact;
pub mod counters;
pub mod env;
pub mod error;
pub mod id;
pub mod log;
pub mod worker_pool;

pub use artifact::{Artifact, FixedSizeArtifact};
pub use counters::Counter;
pub use error::{CtlError, CtlResult};
pub use id::LflowUuid;
pub use worker_pool::WorkerPool;
