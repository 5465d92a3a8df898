//! # inc-engine
//!
//! Incremental processing engine (IPE): a DAG of nodes that re-runs on
//! input change, dispatching per-edge change-handlers before falling
//! back to full recompute, with database-table adapter leaves and an
//! optional background worker pool. See spec.md §4.3–§4.5.

pub mod engine;
pub mod node;
pub mod table_adapter;

pub use engine::{Engine, EngineBuilder, NodeId};
pub use flowctl_core::WorkerPool;
pub use node::{ChangeHandler, EngineNode, NodeState, MAX_INPUT};
pub use table_adapter::{ChangeTracker, TableAdapterNode};
