//! Node state machine and the [`EngineNode`] trait.

use std::any::Any;
use std::fmt;

/// Maximum declared inputs for a single node (spec.md §3).
pub const MAX_INPUT: usize = 256;

/// Per-node state for the current run. `Aborted` is terminal within a
/// run (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Stale,
    Updated,
    Unchanged,
    Aborted,
}

impl NodeState {
    pub const fn name(self) -> &'static str {
        match self {
            NodeState::Stale => "stale",
            NodeState::Updated => "updated",
            NodeState::Unchanged => "unchanged",
            NodeState::Aborted => "aborted",
        }
    }
}

/// A handler invoked on a single `(input, dependent)` edge when the
/// input transitioned to `Updated` this run. Receives the dependent
/// node's own data (mutable) and the input's data (read-only), and
/// returns `true` if it fully absorbed the change — `false` falls back
/// to a full recompute of the dependent.
pub type ChangeHandler = Box<dyn Fn(&mut dyn Any, &dyn Any) -> bool + Send + Sync>;

/// One node in the incremental processing engine's DAG.
///
/// Implementors own their data behind `data`/`data_mut`; the engine
/// never inspects it directly, only hands it to change-handlers and to
/// downstream `get_data` callers.
pub trait EngineNode: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Full recompute. Leaf nodes call this every run; non-leaf nodes
    /// call it when `force_recompute` is set or a change-handler could
    /// not absorb an input's change. Must return `Updated` or
    /// `Unchanged` — never `Stale`/`Aborted`.
    fn run(&mut self) -> NodeState;

    fn data(&self) -> &dyn Any;
    fn data_mut(&mut self) -> &mut dyn Any;

    /// Called once by `EngineBuilder::build`, in topological order,
    /// before the engine is handed to its caller — the counterpart to
    /// `cleanup`. Most nodes need nothing beyond what their own
    /// constructor already did; override when a node needs to know its
    /// place in the built graph (e.g. register itself under a name)
    /// before the first run.
    fn init(&mut self) {}

    /// Called at the start of `init_run` for every node that defines
    /// it — clears whatever "tracked changes since last run" state a
    /// database-table adapter accumulates.
    fn clear_tracked_data(&mut self) {}

    /// Called once at engine shutdown, in reverse topological order.
    fn cleanup(&mut self) {}

    /// Override to make this node's data visible to `get_data` callers
    /// even when its state this run is `Stale` — for nodes whose data
    /// is meant to remain legible across runs when not refreshed
    /// (spec.md §4.3 "Node-data visibility contract").
    fn is_valid_across_runs(&self) -> bool {
        false
    }
}
