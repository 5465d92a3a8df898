//! Database-table adapter nodes (spec.md §4.4).
//!
//! The southbound database client itself is out of scope; adapters are
//! driven here by a minimal [`ChangeTracker`] so the engine has
//! something concrete to schedule against.

use crate::node::{EngineNode, NodeState};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// A stand-in for a southbound database table's change iterator: all
/// an adapter needs to know is whether anything changed since the
/// last run.
pub trait ChangeTracker: fmt::Debug + Send {
    fn has_tracked_changes(&mut self) -> bool;

    /// Called from `clear_tracked_data`; default is a no-op, since most
    /// trackers clear their own "since last run" state as a side effect
    /// of `has_tracked_changes`.
    fn clear_tracked_changes(&mut self) {}
}

/// A leaf node wrapping one [`ChangeTracker`] plus the named secondary
/// indexes downstream nodes query over that table (spec.md §6:
/// `port_binding_by_name`, `port_binding_by_key`, ...).
#[derive(Debug)]
pub struct TableAdapterNode<T: ChangeTracker> {
    name: String,
    tracker: T,
    indexes: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl<T: ChangeTracker> TableAdapterNode<T> {
    pub fn new(name: impl Into<String>, tracker: T) -> Self {
        TableAdapterNode {
            name: name.into(),
            tracker,
            indexes: HashMap::new(),
        }
    }

    /// Register a named secondary index, once, at construction.
    pub fn with_index<I: Send + 'static>(mut self, name: &'static str, index: I) -> Self {
        self.indexes.insert(name, Box::new(index));
        self
    }

    /// Look up a previously registered index by name and concrete type.
    pub fn get_index<I: 'static>(&self, name: &str) -> Option<&I> {
        self.indexes.get(name).and_then(|b| b.downcast_ref::<I>())
    }
}

impl<T: ChangeTracker + 'static> EngineNode for TableAdapterNode<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> NodeState {
        if self.tracker.has_tracked_changes() {
            NodeState::Updated
        } else {
            NodeState::Unchanged
        }
    }

    fn data(&self) -> &dyn Any {
        &self.tracker
    }

    fn data_mut(&mut self) -> &mut dyn Any {
        &mut self.tracker
    }

    fn clear_tracked_data(&mut self) {
        self.tracker.clear_tracked_changes();
    }
}
