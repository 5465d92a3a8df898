//! Engine builder (topological sort over a declared DAG) and the
//! per-run scheduler (spec.md §4.3).

use crate::node::{ChangeHandler, EngineNode, NodeState, MAX_INPUT};
use flowctl_core::{log::timed, Counter, CtlError, CtlResult};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// A weak reference to a node, valid only for the [`EngineBuilder`] (or
/// [`Engine`]) that produced it — a plain index, never a pointer
/// (spec.md §9 "topologically ordered array with indices used as weak
/// references").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct NodeStats {
    recompute: Counter,
    compute: Counter,
    abort: Counter,
}

struct NodeSlot {
    node: Box<dyn EngineNode>,
    /// `(input slot index, optional handler)`, already translated from
    /// the builder's original insertion-order ids into post-sort slot
    /// indices. An input's slot index is always `<` this slot's index.
    inputs: Vec<(usize, Option<ChangeHandler>)>,
    state: NodeState,
    stats: NodeStats,
}

struct PendingNode {
    node: Box<dyn EngineNode>,
    inputs: Vec<(NodeId, Option<ChangeHandler>)>,
}

/// Accumulates nodes and their declared input edges, then performs a
/// Kahn's-algorithm topological sort to produce an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    pending: Vec<PendingNode>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder::default()
    }

    /// Register a node with its declared inputs in handler-invocation
    /// order. Returns the [`NodeId`] other `add_node` calls use to
    /// reference this node as an input.
    pub fn add_node(
        &mut self,
        node: Box<dyn EngineNode>,
        inputs: Vec<(NodeId, Option<ChangeHandler>)>,
    ) -> CtlResult<NodeId> {
        if inputs.len() > MAX_INPUT {
            return Err(CtlError::EngineBuild(format!(
                "node {:?} declares {} inputs, exceeding MAX_INPUT ({MAX_INPUT})",
                node.name(),
                inputs.len()
            )));
        }
        let id = NodeId(self.pending.len());
        self.pending.push(PendingNode { node, inputs });
        Ok(id)
    }

    /// Topologically sort the declared graph and produce an [`Engine`].
    /// A cycle in the declared edges is a hard build-time error.
    pub fn build(self) -> CtlResult<Engine> {
        let n = self.pending.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, pn) in self.pending.iter().enumerate() {
            in_degree[i] = pn.inputs.len();
            for (input_id, _) in &pn.inputs {
                dependents[input_id.0].push(i);
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            sorted.push(i);
            for &dep in &dependents[i] {
                in_degree[dep] -= 1;
                if in_degree[dep] == 0 {
                    queue.push_back(dep);
                }
            }
        }
        if sorted.len() != n {
            return Err(CtlError::EngineBuild(
                "node graph contains a cycle".to_string(),
            ));
        }

        let mut orig_to_slot = vec![0usize; n];
        for (slot_idx, &orig) in sorted.iter().enumerate() {
            orig_to_slot[orig] = slot_idx;
        }

        let mut pending: Vec<Option<PendingNode>> = self.pending.into_iter().map(Some).collect();
        let mut slots = Vec::with_capacity(n);
        for &orig in &sorted {
            let pn = pending[orig].take().expect("each node visited once");
            let inputs = pn
                .inputs
                .into_iter()
                .map(|(id, handler)| (orig_to_slot[id.0], handler))
                .collect();
            let mut node = pn.node;
            node.init();
            slots.push(NodeSlot {
                node,
                inputs,
                state: NodeState::Stale,
                stats: NodeStats::default(),
            });
        }

        Ok(Engine {
            slots,
            orig_to_slot,
            force_recompute: AtomicBool::new(false),
            run_aborted: false,
        })
    }
}

/// A built, runnable DAG of nodes in topological order.
pub struct Engine {
    slots: Vec<NodeSlot>,
    orig_to_slot: Vec<usize>,
    force_recompute: AtomicBool,
    run_aborted: bool,
}

impl Engine {
    /// Reset every node's state to `Stale` and clear tracked-change
    /// state ahead of a new run.
    pub fn init_run(&mut self) {
        for slot in &mut self.slots {
            slot.state = NodeState::Stale;
            slot.node.clear_tracked_data();
        }
    }

    /// Run the DAG in topological order. If the previous run aborted
    /// and `recompute_allowed` is false, this call is a no-op.
    pub fn run(&mut self, recompute_allowed: bool) {
        if self.run_aborted && !recompute_allowed {
            return;
        }
        let force = self.force_recompute.swap(false, Ordering::AcqRel);
        self.run_aborted = false;

        for i in 0..self.slots.len() {
            let (before, after) = self.slots.split_at_mut(i);
            let slot = &mut after[0];
            let name = slot.node.name().to_string();

            if slot.inputs.is_empty() {
                slot.state = timed(&name, || slot.node.run());
                slot.stats.recompute.inc();
                continue;
            }

            let mut needs_full = force;
            let mut any_updated = false;
            // Once a full recompute is decided, stop invoking further
            // handlers: `run()` below regenerates this node's data from
            // scratch, so any later handler's mutation would be
            // discarded anyway, and a handler may have effects beyond
            // its `data_mut()` write that a moot invocation shouldn't
            // trigger (spec.md §4.3 rule 2 — transition directly to
            // full recompute on an unhandled `Updated` input).
            if !needs_full {
                for (input_idx, handler) in slot.inputs.iter() {
                    if before[*input_idx].state != NodeState::Updated {
                        continue;
                    }
                    any_updated = true;
                    match handler {
                        None => {
                            needs_full = true;
                            break;
                        }
                        Some(h) => {
                            let input_data = before[*input_idx].node.data();
                            let handler_name =
                                format!("handler:{}->{name}", before[*input_idx].node.name());
                            let ok = timed(&handler_name, || h(slot.node.data_mut(), input_data));
                            if !ok {
                                needs_full = true;
                                break;
                            }
                        }
                    }
                }
            }

            if needs_full {
                if !recompute_allowed {
                    slot.state = NodeState::Aborted;
                    slot.stats.abort.inc();
                    self.run_aborted = true;
                    return;
                }
                slot.state = timed(&name, || slot.node.run());
                slot.stats.recompute.inc();
            } else if any_updated {
                slot.state = NodeState::Updated;
                slot.stats.compute.inc();
            } else {
                slot.state = NodeState::Unchanged;
            }
        }
    }

    /// Run every leaf node's `run` and report whether any transitioned
    /// to `Updated`, to decide whether a full `run` is worth scheduling.
    pub fn need_run(&mut self) -> bool {
        let mut any_updated = false;
        for slot in &mut self.slots {
            if slot.inputs.is_empty() {
                let state = slot.node.run();
                slot.stats.recompute.inc();
                slot.state = state;
                any_updated |= state == NodeState::Updated;
            }
        }
        any_updated
    }

    /// Externally request a full recompute on the next `run`. Safe to
    /// call from a thread other than the one driving `run` — this is
    /// exactly why the flag is atomic rather than a plain field
    /// (spec.md §9 "model as an atomic flag only if the control socket
    /// handler runs on a different thread").
    pub fn trigger_recompute(&self) {
        self.force_recompute.store(true, Ordering::Release);
    }

    pub fn run_aborted(&self) -> bool {
        self.run_aborted
    }

    /// Release tracked data and run cleanup hooks in reverse
    /// topological order.
    pub fn cleanup(&mut self) {
        for slot in self.slots.iter_mut().rev() {
            slot.node.clear_tracked_data();
            slot.node.cleanup();
        }
    }

    pub fn state(&self, id: NodeId) -> NodeState {
        self.slots[self.orig_to_slot[id.0]].state
    }

    /// This node's data, if visible under the node-data visibility
    /// contract (state is `Updated`/`Unchanged`, or the node opted out
    /// of the rule via `is_valid_across_runs`).
    pub fn get_data(&self, id: NodeId) -> Option<&dyn Any> {
        let slot = &self.slots[self.orig_to_slot[id.0]];
        let visible = matches!(slot.state, NodeState::Updated | NodeState::Unchanged)
            || slot.node.is_valid_across_runs();
        visible.then(|| slot.node.data())
    }

    pub fn get_data_as<T: 'static>(&self, id: NodeId) -> Option<&T> {
        self.get_data(id).and_then(|d| d.downcast_ref::<T>())
    }

    /// Dispatch a whitespace-split control-socket command
    /// (`inc-engine/show-stats [engine]`, ...). The optional trailing
    /// engine-name token is accepted and ignored — this crate only ever
    /// hosts one engine.
    pub fn handle_command(&mut self, cmd: &str) -> String {
        match cmd.split_whitespace().next() {
            Some("inc-engine/show-stats") => self.format_stats(),
            Some("inc-engine/clear-stats") => {
                self.clear_stats();
                "ok".to_string()
            }
            Some("inc-engine/recompute") => {
                self.trigger_recompute();
                "ok".to_string()
            }
            Some(other) => format!("unknown command: {other}"),
            None => "empty command".to_string(),
        }
    }

    fn format_stats(&self) -> String {
        let mut out = String::new();
        for slot in &self.slots {
            out.push_str(&format!(
                "{}: state={} recompute={} compute={} abort={}\n",
                slot.node.name(),
                slot.state.name(),
                slot.stats.recompute.get(),
                slot.stats.compute.get(),
                slot.stats.abort.get(),
            ));
        }
        out
    }

    fn clear_stats(&mut self) {
        for slot in &mut self.slots {
            slot.stats.recompute.reset();
            slot.stats.compute.reset();
            slot.stats.abort.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CountingLeaf {
        name: &'static str,
        remaining_updates: u32,
    }

    impl EngineNode for CountingLeaf {
        fn name(&self) -> &str {
            self.name
        }
        fn run(&mut self) -> NodeState {
            if self.remaining_updates > 0 {
                self.remaining_updates -= 1;
                NodeState::Updated
            } else {
                NodeState::Unchanged
            }
        }
        fn data(&self) -> &dyn Any {
            &self.remaining_updates
        }
        fn data_mut(&mut self) -> &mut dyn Any {
            &mut self.remaining_updates
        }
    }

    #[derive(Debug, Default)]
    struct Downstream(u32);

    impl EngineNode for Downstream {
        fn name(&self) -> &str {
            "downstream"
        }
        fn run(&mut self) -> NodeState {
            self.0 += 1;
            NodeState::Updated
        }
        fn data(&self) -> &dyn Any {
            &self.0
        }
        fn data_mut(&mut self) -> &mut dyn Any {
            &mut self.0
        }
    }

    #[test]
    fn cycle_is_rejected_at_build() {
        let mut b = EngineBuilder::new();
        let a = b
            .add_node(
                Box::new(CountingLeaf {
                    name: "a",
                    remaining_updates: 0,
                }),
                vec![],
            )
            .unwrap();
        // Build a 2nd node referencing `a`, then manually craft a cycle
        // by re-adding through a fresh builder is not expressible via
        // the public API (NodeId only ever points backward), so this
        // instead checks MAX_INPUT enforcement — the other hard error.
        let many_inputs: Vec<_> = (0..=MAX_INPUT).map(|_| (a, None)).collect();
        let mut b2 = EngineBuilder::new();
        b2.add_node(
            Box::new(CountingLeaf {
                name: "a",
                remaining_updates: 0,
            }),
            vec![],
        )
        .unwrap();
        let err = b2
            .add_node(Box::new(Downstream::default()), many_inputs)
            .unwrap_err();
        assert!(matches!(err, CtlError::EngineBuild(_)));
    }

    // S6: DAG L1 -> M -> T; L1 has a handler on M, no handler on T.
    // Mutating L1 should compute M incrementally but force T through a
    // full recompute.
    #[test]
    fn incremental_vs_full_recompute() {
        let mut b = EngineBuilder::new();
        let l1 = b
            .add_node(
                Box::new(CountingLeaf {
                    name: "L1",
                    remaining_updates: 1,
                }),
                vec![],
            )
            .unwrap();
        let handler: ChangeHandler = Box::new(|data, _input| {
            *data.downcast_mut::<u32>().unwrap() += 1;
            true
        });
        let m = b
            .add_node(Box::new(Downstream::default()), vec![(l1, Some(handler))])
            .unwrap();
        b.add_node(Box::new(Downstream::default()), vec![(m, None)])
            .unwrap();
        let mut engine = b.build().unwrap();

        engine.init_run();
        engine.run(true);

        assert_eq!(engine.state(l1), NodeState::Updated);
        assert_eq!(engine.state(m), NodeState::Updated);
    }

    // S7: recompute disallowed + unabsorbable change aborts the node;
    // the next `run(false)` is then a no-op.
    #[test]
    fn abort_propagates_and_blocks_until_recompute_allowed() {
        let mut b = EngineBuilder::new();
        let l1 = b
            .add_node(
                Box::new(CountingLeaf {
                    name: "L1",
                    remaining_updates: 1,
                }),
                vec![],
            )
            .unwrap();
        // No handler on the edge: any Updated input forces a full
        // recompute, which `run(false)` cannot permit.
        let t = b
            .add_node(Box::new(Downstream::default()), vec![(l1, None)])
            .unwrap();
        let mut engine = b.build().unwrap();

        engine.init_run();
        engine.run(false);

        assert_eq!(engine.state(t), NodeState::Aborted);
        assert!(engine.run_aborted());

        let recompute_before = 0; // sanity anchor, no stats getter needed
        let _ = recompute_before;
        engine.run(false); // no-op: previous run aborted, recompute still disallowed
        assert!(engine.run_aborted());
    }
}
