use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::{debug, trace};

use crate::components;
use crate::network::Network;
use crate::node::NodeId;
use crate::state::SimContext;

/// A scheduled node activation. Ordering is by time, then by insertion
/// sequence, so equal timestamps execute first-scheduled-first.
#[derive(Debug, Clone, Copy)]
struct PendingEvent {
    time: f64,
    node: NodeId,
    server: usize,
    seq: u64,
}

impl PartialEq for PendingEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}
impl Eq for PendingEvent {}
impl PartialOrd for PendingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// The event loop: a pending-event heap, the simulated clock and the list
/// of condition watches polled after every executed event.
pub struct Simulation {
    pub time: f64,
    events: BinaryHeap<Reverse<PendingEvent>>,
    watches: Vec<NodeId>,
    seq: u64,
    executed: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            events: BinaryHeap::new(),
            watches: Vec::new(),
            seq: 0,
            executed: 0,
        }
    }

    /// Schedules an activation of `node`'s lane `server`. Times in the past
    /// are clamped to now; the clock never moves backwards.
    pub fn schedule(&mut self, time: f64, node: NodeId, server: usize) {
        let at = time.max(self.time);
        trace!(node, server, at, "scheduled");
        self.events.push(Reverse(PendingEvent {
            time: at,
            node,
            server,
            seq: self.seq,
        }));
        self.seq += 1;
    }

    /// Registers `node` for polling after each executed event. Watches do
    /// not keep the run alive; an empty heap ends it regardless.
    pub fn watch(&mut self, node: NodeId) {
        trace!(node, "watching condition");
        self.watches.push(node);
    }

    /// Drops every pending activation and watch; returns how many
    /// activations were discarded. Used by terminate ends.
    pub fn purge_pending(&mut self) -> usize {
        let dropped = self.events.len();
        debug!(dropped, watches = self.watches.len(), "purging pending work");
        self.events.clear();
        self.watches.clear();
        dropped
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Executes the earliest pending activation, then polls watches in
    /// registration order. Returns false once the heap is empty.
    pub fn step(&mut self, net: &mut Network, ctx: &mut SimContext) -> bool {
        let Some(Reverse(ev)) = self.events.pop() else {
            return false;
        };
        self.time = ev.time;
        components::execute(net, ev.node, ev.server, self, ctx);
        self.executed += 1;
        self.poll_watches(net, ctx);
        true
    }

    /// Runs until no pending events remain; returns how many were executed.
    pub fn run(&mut self, net: &mut Network, ctx: &mut SimContext) -> u64 {
        let before = self.executed;
        while self.step(net, ctx) {}
        self.executed - before
    }

    /// One poll pass over the current watches. A watch that does not
    /// release goes straight back, so relative registration order is kept;
    /// watches registered during the pass join behind it.
    fn poll_watches(&mut self, net: &mut Network, ctx: &mut SimContext) {
        if self.watches.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.watches);
        for id in batch {
            if !components::poll(net, id, self, ctx) {
                self.watches.push(id);
            }
        }
    }
}
