use std::collections::{BTreeMap, VecDeque};

use crate::dist::Sampler;
use crate::expr::Script;
use crate::state::{TokenId, Value};
use crate::AGGREGATE_COUNT;

pub type NodeId = u32;

/// Behavior tag for a model node. Dispatch is a plain `match` on this
/// everywhere; there is no per-kind vtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Generator,
    Activity,
    XorGate,
    AndGate,
    Timer,
    Condition,
    Throw,
    Script,
    Sink,
    Terminate,
}

impl NodeKind {
    /// BPMN element name, used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Generator => "startEvent",
            NodeKind::Activity => "task",
            NodeKind::XorGate => "exclusiveGateway",
            NodeKind::AndGate => "parallelGateway",
            NodeKind::Timer => "intermediateCatchEvent",
            NodeKind::Condition => "intermediateCatchEvent",
            NodeKind::Throw => "intermediateThrowEvent",
            NodeKind::Script => "scriptTask",
            NodeKind::Sink => "endEvent",
            NodeKind::Terminate => "terminateEndEvent",
        }
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, NodeKind::Sink | NodeKind::Terminate)
    }
}

/// One service lane. Plain activities have exactly one; multi-server tasks
/// round-robin arrivals across several, each lane with its own queue.
#[derive(Debug, Clone, Default)]
pub struct ServerState {
    pub in_service: Option<TokenId>,
    pub queue: VecDeque<TokenId>,
}

/// A node of the process graph. All kinds share this struct; fields not
/// meaningful for a kind stay at their defaults.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Identifier exactly as written in the model source (may be fractional).
    pub declared_id: f64,
    pub title: String,
    pub outputs: Vec<NodeId>,
    pub sampler: Sampler,
    pub script: Option<Script>,
    pub servers: Vec<ServerState>,
    pub next_server: usize,
    /// Completions needed per release; and-joins recompute it from their
    /// distinct inputs on every arrival.
    pub join_required: u32,
    /// Generator cutoff: positive is a time horizon, negative `-k` means
    /// exactly `k` tokens, zero means a single token.
    pub horizon: f64,
    /// Times a generator has rescheduled itself.
    pub fired: u64,
    pub aggregates: BTreeMap<String, Value>,
    pub hint_x: Option<f64>,
    pub hint_y: Option<f64>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            declared_id: id as f64,
            title: String::new(),
            outputs: Vec::new(),
            sampler: Sampler::constant(0.0),
            script: None,
            servers: vec![ServerState::default()],
            next_server: 0,
            join_required: 1,
            horizon: 0.0,
            fired: 0,
            aggregates: BTreeMap::from([(AGGREGATE_COUNT.to_string(), Value::Num(0.0))]),
            hint_x: None,
            hint_y: None,
        }
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_servers(mut self, count: usize) -> Self {
        self.servers = vec![ServerState::default(); count.max(1)];
        self
    }

    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }

    /// Tokens this node finished with, straight from its `A.n` aggregate.
    pub fn tokens_processed(&self) -> f64 {
        self.aggregates
            .get(AGGREGATE_COUNT)
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    pub fn bump_processed(&mut self) {
        let n = self.tokens_processed();
        self.aggregates
            .insert(AGGREGATE_COUNT.to_string(), Value::Num(n + 1.0));
    }

    pub fn queue_len(&self) -> usize {
        self.servers.iter().map(|s| s.queue.len()).sum()
    }

    pub fn busy_servers(&self) -> usize {
        self.servers.iter().filter(|s| s.in_service.is_some()).count()
    }
}
