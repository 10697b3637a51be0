//! Discrete-event simulator for BPMN-style token-flow process models.
//! Models are plain text (`1 Start(E,[1.0],50.0)` ... `1->2;2->3`); tokens
//! flow through generators, tasks, gateways, timers, conditions and end
//! events under a single sequential event loop.

mod components;

pub mod dist;
pub mod engine;
pub mod error;
pub mod expr;
pub mod network;
pub mod node;
pub mod parser;
pub mod report;
pub mod runner;
pub mod state;

pub use dist::{Dist, Sample, Sampler};
pub use engine::Simulation;
pub use error::ModelError;
pub use expr::{EvalError, Expr, Scope, Script};
pub use network::Network;
pub use node::{Node, NodeId, NodeKind, ServerState};
pub use parser::parse;
pub use report::{BatchReport, NodeStat, RunReport, TokenRecord};
pub use runner::{run_once, RunOptions, Runner};
pub use state::{SimContext, Token, TokenId, Value, Visit};

/// Scenario (cross-token, per-run) variable prefix.
pub const SCENARIO_PREFIX: &str = "S.";
/// Node-local aggregate variable prefix.
pub const AGGREGATE_PREFIX: &str = "A.";
/// Processed-token counter present in every node's aggregates.
pub const AGGREGATE_COUNT: &str = "A.n";
