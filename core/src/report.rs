//! Run results for presentation consumers: per-node counters, the final
//! scenario snapshot and the visit history of every token that reached a
//! sink. Everything serializes, so a frontend can take the report as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::Simulation;
use crate::network::Network;
use crate::node::NodeId;
use crate::state::{SimContext, TokenId, Value, Visit};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStat {
    pub id: NodeId,
    pub kind: String,
    pub title: String,
    pub processed: f64,
    pub queued: usize,
}

/// One finished token: where it sank and every visit it made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: TokenId,
    pub sink: NodeId,
    pub visits: BTreeMap<NodeId, Visit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run: usize,
    pub elapsed: f64,
    pub events: u64,
    pub scenario: BTreeMap<String, Value>,
    pub nodes: Vec<NodeStat>,
    pub completed: Vec<TokenRecord>,
}

impl RunReport {
    /// Snapshot after one repetition. Completed tokens come from the sink
    /// queues, ordered by sink id then queue position.
    pub fn collect(
        run: usize,
        net: &Network,
        sim: &Simulation,
        ctx: &SimContext,
        events: u64,
    ) -> Self {
        let nodes = net
            .nodes()
            .map(|n| NodeStat {
                id: n.id,
                kind: n.kind.label().to_string(),
                title: n.title.clone(),
                processed: n.tokens_processed(),
                queued: n.queue_len(),
            })
            .collect();
        let mut completed = Vec::new();
        for n in net.nodes().filter(|n| n.kind.is_sink()) {
            for &t in &n.servers[0].queue {
                completed.push(TokenRecord {
                    token: t,
                    sink: n.id,
                    visits: ctx.token(t).visits.clone(),
                });
            }
        }
        RunReport {
            run,
            elapsed: sim.time,
            events,
            scenario: ctx.scenario.clone(),
            nodes,
            completed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub runs: Vec<RunReport>,
}

impl BatchReport {
    pub fn min_elapsed(&self) -> f64 {
        self.runs.iter().map(|r| r.elapsed).reduce(f64::min).unwrap_or(0.0)
    }

    pub fn mean_elapsed(&self) -> f64 {
        if self.runs.is_empty() {
            return 0.0;
        }
        self.runs.iter().map(|r| r.elapsed).sum::<f64>() / self.runs.len() as f64
    }

    pub fn max_elapsed(&self) -> f64 {
        self.runs.iter().map(|r| r.elapsed).reduce(f64::max).unwrap_or(0.0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
