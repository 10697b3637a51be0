//! Batch driver: parses the model, seeds the generators and runs one or
//! more repetitions. Every repetition re-parses so node state, token ids
//! and scenario variables restart from zero; the RNG stream continues
//! across repetitions so a batch is one reproducible draw sequence.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::Simulation;
use crate::error::ModelError;
use crate::expr::Scope;
use crate::network::Network;
use crate::node::Node;
use crate::parser;
use crate::report::{BatchReport, RunReport};
use crate::state::SimContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    pub repetitions: usize,
    pub seed: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            repetitions: 1,
            seed: 0,
        }
    }
}

impl RunOptions {
    pub fn with_repetitions(mut self, n: usize) -> Self {
        self.repetitions = n.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Owns a model text and drives repetitions over it.
pub struct Runner {
    model: String,
    options: RunOptions,
}

impl Runner {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn run(&self) -> Result<BatchReport, ModelError> {
        let mut ctx = SimContext::new(self.options.seed);
        let mut batch = BatchReport::default();
        for rep in 0..self.options.repetitions.max(1) {
            ctx.reset();
            batch.runs.push(self.run_rep(rep, &mut ctx)?);
        }
        Ok(batch)
    }

    fn run_rep(&self, rep: usize, ctx: &mut SimContext) -> Result<RunReport, ModelError> {
        let mut net = parser::parse(&self.model)?;
        let mut sim = Simulation::new();
        seed_generators(&mut net, &mut sim, ctx);
        let events = sim.run(&mut net, ctx);
        info!(rep, elapsed = sim.time, events, "run finished");
        Ok(RunReport::collect(rep, &net, &sim, ctx, events))
    }
}

/// Parses and runs a model once with the given seed.
pub fn run_once(model: &str, seed: u64) -> Result<RunReport, ModelError> {
    let mut ctx = SimContext::new(seed);
    Runner::new(model).run_rep(0, &mut ctx)
}

/// Runs each generator's script (a scenario initializer, evaluated with no
/// token in scope) and schedules its first activation at time zero.
fn seed_generators(net: &mut Network, sim: &mut Simulation, ctx: &mut SimContext) {
    for id in net.generators() {
        {
            let node = net.node_mut(id);
            let Node {
                script, aggregates, ..
            } = &mut *node;
            if let Some(script) = script {
                script.run(&mut Scope::new(ctx, aggregates, None));
            }
        }
        sim.schedule(0.0, id, 0);
    }
}
