use tokenflow_core::*;

/// Drives one compiled model end to end: owns the network, the scheduler and
/// the run state, and exposes the readings the case tests assert on.
pub struct ModelHarness {
    pub net: Network,
    pub sim: Simulation,
    pub ctx: SimContext,
}

impl ModelHarness {
    pub fn new(model: &str) -> Self {
        Self::with_seed(model, 0)
    }

    pub fn with_seed(model: &str, seed: u64) -> Self {
        let net = parse(model).expect("model should compile");
        Self {
            net,
            sim: Simulation::new(),
            ctx: SimContext::new(seed),
        }
    }

    /// Runs generator construction scripts and puts every generator on the
    /// schedule at time zero, the same way a batch repetition begins.
    pub fn start(&mut self) {
        for id in self.net.generators() {
            let script = self.net.node(id).script.clone();
            if let Some(script) = script {
                let node = self.net.node_mut(id);
                script.run(&mut Scope::new(&mut self.ctx, &mut node.aggregates, None));
            }
            self.sim.schedule(0.0, id, 0);
        }
    }

    /// Drains the event heap; returns how many activations executed.
    pub fn run(&mut self) -> u64 {
        self.sim.run(&mut self.net, &mut self.ctx)
    }

    pub fn start_and_run(&mut self) -> u64 {
        self.start();
        self.run()
    }

    /// Finished tokens parked at a sink, oldest first.
    pub fn sink_queue(&self, id: NodeId) -> Vec<TokenId> {
        self.net.node(id).servers[0].queue.iter().copied().collect()
    }

    pub fn processed(&self, id: NodeId) -> f64 {
        self.net.node(id).tokens_processed()
    }

    pub fn queued(&self, id: NodeId) -> usize {
        self.net.node(id).queue_len()
    }

    pub fn busy(&self, id: NodeId) -> usize {
        self.net.node(id).busy_servers()
    }

    pub fn scenario_num(&self, key: &str) -> Option<f64> {
        self.ctx.scenario.get(key).and_then(Value::as_f64)
    }

    pub fn visit(&self, token: TokenId, node: NodeId) -> Visit {
        self.ctx
            .token(token)
            .visit(node)
            .copied()
            .unwrap_or_default()
    }
}
