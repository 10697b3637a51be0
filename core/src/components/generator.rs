//! Token sources. Each activation mints one token, passes it downstream and
//! reschedules itself until its horizon is spent: a positive horizon is a
//! time limit on the next activation, a negative `-k` means exactly `k`
//! tokens, zero means a single one.

use tracing::{debug, warn};

use crate::dist::Sample;
use crate::engine::Simulation;
use crate::expr::Scope;
use crate::network::Network;
use crate::node::{Node, NodeId};
use crate::state::SimContext;

use super::fan_out;

pub(super) fn execute(
    net: &mut Network,
    id: NodeId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    let now = sim.time;
    let token = ctx.new_token();
    let visit = ctx.token_mut(token).visit_mut(id);
    visit.arrived = Some(now);
    visit.begun = Some(now);
    visit.ended = Some(now);
    net.node_mut(id).bump_processed();
    debug!(node = id, token, time = now, "token emitted");
    fan_out(net, id, token, sim, ctx);

    let sample = {
        let node = net.node_mut(id);
        let Node {
            sampler, aggregates, ..
        } = &mut *node;
        sampler.sample(&mut Scope::new(ctx, aggregates, Some(token)))
    };
    let delay = match sample {
        Sample::Scalar(d) => d,
        Sample::Periodic { .. } => {
            warn!(node = id, "generator interval cannot be periodic; stopping");
            return;
        }
    };
    let next = now + delay;
    let node = net.node_mut(id);
    let keep = (node.horizon > 0.0 && next <= node.horizon)
        || (node.fired as f64) < -node.horizon - 1.0;
    if keep {
        node.fired += 1;
        sim.schedule(next, id, 0);
    } else {
        debug!(
            node = id,
            emitted = node.tokens_processed(),
            "generator horizon reached"
        );
    }
}
