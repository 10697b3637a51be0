//! End events. A sink stamps the full visit at arrival time, counts the
//! token, parks it in its queue for the final report and runs its script.
//! Terminate ends additionally drop all pending work, stopping the run.

use tracing::debug;

use crate::engine::Simulation;
use crate::expr::Scope;
use crate::network::Network;
use crate::node::{Node, NodeId, NodeKind};
use crate::state::{SimContext, TokenId};

pub(super) fn insert(
    net: &mut Network,
    id: NodeId,
    token: TokenId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    let now = sim.time;
    {
        let visit = ctx.token_mut(token).visit_mut(id);
        visit.arrived = Some(now);
        visit.begun = Some(now);
        visit.ended = Some(now);
    }
    {
        let node = net.node_mut(id);
        node.bump_processed();
        node.servers[0].queue.push_back(token);
        let Node {
            script, aggregates, ..
        } = &mut *node;
        if let Some(script) = script {
            script.run(&mut Scope::new(ctx, aggregates, Some(token)));
        }
    }
    debug!(node = id, token, time = now, "token sunk");
    if net.node(id).kind == NodeKind::Terminate {
        debug!(node = id, time = now, "terminate end reached");
        sim.purge_pending();
    }
}
