//! Conditional waits. One token at a time holds the watched slot; the
//! engine polls the node after every executed event. The script's first
//! clause is the readiness test (it normally assigns `value`); once `value`
//! turns truthy the remaining clauses run and the token is released.

use tracing::debug;

use crate::engine::Simulation;
use crate::expr::{Scope, IMPLICIT_TARGET};
use crate::network::Network;
use crate::node::{Node, NodeId};
use crate::state::{SimContext, TokenId, Value};

use super::fan_out;

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
        visit.ended = None;
    }
    if net.node(id).servers[0].in_service.is_some() {
        net.node_mut(id).servers[0].queue.push_back(token);
        return;
    }
    net.node_mut(id).servers[0].in_service = Some(token);
    let t = ctx.token_mut(token);
    t.attrs
        .insert(IMPLICIT_TARGET.to_string(), Value::Bool(false));
    t.visit_mut(id).begun = Some(now);
    sim.watch(id);
}

/// One poll. Returns true when the watch is spent: either the token was
/// released, or there is nothing left to watch.
pub(super) fn poll(
    net: &mut Network,
    id: NodeId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) -> bool {
    let Some(token) = net.node(id).servers[0].in_service else {
        return true;
    };
    // a condition without a script can never become ready
    if net.node(id).script.is_none() {
        return false;
    }
    {
        let node = net.node_mut(id);
        let Node {
            script, aggregates, ..
        } = &mut *node;
        if let Some(script) = script {
            script.run_first(&mut Scope::new(ctx, aggregates, Some(token)));
        }
    }
    let ready = ctx
        .token(token)
        .attrs
        .get(IMPLICIT_TARGET)
        .map_or(false, Value::truthy);
    if !ready {
        return false;
    }
    {
        let node = net.node_mut(id);
        let Node {
            script, aggregates, ..
        } = &mut *node;
        if let Some(script) = script {
            script.run_rest(&mut Scope::new(ctx, aggregates, Some(token)));
        }
    }
    ctx.token_mut(token).visit_mut(id).ended = Some(sim.time);
    debug!(node = id, token, time = sim.time, "condition released");
    fan_out(net, id, token, sim, ctx);
    let node = net.node_mut(id);
    node.servers[0].in_service = None;
    if let Some(next) = node.servers[0].queue.pop_front() {
        insert(net, id, next, sim, ctx);
    }
    true
}
