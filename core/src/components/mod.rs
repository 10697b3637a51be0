//! Node behaviors, dispatched by a plain match on `NodeKind`. Three entry
//! points: `insert` (a token reaches a node), `execute` (a scheduled
//! activation fires) and `poll` (a condition watch is tested).

mod activity;
mod condition;
mod generator;
mod sink;

use tracing::{debug, trace};

use crate::engine::Simulation;
use crate::expr::IMPLICIT_TARGET;
use crate::network::Network;
use crate::node::{NodeId, NodeKind};
use crate::state::{SimContext, TokenId, Value};

pub(crate) fn insert(
    net: &mut Network,
    id: NodeId,
    token: TokenId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    match net.node(id).kind {
        NodeKind::Generator => {
            debug!(node = id, token, "token routed into a generator; dropped")
        }
        NodeKind::Condition => condition::insert(net, id, token, sim, ctx),
        NodeKind::Sink | NodeKind::Terminate => sink::insert(net, id, token, sim, ctx),
        _ => activity::insert(net, id, token, sim, ctx),
    }
}

pub(crate) fn execute(
    net: &mut Network,
    id: NodeId,
    server: usize,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    match net.node(id).kind {
        NodeKind::Generator => generator::execute(net, id, sim, ctx),
        // conditions fire from the watch list, sinks act on insert
        NodeKind::Condition | NodeKind::Sink | NodeKind::Terminate => {}
        _ => activity::execute(net, id, server, sim, ctx),
    }
}

/// Returns true when the watch is spent and must not be re-armed.
pub(crate) fn poll(
    net: &mut Network,
    id: NodeId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) -> bool {
    match net.node(id).kind {
        NodeKind::Condition => condition::poll(net, id, sim, ctx),
        _ => true,
    }
}

/// Passes `token` onward: exclusive gates route by the token's `value`,
/// everything else hands the same token to every output. No outputs means
/// the token is absorbed where it is.
pub(crate) fn fan_out(
    net: &mut Network,
    id: NodeId,
    token: TokenId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    let (kind, outputs) = {
        let node = net.node(id);
        (node.kind, node.outputs.clone())
    };
    if outputs.is_empty() {
        trace!(node = id, token, "no outputs; token absorbed");
        return;
    }
    if kind == NodeKind::XorGate {
        let idx = route_index(ctx, token, outputs.len());
        trace!(node = id, token, route = idx, "gate routed");
        insert(net, outputs[idx], token, sim, ctx);
    } else {
        for &out in &outputs {
            insert(net, out, token, sim, ctx);
        }
    }
}

/// Exclusive-gate routing: with two outputs a truthy `value` picks the
/// first and a falsy one the second; with more, `value` is the output index
/// (truncated and clamped into range). A missing `value` counts as falsy.
fn route_index(ctx: &SimContext, token: TokenId, n: usize) -> usize {
    let value = ctx.token(token).attrs.get(IMPLICIT_TARGET);
    let truthy = value.map_or(false, Value::truthy);
    let mut idx = 1;
    if truthy || n < 2 {
        idx = 0;
    }
    if n > 2 {
        let raw = value.and_then(Value::as_f64).unwrap_or(0.0) as i64;
        idx = raw.clamp(0, n as i64 - 1) as usize;
    }
    idx
}
