//! Queued service behavior shared by tasks, gates, timers, script tasks and
//! throw events: one or more lanes, each serving a single token at a time
//! for a sampled delay, with a FIFO queue per lane.

use tracing::{trace, warn};

use crate::dist::Sample;
use crate::engine::Simulation;
use crate::expr::Scope;
use crate::network::Network;
use crate::node::{Node, NodeId, NodeKind};
use crate::state::{SimContext, TokenId};

use super::fan_out;

/// Arrival entry point. Multi-server tasks hand arrivals to lanes in
/// round-robin order regardless of which lanes are free; each lane queues
/// independently.
pub(super) fn insert(
    net: &mut Network,
    id: NodeId,
    token: TokenId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    if net.node(id).kind == NodeKind::AndGate {
        // a join releases after one completion per distinct input
        let required = net.preds(id).len().max(1) as u32;
        net.node_mut(id).join_required = required;
    }
    let srv = {
        let node = net.node_mut(id);
        if node.servers.len() > 1 {
            let s = node.next_server;
            node.next_server = (node.next_server + 1) % node.servers.len();
            s
        } else {
            0
        }
    };
    lane_insert(net, id, srv, token, sim, ctx);
}

/// Puts a token into one specific lane: starts service if the lane is free,
/// queues otherwise. Dequeued tokens come back through here so they stay in
/// their lane.
fn lane_insert(
    net: &mut Network,
    id: NodeId,
    srv: usize,
    token: TokenId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    if net.node(id).servers[srv].in_service.is_some() {
        ctx.token_mut(token).visit_mut(id).arrived = Some(sim.time);
        let node = net.node_mut(id);
        node.servers[srv].queue.push_back(token);
        trace!(
            node = id,
            lane = srv,
            token,
            depth = node.servers[srv].queue.len(),
            "queued"
        );
        return;
    }
    begin_service(net, id, srv, token, sim, ctx);
}

fn begin_service(
    net: &mut Network,
    id: NodeId,
    srv: usize,
    token: TokenId,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    let (kind, sample) = {
        let node = net.node_mut(id);
        node.servers[srv].in_service = Some(token);
        let kind = node.kind;
        let Node {
            sampler, aggregates, ..
        } = &mut *node;
        let sample = sampler.sample(&mut Scope::new(ctx, aggregates, Some(token)));
        (kind, sample)
    };
    let now = sim.time;
    let mut completion = match sample {
        Sample::Scalar(d) => now + d,
        Sample::Periodic { period, phase } => {
            if period > 0.0 {
                // next boundary of the cycle, never before its phase origin
                let k = ((now - phase) / period).ceil().max(0.0);
                phase + k * period
            } else {
                warn!(node = id, period, "nonpositive timer period; firing now");
                now
            }
        }
    };
    let visit = ctx.token_mut(token).visit_mut(id);
    if visit.arrived.is_none() {
        visit.arrived = Some(now);
    }
    visit.begun = Some(now);
    if kind == NodeKind::Timer {
        if let Sample::Scalar(_) = sample {
            // a timer delay counts from arrival, so queue wait is credited
            let arrived = visit.arrived.unwrap_or(now);
            visit.begun = Some(arrived);
            completion -= now - arrived;
        }
    }
    trace!(node = id, lane = srv, token, completion, "service begins");
    sim.schedule(completion, id, srv);
}

/// A lane's scheduled completion: stamp the visit, count it, run the node
/// script, release downstream if the join quota is met, then pull the next
/// token from this lane's queue.
pub(super) fn execute(
    net: &mut Network,
    id: NodeId,
    srv: usize,
    sim: &mut Simulation,
    ctx: &mut SimContext,
) {
    let Some(token) = net.node(id).servers[srv].in_service else {
        return;
    };
    let now = sim.time;
    ctx.token_mut(token).visit_mut(id).ended = Some(now);
    net.node_mut(id).bump_processed();
    {
        let node = net.node_mut(id);
        let Node {
            script, aggregates, ..
        } = &mut *node;
        if let Some(script) = script {
            script.run(&mut Scope::new(ctx, aggregates, Some(token)));
        }
    }
    let required = net.node(id).join_required.max(1);
    let (completions, release) = {
        let visit = ctx.token_mut(token).visit_mut(id);
        visit.completions += 1;
        (visit.completions, visit.completions % required == 0)
    };
    if release {
        fan_out(net, id, token, sim, ctx);
    } else {
        trace!(node = id, token, completions, required, "join waiting");
    }
    let node = net.node_mut(id);
    node.servers[srv].in_service = None;
    if let Some(next) = node.servers[srv].queue.pop_front() {
        lane_insert(net, id, srv, next, sim, ctx);
    }
}
