use crate::expr::Script;
use crate::node::{Node, NodeId, NodeKind};

/// Script installed on a choice gate that has several outputs but no
/// routing script of its own: a fair coin toss.
const XOR_DEFAULT_SCRIPT: &str = "=B(0.5)";

/// The compiled process graph: nodes in declaration order plus reverse
/// adjacency. Node ids are 1-based declaration positions, so lookups are
/// plain vector indexing.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub title: String,
    nodes: Vec<Node>,
    preds: Vec<Vec<NodeId>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node; its id must equal `len + 1`.
    pub fn push_node(&mut self, node: Node) {
        debug_assert_eq!(node.id as usize, self.nodes.len() + 1);
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id >= 1 && (id as usize) <= self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[(id - 1) as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[(id - 1) as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn generators(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Generator)
            .map(|n| n.id)
            .collect()
    }

    /// Distinct direct predecessors of `id`, in declaration order.
    pub fn preds(&self, id: NodeId) -> &[NodeId] {
        &self.preds[(id - 1) as usize]
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        self.node_mut(from).outputs.push(to);
    }

    /// Builds the reverse adjacency and installs wiring-dependent defaults.
    /// Call once after all nodes and connections are in.
    pub fn finalize(&mut self) {
        self.preds = vec![Vec::new(); self.nodes.len()];
        for i in 0..self.nodes.len() {
            let from = self.nodes[i].id;
            for o in 0..self.nodes[i].outputs.len() {
                let to = self.nodes[i].outputs[o];
                let p = &mut self.preds[(to - 1) as usize];
                if !p.contains(&from) {
                    p.push(from);
                }
            }
        }
        for node in &mut self.nodes {
            if node.kind == NodeKind::XorGate
                && node.outputs.len() > 1
                && node.script.is_none()
            {
                node.script = Some(Script::parse(XOR_DEFAULT_SCRIPT));
            }
        }
    }
}
