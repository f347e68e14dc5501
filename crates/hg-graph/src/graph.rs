//! Core topology data structures.

use hg_core::{EdgeId, NodeId, ObjectId};

/// Whether water enters or leaves a node through a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotDirection {
    /// Water flows from the attached edge into the node.
    Inflow,
    /// Water flows from the node into the attached edge.
    Outflow,
}

/// Node variant together with its slot layout.
///
/// | kind     | slots                                                     |
/// |----------|-----------------------------------------------------------|
/// | Producer | 0 return (in), 1 supply (out)                             |
/// | Consumer | 0 supply (in), 1 return (out)                             |
/// | Transfer | 0 primary supply (in), 1 primary return (out), 2 secondary supply (out), 3 secondary return (in) |
/// | Branch   | 0 inlet, 1..=N outlets                                    |
/// | Junction | 0 outlet, 1..=N inlets                                    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Producer,
    Consumer,
    Transfer,
    Branch { outlets: usize },
    Junction { inlets: usize },
}

impl NodeKind {
    pub fn slot_count(self) -> usize {
        match self {
            NodeKind::Producer | NodeKind::Consumer => 2,
            NodeKind::Transfer => 4,
            NodeKind::Branch { outlets } => outlets + 1,
            NodeKind::Junction { inlets } => inlets + 1,
        }
    }

    /// Direction of `slot`, `None` if the node has no such slot.
    pub fn slot_direction(self, slot: usize) -> Option<SlotDirection> {
        use SlotDirection::{Inflow, Outflow};
        if slot >= self.slot_count() {
            return None;
        }
        Some(match (self, slot) {
            (NodeKind::Producer, 0) => Inflow,
            (NodeKind::Producer, _) => Outflow,
            (NodeKind::Consumer, 0) => Inflow,
            (NodeKind::Consumer, _) => Outflow,
            (NodeKind::Transfer, 0 | 3) => Inflow,
            (NodeKind::Transfer, _) => Outflow,
            (NodeKind::Branch { .. }, 0) => Inflow,
            (NodeKind::Branch { .. }, _) => Outflow,
            (NodeKind::Junction { .. }, 0) => Outflow,
            (NodeKind::Junction { .. }, _) => Inflow,
        })
    }

    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Producer => "Producer",
            NodeKind::Consumer => "Consumer",
            NodeKind::Transfer => "Transfer",
            NodeKind::Branch { .. } => "Branch",
            NodeKind::Junction { .. } => "Junction",
        }
    }
}

/// One end of an edge: a node and one of its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub node: NodeId,
    pub slot: usize,
}

impl Endpoint {
    pub fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub object: ObjectId,
    pub name: String,
    pub kind: NodeKind,
}

/// A pipe between two node slots; water runs from `inlet` to `outlet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub object: ObjectId,
    pub name: String,
    pub inlet: Endpoint,
    pub outlet: Endpoint,
}

/// Which half of the network an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    /// Hot water on its way from a producer (or transfer secondary) to the load.
    Supply,
    /// Cooled water on its way back.
    Return,
}

/// A validated, immutable network topology.
///
/// Nodes and edges are stored in vectors indexed by their handles. Each node
/// slot maps to exactly one edge through the flattened `slot_edges` table.
#[derive(Debug, Clone)]
pub struct Topology {
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,

    /// Node i's slot edges are in slot_edges[slot_offsets[i]..slot_offsets[i+1]], in slot order.
    pub(crate) slot_offsets: Vec<usize>,
    pub(crate) slot_edges: Vec<EdgeId>,

    pub(crate) sides: Vec<Side>,
}

impl Topology {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_usize())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.as_usize())
    }

    /// Edges attached to a node, indexed by slot.
    pub fn node_edges(&self, id: NodeId) -> &[EdgeId] {
        let idx = id.as_usize();
        if idx >= self.nodes.len() {
            return &[];
        }
        &self.slot_edges[self.slot_offsets[idx]..self.slot_offsets[idx + 1]]
    }

    pub fn slot_edge(&self, node: NodeId, slot: usize) -> Option<EdgeId> {
        self.node_edges(node).get(slot).copied()
    }

    pub fn side(&self, edge: EdgeId) -> Option<Side> {
        self.sides.get(edge.as_usize()).copied()
    }

    pub fn edges_on(&self, side: Side) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |e| self.side(e.id) == Some(side))
    }

    pub fn nodes_of<'a>(
        &'a self,
        pred: impl Fn(NodeKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| pred(n.kind))
    }
}
