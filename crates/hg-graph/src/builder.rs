//! Incremental topology builder.

use hg_core::{EdgeId, HgResult, NodeId, ObjectId};

use crate::graph::{Edge, Endpoint, Node, NodeKind, Topology};
use crate::{sides, validate};

/// Builder for constructing a topology incrementally.
///
/// Nodes and edges draw their object ids from one counter, so ids are
/// unique across both and follow creation order. Call `build()` to validate
/// the slot links and freeze the result into an immutable `Topology`.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    next_object: u32,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_object(&mut self) -> ObjectId {
        let id = ObjectId::from_index(self.next_object);
        self.next_object += 1;
        id
    }

    /// Add a node and return its handle.
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId::from_usize(self.nodes.len());
        let object = self.next_object();
        self.nodes.push(Node {
            id,
            object,
            name: name.into(),
            kind,
        });
        id
    }

    /// Add an edge carrying water from `inlet` to `outlet`.
    pub fn add_edge(
        &mut self,
        name: impl Into<String>,
        inlet: Endpoint,
        outlet: Endpoint,
    ) -> EdgeId {
        let id = EdgeId::from_usize(self.edges.len());
        let object = self.next_object();
        self.edges.push(Edge {
            id,
            object,
            name: name.into(),
            inlet,
            outlet,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_usize())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.as_usize())
    }

    /// Validate and freeze the topology.
    pub fn build(self) -> HgResult<Topology> {
        validate::validate_structure(&self.nodes, &self.edges)?;

        let (slot_offsets, slot_edges) = validate::link_slots(&self.nodes, &self.edges)?;

        let sides = sides::classify(&self.nodes, &self.edges, &slot_offsets, &slot_edges);

        Ok(Topology {
            nodes: self.nodes,
            edges: self.edges,
            slot_offsets,
            slot_edges,
            sides,
        })
    }
}
