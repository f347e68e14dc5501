//! Object index.
//!
//! Maps the user-facing object ids (shared by nodes and edges) to the arena
//! handle of the entity they name.

use hg_core::{EdgeId, HgResult, NodeId, ObjectId};

use crate::error::GraphError;
use crate::graph::Topology;

/// Arena handle of one network object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Node(NodeId),
    Edge(EdgeId),
}

/// O(1) lookup between object ids and arena handles.
#[derive(Debug, Clone)]
pub struct ObjectIndex {
    /// Object ids in creation order.
    objects: Vec<ObjectId>,

    /// Reverse lookup sized to max(ObjectId.index) + 1; None if that ID doesn't exist.
    handles: Vec<Option<Handle>>,
}

impl ObjectIndex {
    pub fn from_topology(topology: &Topology) -> Self {
        let mut pairs: Vec<(ObjectId, Handle)> = topology
            .nodes()
            .iter()
            .map(|n| (n.object, Handle::Node(n.id)))
            .chain(
                topology
                    .edges()
                    .iter()
                    .map(|e| (e.object, Handle::Edge(e.id))),
            )
            .collect();
        pairs.sort_by_key(|(id, _)| *id);

        let max_idx = pairs.last().map_or(0, |(id, _)| id.as_usize() + 1);
        let mut handles = vec![None; max_idx];
        for &(id, handle) in &pairs {
            handles[id.as_usize()] = Some(handle);
        }

        Self {
            objects: pairs.into_iter().map(|(id, _)| id).collect(),
            handles,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All object ids in creation order.
    pub fn objects(&self) -> &[ObjectId] {
        &self.objects
    }

    pub fn handle(&self, id: ObjectId) -> Option<Handle> {
        self.handles.get(id.as_usize()).copied().flatten()
    }

    pub fn node(&self, id: ObjectId) -> HgResult<NodeId> {
        match self.handle(id) {
            Some(Handle::Node(node)) => Ok(node),
            _ => Err(GraphError::IdNotFound { what: "node object" }.into()),
        }
    }

    pub fn edge(&self, id: ObjectId) -> HgResult<EdgeId> {
        match self.handle(id) {
            Some(Handle::Edge(edge)) => Ok(edge),
            _ => Err(GraphError::IdNotFound { what: "edge object" }.into()),
        }
    }
}
