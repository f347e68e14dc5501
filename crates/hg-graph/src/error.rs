//! Topology error types.

use hg_core::{EdgeId, HgError, NodeId};

/// Topology construction and validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge endpoint refers to a node that doesn't exist.
    #[error("Edge {edge} refers to non-existent node {node}")]
    InvalidNodeRef { edge: EdgeId, node: NodeId },

    /// An edge endpoint names a slot the node does not have.
    #[error("Edge {edge} uses slot {slot} of node {node} which has {slots} slots")]
    SlotOutOfRange {
        edge: EdgeId,
        node: NodeId,
        slot: usize,
        slots: usize,
    },

    /// An edge takes water from an in-flow slot or delivers into an out-flow slot.
    #[error("Edge {edge} runs against the flow direction of slot {slot} on node {node}")]
    WrongDirection { edge: EdgeId, node: NodeId, slot: usize },

    /// Both ends of an edge sit on the same node.
    #[error("Edge {edge} starts and ends on node {node}")]
    SelfLoop { edge: EdgeId, node: NodeId },

    /// Two edges are attached to the same node slot.
    #[error("Slot {slot} of node {node} is linked by both edge {first} and edge {second}")]
    SlotLinkedTwice {
        node: NodeId,
        slot: usize,
        first: EdgeId,
        second: EdgeId,
    },

    /// A node slot has no edge attached.
    #[error("Slot {slot} of node {node} is not linked to any edge")]
    SlotUnlinked { node: NodeId, slot: usize },

    /// A branch or junction was declared without side slots.
    #[error("Node {node} needs at least one side slot")]
    NoSideSlots { node: NodeId },

    /// ID not found in index map.
    #[error("{what} not found in index map")]
    IdNotFound { what: &'static str },
}

impl From<GraphError> for HgError {
    fn from(err: GraphError) -> Self {
        let what = match err {
            GraphError::InvalidNodeRef { .. } => "edge refers to a missing node",
            GraphError::SlotOutOfRange { .. } => "edge slot out of range",
            GraphError::WrongDirection { .. } => "edge against slot flow direction",
            GraphError::SelfLoop { .. } => "edge is a self loop",
            GraphError::SlotLinkedTwice { .. } => "slot linked twice",
            GraphError::SlotUnlinked { .. } => "slot left unlinked",
            GraphError::NoSideSlots { .. } => "connector without side slots",
            GraphError::IdNotFound { what } => what,
        };
        HgError::Invariant { what }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_slot_and_node() {
        let err = GraphError::SlotUnlinked {
            node: NodeId::from_index(3),
            slot: 1,
        };
        assert_eq!(err.to_string(), "Slot 1 of node 3 is not linked to any edge");
    }

    #[test]
    fn is_a_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(GraphError::SlotLinkedTwice {
            node: NodeId::from_index(1),
            slot: 0,
            first: EdgeId::from_index(2),
            second: EdgeId::from_index(4),
        });
        assert_eq!(
            err.to_string(),
            "Slot 0 of node 1 is linked by both edge 2 and edge 4"
        );
    }

    #[test]
    fn converts_into_invariant() {
        let err: HgError = GraphError::SelfLoop {
            edge: EdgeId::from_index(0),
            node: NodeId::from_index(0),
        }
        .into();
        assert!(matches!(err, HgError::Invariant { .. }));
    }
}
