//! Topology validation logic.

use hg_core::{EdgeId, HgResult};

use crate::error::GraphError;
use crate::graph::{Edge, Endpoint, Node, NodeKind, SlotDirection};

/// Check that every edge endpoint names an existing node slot with the right direction.
pub(crate) fn validate_structure(nodes: &[Node], edges: &[Edge]) -> HgResult<()> {
    for node in nodes {
        if matches!(
            node.kind,
            NodeKind::Branch { outlets: 0 } | NodeKind::Junction { inlets: 0 }
        ) {
            return Err(GraphError::NoSideSlots { node: node.id }.into());
        }
    }

    for edge in edges {
        if edge.inlet.node == edge.outlet.node {
            return Err(GraphError::SelfLoop {
                edge: edge.id,
                node: edge.inlet.node,
            }
            .into());
        }
        check_endpoint(nodes, edge, edge.inlet, SlotDirection::Outflow)?;
        check_endpoint(nodes, edge, edge.outlet, SlotDirection::Inflow)?;
    }

    Ok(())
}

fn check_endpoint(
    nodes: &[Node],
    edge: &Edge,
    end: Endpoint,
    expected: SlotDirection,
) -> Result<(), GraphError> {
    let node = nodes
        .get(end.node.as_usize())
        .ok_or(GraphError::InvalidNodeRef {
            edge: edge.id,
            node: end.node,
        })?;
    match node.kind.slot_direction(end.slot) {
        None => Err(GraphError::SlotOutOfRange {
            edge: edge.id,
            node: node.id,
            slot: end.slot,
            slots: node.kind.slot_count(),
        }),
        Some(dir) if dir != expected => Err(GraphError::WrongDirection {
            edge: edge.id,
            node: node.id,
            slot: end.slot,
        }),
        Some(_) => Ok(()),
    }
}

/// Build the slot table, requiring each node slot to be linked exactly once.
pub(crate) fn link_slots(nodes: &[Node], edges: &[Edge]) -> HgResult<(Vec<usize>, Vec<EdgeId>)> {
    let mut offsets = Vec::with_capacity(nodes.len() + 1);
    offsets.push(0);
    for node in nodes {
        offsets.push(offsets[offsets.len() - 1] + node.kind.slot_count());
    }

    let mut table: Vec<Option<EdgeId>> = vec![None; offsets[nodes.len()]];
    for edge in edges {
        for end in [edge.inlet, edge.outlet] {
            let cell = &mut table[offsets[end.node.as_usize()] + end.slot];
            if let Some(first) = *cell {
                return Err(GraphError::SlotLinkedTwice {
                    node: end.node,
                    slot: end.slot,
                    first,
                    second: edge.id,
                }
                .into());
            }
            *cell = Some(edge.id);
        }
    }

    let mut slot_edges = Vec::with_capacity(table.len());
    for node in nodes {
        let start = offsets[node.id.as_usize()];
        for slot in 0..node.kind.slot_count() {
            let edge = table[start + slot].ok_or(GraphError::SlotUnlinked {
                node: node.id,
                slot,
            })?;
            slot_edges.push(edge);
        }
    }

    Ok((offsets, slot_edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_core::{HgError, Id};

    fn node(i: u32, kind: NodeKind) -> Node {
        Node {
            id: Id::from_index(i),
            object: Id::from_index(i),
            name: format!("N{i}"),
            kind,
        }
    }

    fn edge(i: u32, inlet: (u32, usize), outlet: (u32, usize)) -> Edge {
        Edge {
            id: Id::from_index(i),
            object: Id::from_index(100 + i),
            name: format!("E{i}"),
            inlet: Endpoint::new(Id::from_index(inlet.0), inlet.1),
            outlet: Endpoint::new(Id::from_index(outlet.0), outlet.1),
        }
    }

    #[test]
    fn validate_empty_topology() {
        assert!(validate_structure(&[], &[]).is_ok());
        let (offsets, slots) = link_slots(&[], &[]).unwrap();
        assert_eq!(offsets, vec![0]);
        assert!(slots.is_empty());
    }

    #[test]
    fn validate_invalid_node_ref() {
        let nodes = vec![node(0, NodeKind::Producer)];
        let edges = vec![edge(0, (0, 1), (99, 0))];
        let result = validate_structure(&nodes, &edges);
        assert!(matches!(result.unwrap_err(), HgError::Invariant { .. }));
    }

    #[test]
    fn rejects_edge_leaving_an_inflow_slot() {
        let nodes = vec![node(0, NodeKind::Producer), node(1, NodeKind::Consumer)];
        // Producer slot 0 takes water in; it cannot feed a pipe.
        let edges = vec![edge(0, (0, 0), (1, 0))];
        assert!(check_endpoint(&nodes, &edges[0], edges[0].inlet, SlotDirection::Outflow).is_err());
        assert!(validate_structure(&nodes, &edges).is_err());
    }

    #[test]
    fn rejects_unlinked_slot() {
        let nodes = vec![node(0, NodeKind::Producer), node(1, NodeKind::Consumer)];
        let edges = vec![edge(0, (0, 1), (1, 0))];
        assert!(validate_structure(&nodes, &edges).is_ok());
        assert!(link_slots(&nodes, &edges).is_err());
    }

    #[test]
    fn rejects_connector_without_sides() {
        let nodes = vec![node(0, NodeKind::Branch { outlets: 0 })];
        assert!(validate_structure(&nodes, &[]).is_err());
    }
}
