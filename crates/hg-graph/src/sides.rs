//! Supply/return classification.
//!
//! Supply edges are reached from a producer's supply slot (or a transfer's
//! secondary supply slot) by following water through branches and junctions
//! until it enters a consumer, transfer or producer. Every other edge is on
//! the return side.

use std::collections::VecDeque;

use hg_core::EdgeId;

use crate::graph::{Edge, Node, NodeKind, Side};

pub(crate) fn classify(
    nodes: &[Node],
    edges: &[Edge],
    slot_offsets: &[usize],
    slot_edges: &[EdgeId],
) -> Vec<Side> {
    let mut sides = vec![Side::Return; edges.len()];
    let slot_edge = |node: usize, slot: usize| slot_edges[slot_offsets[node] + slot];

    let mut work: VecDeque<EdgeId> = nodes
        .iter()
        .filter_map(|n| match n.kind {
            NodeKind::Producer => Some(slot_edge(n.id.as_usize(), 1)),
            NodeKind::Transfer => Some(slot_edge(n.id.as_usize(), 2)),
            _ => None,
        })
        .collect();

    while let Some(edge) = work.pop_front() {
        if sides[edge.as_usize()] == Side::Supply {
            continue;
        }
        sides[edge.as_usize()] = Side::Supply;

        let next = edges[edge.as_usize()].outlet.node;
        let node = &nodes[next.as_usize()];
        match node.kind {
            NodeKind::Branch { outlets } => {
                work.extend((1..=outlets).map(|slot| slot_edge(next.as_usize(), slot)));
            }
            NodeKind::Junction { .. } => work.push_back(slot_edge(next.as_usize(), 0)),
            _ => {}
        }
    }

    sides
}
