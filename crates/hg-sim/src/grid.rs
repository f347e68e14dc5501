//! Shared simulation context.
//!
//! Nodes and edges refer to each other through arena handles. While an
//! entity runs it is checked out of its arena and handed the rest of the
//! grid, so a query that loops back to it finds an empty cell and fails with
//! [`SimError::Busy`] instead of aliasing.

use std::collections::VecDeque;

use tracing::trace;

use hg_core::{EdgeId, Id, NodeId, ObjectId};
use hg_graph::Endpoint;

use crate::config::SimConfig;
use crate::edge::{BundleEntry, Edge};
use crate::error::{SimError, SimResult};
use crate::node::Node;

/// Slot-indexed storage where each entry can be checked out while it runs.
#[derive(Debug, Clone)]
pub(crate) struct Arena<T> {
    items: Vec<Option<T>>,
    objects: Vec<ObjectId>,
}

impl<T> Arena<T> {
    pub(crate) fn new(items: Vec<(ObjectId, T)>) -> Self {
        let (objects, items) = items.into_iter().map(|(o, t)| (o, Some(t))).unzip();
        Self { items, objects }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    fn object(&self, id: Id) -> SimResult<ObjectId> {
        self.objects
            .get(id.as_usize())
            .copied()
            .ok_or(SimError::InvalidArg {
                what: "arena handle out of range",
            })
    }

    pub(crate) fn get(&self, id: Id) -> SimResult<&T> {
        let object = self.object(id)?;
        self.items[id.as_usize()]
            .as_ref()
            .ok_or(SimError::Busy { object })
    }

    pub(crate) fn get_mut(&mut self, id: Id) -> SimResult<&mut T> {
        let object = self.object(id)?;
        self.items[id.as_usize()]
            .as_mut()
            .ok_or(SimError::Busy { object })
    }

    fn take(&mut self, id: Id) -> SimResult<T> {
        let object = self.object(id)?;
        self.items[id.as_usize()]
            .take()
            .ok_or(SimError::Busy { object })
    }

    fn restore(&mut self, id: Id, item: T) {
        self.items[id.as_usize()] = Some(item);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().flatten()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut().flatten()
    }
}

/// Receiver of deferred mass-flow work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Node(NodeId),
    Edge(EdgeId),
}

/// One deferred `set_mass_flow(slot, mass_flow)` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Task {
    pub target: Target,
    pub slot: usize,
    pub mass_flow: f64,
}

/// A temperature together with the (mixed) step its water left a producer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Reading {
    pub temp: f64,
    pub entry_step_global: f64,
}

/// Everything an entity may touch while it runs.
#[derive(Debug)]
pub(crate) struct Grid {
    pub config: SimConfig,
    pub step: usize,
    pub nodes: Arena<Node>,
    pub edges: Arena<Edge>,
    queue: VecDeque<Task>,
}

impl Grid {
    pub(crate) fn new(config: SimConfig, nodes: Arena<Node>, edges: Arena<Edge>) -> Self {
        Self {
            config,
            step: 0,
            nodes,
            edges,
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn interval(&self) -> f64 {
        self.config.interval_s
    }

    pub(crate) fn conversion(&self) -> f64 {
        self.config.energy_unit_conversion
    }

    /// Defer a push to the end of the FIFO queue.
    pub(crate) fn schedule(&mut self, target: Target, slot: usize, mass_flow: f64) {
        trace!(step = self.step, ?target, slot, mass_flow, "schedule");
        self.queue.push_back(Task {
            target,
            slot,
            mass_flow,
        });
    }

    pub(crate) fn pop_task(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    pub(crate) fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Run `f` on a checked-out node. The node is restored even when `f` fails.
    pub(crate) fn with_node<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut Node, &mut Grid) -> SimResult<R>,
    ) -> SimResult<R> {
        let mut node = self.nodes.take(id)?;
        let result = f(&mut node, self);
        self.nodes.restore(id, node);
        result
    }

    /// Run `f` on a checked-out edge. The edge is restored even when `f` fails.
    pub(crate) fn with_edge<R>(
        &mut self,
        id: EdgeId,
        f: impl FnOnce(&mut Edge, &mut Grid) -> SimResult<R>,
    ) -> SimResult<R> {
        let mut edge = self.edges.take(id)?;
        let result = f(&mut edge, self);
        self.edges.restore(id, edge);
        result
    }

    /// Outlet temperature of a node at one of its out-flow slots.
    pub(crate) fn node_outlet_temp(
        &mut self,
        at: Endpoint,
        flow_hint: Option<f64>,
    ) -> SimResult<Reading> {
        self.with_node(at.node, |node, grid| {
            node.outlet_temp(at.slot, flow_hint, grid)
        })
    }

    /// Estimated (or exact, once pushed) outlet temperature of an edge.
    pub(crate) fn edge_outlet_temp(&mut self, id: EdgeId) -> SimResult<Reading> {
        self.with_edge(id, |edge, grid| edge.outlet_temp(grid))
    }

    pub(crate) fn edge_bundle(&mut self, id: EdgeId) -> SimResult<Vec<BundleEntry>> {
        self.with_edge(id, |edge, grid| edge.outlet_bundle(grid))
    }

    /// Pressure of a node slot at the current step, `None` while unknown.
    pub(crate) fn node_pressure(&self, at: Endpoint) -> SimResult<Option<f64>> {
        let node = self.nodes.get(at.node)?;
        Ok(node.state().pressure.known(at.slot, self.step))
    }

    /// Pressure at one end of an edge (0 inlet, 1 outlet) at the current step.
    pub(crate) fn edge_pressure(&self, id: EdgeId, end: usize) -> SimResult<Option<f64>> {
        let edge = self.edges.get(id)?;
        Ok(edge.pressure.known(end, self.step))
    }

    /// Drain one queued push.
    pub(crate) fn run_task(&mut self, task: Task) -> SimResult<()> {
        trace!(step = self.step, ?task, "run");
        match task.target {
            Target::Node(id) => self.with_node(id, |node, grid| {
                node.set_mass_flow(task.slot, task.mass_flow, grid)
            }),
            Target::Edge(id) => self.with_edge(id, |edge, grid| {
                edge.set_mass_flow(task.slot, task.mass_flow, grid)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_out_entries_are_busy() {
        let a = Id::from_index(4);
        let mut arena = Arena::new(vec![(a, 1.0_f64)]);
        let slot = Id::from_index(0);
        let v = arena.take(slot).unwrap();
        assert!(matches!(arena.get(slot), Err(SimError::Busy { object }) if object == a));
        arena.restore(slot, v + 1.0);
        assert_eq!(*arena.get(slot).unwrap(), 2.0);
        assert!(arena.get(Id::from_index(3)).is_err());
        assert_eq!(arena.len(), 1);
    }
}
