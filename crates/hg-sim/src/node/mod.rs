//! Node variants.
//!
//! Every node keeps slot-indexed per-step temperature, mass flow and
//! pressure plus a violation map in a shared [`NodeState`]; the variants add
//! their own physics on top through [`NodeModel`].

mod branch;
mod connector;
mod consumer;
mod junction;
mod producer;
mod transfer;

pub use producer::{ChpHistory, ControlMode};

pub(crate) use branch::Branch;
pub(crate) use connector::Connector;
pub(crate) use consumer::{Consumer, ConsumerParams};
pub(crate) use junction::Junction;
pub(crate) use producer::{Chp, Producer, ProducerParams};
pub(crate) use transfer::{Transfer, TransferParams};

use hg_core::{EdgeId, ObjectId, Series, SlotSeries, ViolationKind, Violations};

use crate::error::{SimError, SimResult};
use crate::grid::{Grid, Reading};

/// State shared by all node variants.
#[derive(Debug, Clone)]
pub(crate) struct NodeState {
    pub object: ObjectId,
    /// Attached edge per slot
    pub edges: Vec<EdgeId>,
    pub temp: SlotSeries,
    pub mass_flow: SlotSeries,
    pub pressure: SlotSeries,
    /// Step (possibly mixed) at which water at the outlet left a producer
    pub entry_step_global: Series,
    pub violations: Violations,
}

impl NodeState {
    pub(crate) fn new(
        object: ObjectId,
        edges: Vec<EdgeId>,
        steps: usize,
        kinds: &[ViolationKind],
    ) -> Self {
        let slots = edges.len();
        Self {
            object,
            edges,
            temp: SlotSeries::unknown(slots, steps),
            mass_flow: SlotSeries::unknown(slots, steps),
            pressure: SlotSeries::unknown(slots, steps),
            entry_step_global: Series::unknown(steps),
            violations: Violations::new(steps, kinds),
        }
    }

    pub(crate) fn steps(&self) -> usize {
        self.temp.steps()
    }

    pub(crate) fn edge(&self, slot: usize) -> SimResult<EdgeId> {
        self.edges.get(slot).copied().ok_or(SimError::InvalidArg {
            what: "node has no such slot",
        })
    }

    pub(crate) fn clear(&mut self) {
        self.temp.fill(f64::NAN);
        self.mass_flow.fill(f64::NAN);
        self.pressure.fill(f64::NAN);
        self.entry_step_global.fill(f64::NAN);
        self.violations.clear();
    }

    /// Error for a read of a cell nobody wrote in this step.
    pub(crate) fn unwritten(&self, what: &'static str, slot: usize, step: usize) -> SimError {
        SimError::NotYetWritten {
            object: self.object,
            what,
            slot,
            step,
        }
    }

    pub(crate) fn require_temp(&self, slot: usize, step: usize) -> SimResult<f64> {
        self.temp
            .known(slot, step)
            .ok_or_else(|| self.unwritten("temperature", slot, step))
    }
}

/// Behaviour of a node during the pull and push phases of a step.
pub(crate) trait NodeModel {
    fn state(&self) -> &NodeState;

    fn state_mut(&mut self) -> &mut NodeState;

    /// Temperature of the water the node sends out through `slot`.
    ///
    /// `flow_hint` is the flow the asking edge expects to carry; only
    /// heat-controlled producers use it.
    fn outlet_temp(
        &mut self,
        slot: usize,
        flow_hint: Option<f64>,
        grid: &mut Grid,
    ) -> SimResult<Reading>;

    /// Accept the flow an edge pushed through `slot`.
    fn set_mass_flow(&mut self, slot: usize, mass_flow: f64, grid: &mut Grid) -> SimResult<()>;

    /// Step-level work before (consumers) or after (producers) the queue drains.
    fn solve(&mut self, _grid: &mut Grid) -> SimResult<()> {
        Ok(())
    }

    fn clear(&mut self) {
        self.state_mut().clear();
    }
}

/// Closed set of node variants.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Producer(Producer),
    Consumer(Consumer),
    Transfer(Transfer),
    Branch(Branch),
    Junction(Junction),
}

impl Node {
    fn model(&self) -> &dyn NodeModel {
        match self {
            Node::Producer(n) => n,
            Node::Consumer(n) => n,
            Node::Transfer(n) => n,
            Node::Branch(n) => n,
            Node::Junction(n) => n,
        }
    }

    fn model_mut(&mut self) -> &mut dyn NodeModel {
        match self {
            Node::Producer(n) => n,
            Node::Consumer(n) => n,
            Node::Transfer(n) => n,
            Node::Branch(n) => n,
            Node::Junction(n) => n,
        }
    }

    pub(crate) fn state(&self) -> &NodeState {
        self.model().state()
    }

    pub(crate) fn object(&self) -> ObjectId {
        self.state().object
    }

    pub(crate) fn outlet_temp(
        &mut self,
        slot: usize,
        flow_hint: Option<f64>,
        grid: &mut Grid,
    ) -> SimResult<Reading> {
        self.model_mut().outlet_temp(slot, flow_hint, grid)
    }

    pub(crate) fn set_mass_flow(
        &mut self,
        slot: usize,
        mass_flow: f64,
        grid: &mut Grid,
    ) -> SimResult<()> {
        self.model_mut().set_mass_flow(slot, mass_flow, grid)
    }

    pub(crate) fn solve(&mut self, grid: &mut Grid) -> SimResult<()> {
        self.model_mut().solve(grid)
    }

    pub(crate) fn clear(&mut self) {
        self.model_mut().clear();
    }

    /// Report name of the variant.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Node::Producer(p) if p.chp.is_some() => "CHP",
            Node::Producer(_) => "Producer",
            Node::Consumer(_) => "Consumer",
            Node::Transfer(_) => "Transfer",
            Node::Branch(_) => "Branch",
            Node::Junction(_) => "Junction",
        }
    }

    pub(crate) fn connector_mut(&mut self) -> Option<&mut Connector> {
        match self {
            Node::Branch(b) => Some(&mut b.connector),
            Node::Junction(j) => Some(&mut j.connector),
            _ => None,
        }
    }
}
