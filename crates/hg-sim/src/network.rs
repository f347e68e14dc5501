//! The network engine: step loop, control inputs and resets.
//!
//! Each step runs in three stages. Every consumer pulls exact supply water
//! from its supply pipe and schedules its pipes; the FIFO queue of pushes is
//! drained breadth-first through pipes, branches, junctions, transfers and
//! producers; finally every producer does its step bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hg_core::{EdgeId, NodeId, ObjectId};
use hg_graph::{Handle, ObjectIndex, Topology};
use hg_results::PipeStates;

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::grid::Grid;
use crate::node::{ControlMode, Node};

/// Producer set points for a run, one series per producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerControl {
    /// Heat output per step, energy units
    Heat(Vec<Vec<f64>>),
    /// Supply temperature per step, °C
    Temp(Vec<Vec<f64>>),
}

impl ProducerControl {
    fn mode(&self) -> ControlMode {
        match self {
            ProducerControl::Heat(_) => ControlMode::Heat,
            ProducerControl::Temp(_) => ControlMode::Temperature,
        }
    }

    fn series(&self) -> &[Vec<f64>] {
        match self {
            ProducerControl::Heat(s) | ProducerControl::Temp(s) => s,
        }
    }
}

/// Inputs of [`Network::run`], written from the current step onward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCommand {
    pub control: ProducerControl,
    /// Electricity per step for each producer; `None` entries are skipped
    #[serde(default)]
    pub electricity: Option<Vec<Option<Vec<f64>>>>,
    /// Producers the series belong to, all producers in creation order by default
    #[serde(default)]
    pub producer_ids: Option<Vec<ObjectId>>,
    /// Side fractions (slots 2..=N) per branch or junction for every step of the run
    #[serde(default)]
    pub valve_pos: BTreeMap<ObjectId, Vec<f64>>,
    /// Step to stop before, the end of the control series by default
    #[serde(default)]
    pub end_step: Option<usize>,
}

impl RunCommand {
    pub fn new(control: ProducerControl) -> Self {
        Self {
            control,
            electricity: None,
            producer_ids: None,
            valve_pos: BTreeMap::new(),
            end_step: None,
        }
    }
}

/// One value per producer for a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepControl {
    Heat(Vec<f64>),
    Temp(Vec<f64>),
}

/// What happened in the step solved by [`Network::solve_one_step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: usize,
    /// Per edge, creation order
    pub inlet_temp: Vec<f64>,
    pub outlet_temp: Vec<f64>,
    pub mass_flow: Vec<f64>,
    /// Per consumer, energy units
    pub heat_delivered: Vec<f64>,
    /// Plug contents at the start of the next step
    pub pipe_states: PipeStates,
}

/// A district-heating network and its simulation state.
#[derive(Debug)]
pub struct Network {
    pub(crate) topology: Topology,
    pub(crate) index: ObjectIndex,
    pub(crate) grid: Grid,
    pub(crate) producers: Vec<NodeId>,
    pub(crate) consumers: Vec<NodeId>,
}

impl Network {
    pub(crate) fn new(topology: Topology, grid: Grid) -> SimResult<Self> {
        let index = ObjectIndex::from_topology(&topology);
        let mut producers = Vec::new();
        let mut consumers = Vec::new();
        for n in topology.nodes() {
            match grid.nodes.get(n.id)? {
                Node::Producer(_) => producers.push(n.id),
                Node::Consumer(_) => consumers.push(n.id),
                _ => {}
            }
        }
        let mut network = Self {
            topology,
            index,
            grid,
            producers,
            consumers,
        };
        network.clear()?;
        info!(
            nodes = network.topology.nodes().len(),
            edges = network.topology.edges().len(),
            horizon = network.grid.config.horizon,
            "network built"
        );
        Ok(network)
    }

    pub fn config(&self) -> &SimConfig {
        &self.grid.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Next step to be solved.
    pub fn current_step(&self) -> usize {
        self.grid.step
    }

    pub fn horizon(&self) -> usize {
        self.grid.config.horizon
    }

    pub fn node_object(&self, id: NodeId) -> Option<ObjectId> {
        self.topology.node(id).map(|n| n.object)
    }

    pub fn edge_object(&self, id: EdgeId) -> Option<ObjectId> {
        self.topology.edge(id).map(|e| e.object)
    }

    pub fn producer_ids(&self) -> Vec<ObjectId> {
        self.producers
            .iter()
            .filter_map(|&id| self.node_object(id))
            .collect()
    }

    pub fn consumer_ids(&self) -> Vec<ObjectId> {
        self.consumers
            .iter()
            .filter_map(|&id| self.node_object(id))
            .collect()
    }

    pub(crate) fn node_id(&self, object: ObjectId) -> SimResult<NodeId> {
        match self.index.handle(object) {
            Some(Handle::Node(id)) => Ok(id),
            _ => Err(SimError::UnknownObject { object }),
        }
    }

    pub(crate) fn edge_id(&self, object: ObjectId) -> SimResult<EdgeId> {
        match self.index.handle(object) {
            Some(Handle::Edge(id)) => Ok(id),
            _ => Err(SimError::UnknownObject { object }),
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> SimResult<&Node> {
        self.grid.nodes.get(id)
    }

    fn producer_mut(&mut self, object: ObjectId) -> SimResult<&mut crate::node::Producer> {
        let id = self.node_id(object)?;
        match self.grid.nodes.get_mut(id)? {
            Node::Producer(p) => Ok(p),
            _ => Err(SimError::InvalidArg {
                what: "object is not a producer",
            }),
        }
    }

    /// Rewind to step 0 with fresh per-step state and the initial plugs.
    pub fn clear(&mut self) -> SimResult<()> {
        self.grid.step = 0;
        self.grid.clear_queue();
        for edge in self.grid.edges.iter_mut() {
            edge.clear();
        }
        for node in self.grid.nodes.iter_mut() {
            node.clear();
        }
        for &id in &self.producers {
            let supply = self.topology.slot_edge(id, 1).ok_or(SimError::InvalidArg {
                what: "producer without supply pipe",
            })?;
            let temp = self
                .grid
                .edges
                .get(supply)?
                .initial_plugs()
                .first()
                .map_or(f64::NAN, |p| p.entry_temp);
            if let Node::Producer(p) = self.grid.nodes.get_mut(id)? {
                p.initial_supply_temp = temp;
            }
        }
        Ok(())
    }

    /// Replace inputs and rewind.
    ///
    /// `demands` and `electricity_price` are given per consumer and per
    /// producer in creation order; `pipe_states` replaces the initial plugs
    /// of the pipes it names.
    pub fn reset(
        &mut self,
        demands: Option<&[Vec<f64>]>,
        electricity_price: Option<&[Vec<f64>]>,
        pipe_states: Option<&PipeStates>,
    ) -> SimResult<()> {
        if let Some(demands) = demands {
            if demands.len() != self.consumers.len() {
                return Err(SimError::InvalidArg {
                    what: "one demand series per consumer",
                });
            }
            for (&id, demand) in self.consumers.iter().zip(demands) {
                if let Node::Consumer(c) = self.grid.nodes.get_mut(id)? {
                    c.update_demand(demand)?;
                }
            }
        }
        if let Some(prices) = electricity_price {
            if prices.len() != self.producers.len() {
                return Err(SimError::InvalidArg {
                    what: "one electricity price series per producer",
                });
            }
            for (&id, price) in self.producers.iter().zip(prices) {
                if let Node::Producer(p) = self.grid.nodes.get_mut(id)? {
                    p.electricity_price.fill(0.0);
                    for (step, &v) in price.iter().enumerate() {
                        p.electricity_price.try_set(step, v, "electricity price")?;
                    }
                }
            }
        }
        if let Some(states) = pipe_states {
            for (&object, plugs) in &states.pipes {
                let id = self.edge_id(object)?;
                self.grid.edges.get_mut(id)?.set_initial_plugs(plugs)?;
            }
        }
        self.clear()
    }

    fn write_control(
        &mut self,
        control: &ProducerControl,
        producer_ids: &[ObjectId],
        start: usize,
    ) -> SimResult<usize> {
        let series = control.series();
        if series.len() != producer_ids.len() {
            return Err(SimError::InvalidArg {
                what: "one control series per producer",
            });
        }
        let mut run_len = 0;
        for (values, &object) in series.iter().zip(producer_ids) {
            if values.is_empty() {
                return Err(SimError::InvalidArg {
                    what: "control series must not be empty",
                });
            }
            run_len = run_len.max(values.len());
            let producer = self.producer_mut(object)?;
            if producer.params.control != control.mode() {
                return Err(SimError::InvalidArg {
                    what: "control series does not match the producer's control mode",
                });
            }
            let horizon = producer.state.steps();
            for (i, &v) in values.iter().enumerate().take(horizon.saturating_sub(start)) {
                match control.mode() {
                    ControlMode::Temperature => {
                        producer
                            .state
                            .temp
                            .try_set(1, start + i, v, "supply temperature")?
                    }
                    ControlMode::Heat => producer.heat.try_set(start + i, v, "heat output")?,
                }
            }
        }
        Ok(run_len)
    }

    /// Write producer set points from the current step on and solve through
    /// the end of the series (or `end_step`).
    pub fn run(&mut self, command: RunCommand) -> SimResult<()> {
        let start = self.grid.step;
        let producer_ids = command
            .producer_ids
            .clone()
            .unwrap_or_else(|| self.producer_ids());
        let run_len = self.write_control(&command.control, &producer_ids, start)?;
        let horizon = self.horizon();

        if let Some(electricity) = &command.electricity {
            for (values, &object) in electricity.iter().zip(&producer_ids) {
                let Some(values) = values else { continue };
                let producer = self.producer_mut(object)?;
                let chp = producer.chp.as_mut().ok_or(SimError::InvalidArg {
                    what: "electricity is only commanded at CHP producers",
                })?;
                for (i, &v) in values.iter().enumerate().take(horizon.saturating_sub(start)) {
                    chp.electricity.try_set(start + i, v, "electricity")?;
                }
            }
        }

        for (&object, fractions) in &command.valve_pos {
            let id = self.node_id(object)?;
            let connector = self
                .grid
                .nodes
                .get_mut(id)?
                .connector_mut()
                .ok_or(SimError::InvalidArg {
                    what: "valve positions are only set on branches and junctions",
                })?;
            connector.set_valve(start, start + run_len, fractions)?;
        }

        let end = command.end_step.unwrap_or(start + run_len).min(horizon);
        debug!(start, end, "run");
        while self.grid.step < end {
            self.solve_step()?;
        }
        Ok(())
    }

    /// Solve every remaining step with the set points already written.
    pub fn solve_horizon(&mut self) -> SimResult<()> {
        while self.grid.step < self.horizon() {
            self.solve_step()?;
        }
        Ok(())
    }

    /// Write one set point per producer (creation order), solve one step and
    /// report its edge values.
    pub fn solve_one_step(&mut self, control: StepControl) -> SimResult<StepReport> {
        let step = self.grid.step;
        if step >= self.horizon() {
            return Err(SimError::InvalidArg {
                what: "the whole horizon has been solved",
            });
        }
        let series = match &control {
            StepControl::Heat(v) => ProducerControl::Heat(v.iter().map(|&x| vec![x]).collect()),
            StepControl::Temp(v) => ProducerControl::Temp(v.iter().map(|&x| vec![x]).collect()),
        };
        let ids = self.producer_ids();
        self.write_control(&series, &ids, step)?;
        self.solve_step()?;

        let mut report = StepReport {
            step,
            inlet_temp: Vec::new(),
            outlet_temp: Vec::new(),
            mass_flow: Vec::new(),
            heat_delivered: Vec::new(),
            pipe_states: self.get_pipe_states(step + 1)?,
        };
        for edge in self.grid.edges.iter() {
            report.inlet_temp.push(edge.temp.get(0, step));
            report.outlet_temp.push(edge.temp.get(1, step));
            report.mass_flow.push(edge.mass_flow.get(0, step));
        }
        for &id in &self.consumers {
            if let Node::Consumer(c) = self.grid.nodes.get(id)? {
                report.heat_delivered.push(c.heat.get(step));
            }
        }
        Ok(report)
    }

    /// Pull, push, then bookkeeping for the current step.
    fn solve_step(&mut self) -> SimResult<()> {
        let step = self.grid.step;
        if step >= self.horizon() {
            return Err(SimError::InvalidArg {
                what: "the whole horizon has been solved",
            });
        }
        debug!(step, "solving step");
        for &id in &self.consumers {
            self.grid.with_node(id, |node, grid| node.solve(grid))?;
        }
        let mut tasks = 0usize;
        while let Some(task) = self.grid.pop_task() {
            self.grid.run_task(task)?;
            tasks += 1;
        }
        debug!(step, tasks, "queue drained");
        for &id in &self.producers {
            self.grid.with_node(id, |node, grid| node.solve(grid))?;
        }
        self.grid.step += 1;
        Ok(())
    }
}
