//! Incremental construction of a [`Network`].

use hg_components::{HeatExchanger, OperationRegion, Pipe};
use hg_core::units::constants::{WATER_CP, WATER_DENSITY};
use hg_core::units::{Length, kgps};
use hg_core::{EdgeId, NodeId, ViolationKind};
use hg_graph::{Endpoint, NodeKind, TopologyBuilder};
use hg_results::PlugState;

use crate::config::SimConfig;
use crate::edge::{Edge, plugs_from_states};
use crate::error::{SimError, SimResult};
use crate::grid::{Arena, Grid};
use crate::network::Network;
use crate::node::{
    Branch, Chp, ChpHistory, Consumer, ConsumerParams, ControlMode, Junction, Node, NodeState,
    Producer, ProducerParams, Transfer, TransferParams,
};

/// How a pipe is filled before the first step.
#[derive(Debug, Clone, PartialEq)]
pub enum PipeFill {
    /// Water of one temperature (°C) that entered during the step before the first
    Uniform(f64),
    /// A saved plug state, newest first
    Plugs(Vec<PlugState>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipeSpec {
    pub pipe: Pipe,
    pub fill: PipeFill,
}

impl PipeSpec {
    /// Water-filled pipe holding water of `historical_t_in` °C.
    pub fn new(
        diameter: Length,
        length: Length,
        thermal_resistance: f64,
        historical_t_in: f64,
    ) -> Self {
        Self {
            pipe: Pipe::new(diameter, length, thermal_resistance),
            fill: PipeFill::Uniform(historical_t_in),
        }
    }
}

/// Combined heat and power parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChpSpec {
    /// Corner points `[heat, electricity]` of the feasible region, any order
    pub operation_region: Vec<[f64; 2]>,
    /// Cost per unit of heat and per unit of electricity
    pub fuel_cost: [f64; 2],
    /// Share of the maximum heat
    pub max_ramp_heat: f64,
    /// Share of the maximum electricity
    pub max_ramp_electricity: f64,
    /// K per step
    pub max_ramp_temp: f64,
    pub history: Option<ChpHistory>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducerSpec {
    pub control: ControlMode,
    /// J/(kg K)
    pub heat_capacity: f64,
    /// kg/m^3
    pub density: f64,
    pub pump_efficiency: f64,
    /// °C
    pub temp_upper_bound: f64,
    pub chp: Option<ChpSpec>,
}

impl Default for ProducerSpec {
    fn default() -> Self {
        Self {
            control: ControlMode::Temperature,
            heat_capacity: WATER_CP,
            density: WATER_DENSITY,
            pump_efficiency: 0.9,
            temp_upper_bound: 120.0,
            chp: None,
        }
    }
}

impl ProducerSpec {
    pub fn temperature_controlled() -> Self {
        Self::default()
    }

    pub fn heat_controlled() -> Self {
        Self {
            control: ControlMode::Heat,
            ..Self::default()
        }
    }

    pub fn with_chp(mut self, chp: ChpSpec) -> Self {
        self.chp = Some(chp);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSpec {
    /// Heat demand per step, energy units
    pub demand: Vec<f64>,
    pub hx: HeatExchanger,
    /// °C
    pub min_supply_temp: f64,
    /// Pa
    pub pressure_load: f64,
    /// °C
    pub setpoint_t_supply_s: f64,
    /// °C
    pub t_return_s: f64,
}

impl ConsumerSpec {
    pub fn new(demand: Vec<f64>) -> Self {
        Self {
            demand,
            hx: HeatExchanger::default(),
            min_supply_temp: 0.0,
            pressure_load: 100_000.0,
            setpoint_t_supply_s: 70.0,
            t_return_s: 45.0,
        }
    }

    pub fn with_heat_exchanger(mut self, hx: HeatExchanger) -> Self {
        self.hx = hx;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferSpec {
    pub hx: HeatExchanger,
    /// Desired secondary supply temperature, °C
    pub opt_temp: f64,
    /// Pa
    pub pressure_load: f64,
}

impl Default for TransferSpec {
    fn default() -> Self {
        let mut hx = HeatExchanger::default();
        hx.max_mass_flow_p = kgps(1600.0);
        Self {
            hx,
            opt_temp: 75.0,
            pressure_load: 100_000.0,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeSpec {
    Producer(ProducerSpec),
    Consumer(ConsumerSpec),
    Transfer(TransferSpec),
    Branch(Option<f64>),
    Junction(Option<f64>),
}

/// Collects nodes and pipes, then validates the topology and allocates the
/// per-step state of every entity.
///
/// Slots follow [`NodeKind`]: producers take the return on 0 and send supply
/// on 1, consumers the reverse, transfers use 0/1 on the primary and 2/3 on
/// the secondary side, branches and junctions have their main edge on 0.
#[derive(Debug)]
pub struct NetworkBuilder {
    config: SimConfig,
    topology: TopologyBuilder,
    nodes: Vec<NodeSpec>,
    pipes: Vec<PipeSpec>,
}

impl NetworkBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            topology: TopologyBuilder::new(),
            nodes: Vec::new(),
            pipes: Vec::new(),
        }
    }

    fn add_node(&mut self, name: impl Into<String>, kind: NodeKind, spec: NodeSpec) -> NodeId {
        self.nodes.push(spec);
        self.topology.add_node(name, kind)
    }

    pub fn add_producer(&mut self, name: impl Into<String>, spec: ProducerSpec) -> NodeId {
        self.add_node(name, NodeKind::Producer, NodeSpec::Producer(spec))
    }

    pub fn add_consumer(&mut self, name: impl Into<String>, spec: ConsumerSpec) -> NodeId {
        self.add_node(name, NodeKind::Consumer, NodeSpec::Consumer(spec))
    }

    pub fn add_transfer(&mut self, name: impl Into<String>, spec: TransferSpec) -> NodeId {
        self.add_node(name, NodeKind::Transfer, NodeSpec::Transfer(spec))
    }

    /// Branch with `outlets` side slots; `default_valve` fills the side
    /// fractions of every step (slot 1 takes the complement).
    pub fn add_branch(
        &mut self,
        name: impl Into<String>,
        outlets: usize,
        default_valve: Option<f64>,
    ) -> NodeId {
        self.add_node(
            name,
            NodeKind::Branch { outlets },
            NodeSpec::Branch(default_valve),
        )
    }

    pub fn add_junction(
        &mut self,
        name: impl Into<String>,
        inlets: usize,
        default_valve: Option<f64>,
    ) -> NodeId {
        self.add_node(
            name,
            NodeKind::Junction { inlets },
            NodeSpec::Junction(default_valve),
        )
    }

    /// Pipe carrying water from `(from, from_slot)` to `(to, to_slot)`.
    pub fn add_pipe(
        &mut self,
        name: impl Into<String>,
        from: (NodeId, usize),
        to: (NodeId, usize),
        spec: PipeSpec,
    ) -> EdgeId {
        self.pipes.push(spec);
        self.topology.add_edge(
            name,
            Endpoint::new(from.0, from.1),
            Endpoint::new(to.0, to.1),
        )
    }

    pub fn build(self) -> SimResult<Network> {
        let config = self.config;
        config.validate()?;
        let topology = self.topology.build()?;
        let steps = config.horizon;

        let mut edges = Vec::with_capacity(self.pipes.len());
        for (e, spec) in topology.edges().iter().zip(self.pipes) {
            let plugs = match &spec.fill {
                PipeFill::Uniform(t) => Edge::uniform_fill(&spec.pipe, *t),
                PipeFill::Plugs(states) => plugs_from_states(states)?,
            };
            let edge = Edge::new(e.id, e.object, e.inlet, e.outlet, spec.pipe, plugs, &config)?;
            edges.push((e.object, edge));
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (n, spec) in topology.nodes().iter().zip(self.nodes) {
            let slot_edges = topology.node_edges(n.id).to_vec();
            let state = |kinds: &[ViolationKind]| {
                NodeState::new(n.object, slot_edges.clone(), steps, kinds)
            };
            let node = match spec {
                NodeSpec::Producer(p) => build_producer(p, &state, steps)?,
                NodeSpec::Consumer(c) => build_consumer(c, &state, &config)?,
                NodeSpec::Transfer(t) => Node::Transfer(Transfer::new(
                    state(&[]),
                    TransferParams {
                        hx: t.hx,
                        opt_temp: t.opt_temp,
                        pressure_load: t.pressure_load,
                    },
                )),
                NodeSpec::Branch(valve) => Node::Branch(Branch::new(state(&[]), valve)?),
                NodeSpec::Junction(valve) => Node::Junction(Junction::new(state(&[]), valve)?),
            };
            nodes.push((n.object, node));
        }

        let grid = Grid::new(config, Arena::new(nodes), Arena::new(edges));
        Network::new(topology, grid)
    }
}

fn build_producer(
    spec: ProducerSpec,
    state: &dyn Fn(&[ViolationKind]) -> NodeState,
    steps: usize,
) -> SimResult<Node> {
    if !(spec.pump_efficiency > 0.0 && spec.density > 0.0 && spec.heat_capacity > 0.0) {
        return Err(SimError::InvalidArg {
            what: "producer efficiency, density and heat capacity must be positive",
        });
    }
    let mut kinds = vec![ViolationKind::SupplyTemp];
    let chp = match spec.chp {
        Some(c) => {
            kinds.extend(Chp::VIOLATIONS);
            Some(Chp::new(
                OperationRegion::new(c.operation_region)?,
                c.fuel_cost,
                [c.max_ramp_heat, c.max_ramp_electricity, c.max_ramp_temp],
                c.history,
                steps,
            ))
        }
        None => None,
    };
    let params = ProducerParams {
        control: spec.control,
        heat_capacity: spec.heat_capacity,
        density: spec.density,
        pump_efficiency: spec.pump_efficiency,
        temp_upper_bound: spec.temp_upper_bound,
    };
    Ok(Node::Producer(Producer::new(state(&kinds), params, chp)))
}

fn build_consumer(
    spec: ConsumerSpec,
    state: &dyn Fn(&[ViolationKind]) -> NodeState,
    config: &SimConfig,
) -> SimResult<Node> {
    if spec.setpoint_t_supply_s <= spec.t_return_s {
        return Err(SimError::InvalidArg {
            what: "consumer supply setpoint must be above its return temperature",
        });
    }
    let params = ConsumerParams {
        hx: spec.hx,
        min_supply_temp: spec.min_supply_temp,
        pressure_load: spec.pressure_load,
        setpoint_t_supply_s: spec.setpoint_t_supply_s,
        t_return_s: spec.t_return_s,
    };
    Ok(Node::Consumer(Consumer::new(
        state(&Consumer::VIOLATIONS),
        params,
        &spec.demand,
        config.energy_unit_conversion,
    )?))
}
