//! Read-only views over a (partially) solved network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hg_core::{ObjectId, ViolationKind, Violations};
use hg_graph::{Handle, Side};
use hg_results::{
    Aggregate, HeatAndLoss, HeatLossLevel, HeatLossReport, MarginLevel, MarginReport,
    ObjectStatus, PipeStates, StatusFlags, TimeAggregation,
};

use crate::error::{SimError, SimResult};
use crate::network::Network;
use crate::node::{Consumer, Node};

/// Violations of the last solved step, one entry per object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionViolations {
    /// Demand not delivered, energy units; shortfalls below `SimTolerances::unmet_heat` count as 0
    pub consumers: BTreeMap<ObjectId, f64>,
    /// Supply temperature above the plant's bound, K
    pub producers: BTreeMap<ObjectId, f64>,
    /// Flow speed above the pipe's limit, m/s
    pub edges: BTreeMap<ObjectId, f64>,
}

impl ConditionViolations {
    pub fn is_empty(&self) -> bool {
        self.consumers
            .values()
            .chain(self.producers.values())
            .chain(self.edges.values())
            .all(|&v| v == 0.0)
    }
}

fn violation_window(
    violations: &Violations,
    start: usize,
    end: usize,
) -> BTreeMap<ViolationKind, Vec<f64>> {
    violations
        .iter()
        .map(|(kind, series)| (kind, series.window(start, end).to_vec()))
        .collect()
}

impl Network {
    /// The step whose values the "last step" queries report.
    fn last_solved(&self) -> SimResult<usize> {
        self.grid.step.checked_sub(1).ok_or(SimError::InvalidArg {
            what: "no step has been solved yet",
        })
    }

    /// Per-slot arrays of each object over `[start, end)`.
    ///
    /// `ids` defaults to every node and edge, `end` to the current step.
    pub fn get_object_status(
        &self,
        ids: Option<&[ObjectId]>,
        start: usize,
        end: Option<usize>,
        flags: StatusFlags,
    ) -> SimResult<BTreeMap<ObjectId, ObjectStatus>> {
        let end = end.unwrap_or(self.grid.step);
        let ids = ids.unwrap_or(self.index.objects());
        let mut out = BTreeMap::new();
        for &object in ids {
            let (temp, mass_flow, pressure, violations) = match self.index.handle(object) {
                Some(Handle::Node(id)) => {
                    let s = self.node(id)?.state();
                    (&s.temp, &s.mass_flow, &s.pressure, &s.violations)
                }
                Some(Handle::Edge(id)) => {
                    let e = self.grid.edges.get(id)?;
                    (&e.temp, &e.mass_flow, &e.pressure, &e.violations)
                }
                None => return Err(SimError::UnknownObject { object }),
            };
            let mut status = ObjectStatus::default();
            if flags.temp {
                status.temp = temp.window(start, end);
            }
            if flags.mass_flow {
                status.mass_flow = mass_flow.window(start, end);
            }
            if flags.pressure {
                status.pressure = pressure.window(start, end);
            }
            if flags.violation {
                status.violation = violation_window(violations, start, end);
            }
            out.insert(object, status);
        }
        Ok(out)
    }

    /// Plug contents of every pipe at the start of `time`.
    pub fn get_pipe_states(&self, time: usize) -> SimResult<PipeStates> {
        let mut pipes = BTreeMap::new();
        for edge in self.grid.edges.iter() {
            pipes.insert(edge.object, edge.plug_conditions(time)?);
        }
        Ok(PipeStates { step: time, pipes })
    }

    /// Heat carried in the pipes and heat lost to the ground.
    pub fn get_edge_heat_and_loss(
        &self,
        ids: Option<&[ObjectId]>,
        level: HeatLossLevel,
        time: TimeAggregation,
    ) -> SimResult<HeatLossReport> {
        let current = self.grid.step;
        let mut per_edge = BTreeMap::new();
        let mut sides = BTreeMap::new();
        for edge in self.grid.edges.iter() {
            if ids.is_some_and(|ids| !ids.contains(&edge.object)) {
                continue;
            }
            per_edge.insert(
                edge.object,
                HeatAndLoss {
                    heat: Aggregate::from_steps(edge.heat_in_pipe.values(), current, time),
                    loss: Aggregate::from_steps(edge.heat_loss.values(), current, time),
                },
            );
            sides.insert(edge.object, self.topology.side(edge.id));
        }
        if level == HeatLossLevel::PerEdge {
            return Ok(HeatLossReport::PerEdge(per_edge));
        }

        let zero = Aggregate::zero(time, current);
        let empty = HeatAndLoss {
            heat: zero.clone(),
            loss: zero,
        };
        let mut supply = empty.clone();
        let mut return_ = empty.clone();
        for (object, hl) in &per_edge {
            match sides.get(object).copied().flatten() {
                Some(Side::Supply) => supply.accumulate(hl),
                Some(Side::Return) => return_.accumulate(hl),
                None => {}
            }
        }
        Ok(match level {
            HeatLossLevel::SupplyReturn => HeatLossReport::SupplyReturn { supply, return_ },
            _ => {
                let mut grid = empty;
                grid.accumulate(&supply);
                grid.accumulate(&return_);
                HeatLossReport::Grid(grid)
            }
        })
    }

    /// Producer costs and profits; `ids` defaults to every producer.
    pub fn get_detailed_margin(
        &self,
        ids: Option<&[ObjectId]>,
        level: MarginLevel,
        time: TimeAggregation,
    ) -> SimResult<MarginReport> {
        let current = self.grid.step;
        let mut margins = BTreeMap::new();
        for &id in &self.producers {
            let Node::Producer(p) = self.node(id)? else {
                continue;
            };
            let object = p.state.object;
            if ids.is_some_and(|ids| !ids.contains(&object)) {
                continue;
            }
            margins.insert(object, p.margin(time, current));
        }
        Ok(MarginReport::build(
            margins,
            level,
            &Aggregate::zero(time, current),
        ))
    }

    /// Type name of every object; pipes are reported as "Edge".
    pub fn get_id_name_all_obj(&self) -> SimResult<BTreeMap<ObjectId, &'static str>> {
        let mut out = BTreeMap::new();
        for node in self.grid.nodes.iter() {
            out.insert(node.object(), node.type_name());
        }
        for edge in self.grid.edges.iter() {
            out.insert(edge.object, "Edge");
        }
        Ok(out)
    }

    fn consumer_series(
        &self,
        pick: impl Fn(&Consumer) -> Vec<f64>,
    ) -> SimResult<BTreeMap<ObjectId, Vec<f64>>> {
        let mut out = BTreeMap::new();
        for &id in &self.consumers {
            if let Node::Consumer(c) = self.node(id)? {
                out.insert(c.state.object, pick(c));
            }
        }
        Ok(out)
    }

    /// Heat delivered at each consumer per step, energy units.
    pub fn get_actual_delivered_heat(&self) -> SimResult<BTreeMap<ObjectId, Vec<f64>>> {
        self.consumer_series(|c| c.heat.values().to_vec())
    }

    /// Secondary supply temperature reached at each consumer per step, °C.
    pub fn get_sec_supply_in_temp(&self) -> SimResult<BTreeMap<ObjectId, Vec<f64>>> {
        self.consumer_series(|c| c.sec_supply_temp.values().to_vec())
    }

    /// Demand not delivered over steps `0..=up_to_step`, summed over consumers,
    /// in energy units times hours.
    pub fn unfulfilled_demand(&self, up_to_step: Option<usize>) -> SimResult<f64> {
        let interval = self.grid.interval();
        let mut total = 0.0;
        for &id in &self.consumers {
            if let Node::Consumer(c) = self.node(id)? {
                total += c.unfulfilled_demand(up_to_step, interval);
            }
        }
        Ok(total)
    }

    /// Consumer shortfall, producer overheat and pipe overspeed of the last solved step.
    pub fn condition_violation_one_step(&self) -> SimResult<ConditionViolations> {
        let step = self.last_solved()?;
        let dead_band = self.grid.config.tolerances.unmet_heat;
        let mut out = ConditionViolations::default();
        for node in self.grid.nodes.iter() {
            match node {
                Node::Consumer(c) => {
                    out.consumers.insert(c.state.object, c.heat_shortfall(step, dead_band));
                }
                Node::Producer(p) => {
                    out.producers.insert(p.state.object, p.supply_excess(step));
                }
                _ => {}
            }
        }
        for edge in self.grid.edges.iter() {
            let speed = edge
                .violations
                .get(ViolationKind::FlowSpeed)
                .map_or(0.0, |s| s.get(step));
            out.edges.insert(edge.object, speed);
        }
        Ok(out)
    }

    /// Inlet and outlet temperature of every node in the last solved step.
    pub fn temp_at_nodes(&self) -> SimResult<BTreeMap<ObjectId, [f64; 2]>> {
        let step = self.last_solved()?;
        Ok(self
            .grid
            .nodes
            .iter()
            .map(|n| {
                let s = n.state();
                (s.object, [s.temp.get(0, step), s.temp.get(1, step)])
            })
            .collect())
    }

    /// Rows are outflow steps, columns entry steps (history first); each
    /// cell is the share of the row step's outflow that entered in the column step.
    pub fn delay_matrix(&self, edge: ObjectId) -> SimResult<&[Vec<f64>]> {
        let id = self.edge_id(edge)?;
        Ok(&self.grid.edges.get(id)?.delay_matrix)
    }

    /// Share of the excess over ground temperature kept between entry step
    /// `j` and exit step `i`, see [`Network::delay_matrix`].
    pub fn delay_loss_matrix(&self, edge: ObjectId) -> SimResult<Vec<Vec<f64>>> {
        let id = self.edge_id(edge)?;
        Ok(self.grid.edges.get(id)?.delay_loss_matrix())
    }

    /// Plug mass currently held by a pipe, kg.
    pub fn pipe_mass(&self, edge: ObjectId) -> SimResult<f64> {
        let id = self.edge_id(edge)?;
        Ok(self.grid.edges.get(id)?.plug_mass())
    }
}
