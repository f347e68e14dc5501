//! Pipe edge with a plug-flow (Lagrangian) transport model.
//!
//! The pipe is always full. Each step the inlet pushes one plug of
//! `mass_flow * interval` kg in at the front of the queue and the same mass
//! leaves at the back, split off the oldest plug where needed. A plug's
//! temperature decays toward the ground temperature with its age.

use std::collections::VecDeque;

use hg_components::{Pipe, Plug};
use hg_core::{EdgeId, ObjectId, Series, SlotSeries, ViolationKind, Violations};
use hg_graph::Endpoint;
use hg_results::PlugState;

use crate::config::SimTolerances;
use crate::error::{SimError, SimResult};
use crate::grid::{Grid, Reading, Target};

/// Plugs of a saved pipe state, entry steps shifted so the newest plug
/// entered at step -1.
pub(crate) fn plugs_from_states(states: &[PlugState]) -> SimResult<Vec<Plug>> {
    let newest = states.first().ok_or(SimError::InvalidArg {
        what: "pipe state has no plugs",
    })?;
    let shift = newest.entry_step;
    Ok(states
        .iter()
        .map(|s| {
            let entry_step = s.entry_step - shift - 1;
            Plug::new(s.mass, entry_step, s.entry_temp, entry_step as f64)
        })
        .collect())
}

/// Water leaving an edge, outlet-most first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BundleEntry {
    pub temp: f64,
    /// kg, unbounded for the fresh inflow closing a bundle
    pub mass: f64,
    pub entry_step_global: f64,
}

/// Aggregate of the mass pushed out during one step.
#[derive(Debug)]
struct Outflow {
    temp: f64,
    entry_step_global: f64,
    delay_row: Vec<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct Edge {
    pub id: EdgeId,
    pub object: ObjectId,
    pub inlet: Endpoint,
    pub outlet: Endpoint,
    pub pipe: Pipe,
    /// kg
    pub pipe_mass: f64,
    interval_s: f64,
    energy_unit: f64,
    tolerances: SimTolerances,

    initial_plugs: Vec<Plug>,
    /// Front is the inlet end.
    plugs: VecDeque<Plug>,
    /// Queue contents at the start of every step, newest first.
    snapshots: Vec<Vec<Plug>>,
    /// Distinct entry steps of the initial plugs, ascending.
    history_steps: Vec<i64>,

    /// 0 inlet, 1 outlet (estimate until pushed)
    pub temp: SlotSeries,
    pub actual_outlet_temp: Series,
    pub mass_flow: SlotSeries,
    pub pressure: SlotSeries,
    /// m/s
    pub flow_speed: Series,
    /// Energy lost to the ground during each step, energy units
    pub heat_loss: Series,
    /// Energy held in the pipe after each push, energy units
    pub heat_in_pipe: Series,
    pub outlet_entry_step_global: Series,
    /// `delay_matrix[step][column]` is the share of the step's outflow that
    /// entered in that column's step; columns cover the initial plugs and
    /// then every step of the horizon.
    pub delay_matrix: Vec<Vec<f64>>,
    pub violations: Violations,
}

impl Edge {
    pub(crate) fn new(
        id: EdgeId,
        object: ObjectId,
        inlet: Endpoint,
        outlet: Endpoint,
        pipe: Pipe,
        initial_plugs: Vec<Plug>,
        config: &crate::config::SimConfig,
    ) -> SimResult<Self> {
        pipe.validate()?;
        let steps = config.horizon;
        let pipe_mass = pipe.water_mass().value;
        let mut edge = Self {
            id,
            object,
            inlet,
            outlet,
            pipe,
            pipe_mass,
            interval_s: config.interval_s,
            energy_unit: config.energy_unit_conversion,
            tolerances: config.tolerances,
            initial_plugs: Vec::new(),
            plugs: VecDeque::new(),
            snapshots: Vec::new(),
            history_steps: Vec::new(),
            temp: SlotSeries::unknown(2, steps),
            actual_outlet_temp: Series::unknown(steps),
            mass_flow: SlotSeries::unknown(2, steps),
            pressure: SlotSeries::unknown(2, steps),
            flow_speed: Series::unknown(steps),
            heat_loss: Series::filled(steps, 0.0),
            heat_in_pipe: Series::filled(steps, 0.0),
            outlet_entry_step_global: Series::unknown(steps),
            delay_matrix: Vec::new(),
            violations: Violations::new(steps, &[ViolationKind::FlowSpeed]),
        };
        edge.install_plugs(initial_plugs)?;
        edge.clear();
        Ok(edge)
    }

    /// Plugs filling the whole pipe with water of one temperature.
    pub(crate) fn uniform_fill(pipe: &Pipe, temp: f64) -> Vec<Plug> {
        vec![Plug::new(pipe.water_mass().value, -1, temp, -1.0)]
    }

    fn install_plugs(&mut self, plugs: Vec<Plug>) -> SimResult<()> {
        if plugs.is_empty() {
            return Err(SimError::InvalidArg {
                what: "a pipe needs at least one initial plug",
            });
        }
        if plugs
            .iter()
            .any(|p| !(p.mass.is_finite() && p.mass > 0.0 && p.entry_temp.is_finite()))
        {
            return Err(SimError::InvalidArg {
                what: "initial plugs need a positive mass and a finite temperature",
            });
        }
        let total: f64 = plugs.iter().map(|p| p.mass).sum();
        if (total - self.pipe_mass).abs() > self.tolerances.plug_mass * self.pipe_mass {
            return Err(SimError::InvalidArg {
                what: "initial plug masses must add up to the pipe mass",
            });
        }
        let mut steps: Vec<i64> = plugs.iter().map(|p| p.entry_step).collect();
        steps.sort_unstable();
        steps.dedup();
        self.history_steps = steps;
        self.initial_plugs = plugs;
        Ok(())
    }

    /// Replace the initial plugs with a saved state, newest first.
    ///
    /// The edge must be cleared afterwards.
    pub(crate) fn set_initial_plugs(&mut self, states: &[PlugState]) -> SimResult<()> {
        self.install_plugs(plugs_from_states(states)?)
    }

    pub(crate) fn initial_plugs(&self) -> &[Plug] {
        &self.initial_plugs
    }

    /// Restore the initial plugs and forget every per-step value.
    pub(crate) fn clear(&mut self) {
        let steps = self.temp.steps();
        self.plugs = self.initial_plugs.iter().copied().collect();
        self.snapshots = vec![self.initial_plugs.clone()];
        self.temp.fill(f64::NAN);
        self.actual_outlet_temp.fill(f64::NAN);
        self.mass_flow.fill(f64::NAN);
        self.pressure.fill(f64::NAN);
        self.flow_speed.fill(f64::NAN);
        self.heat_loss.fill(0.0);
        self.heat_in_pipe.fill(0.0);
        self.outlet_entry_step_global.fill(f64::NAN);
        self.delay_matrix = vec![vec![0.0; self.history_steps.len() + steps]; steps];
        self.violations.clear();
    }

    fn plug_temp(&self, plug: &Plug, step: usize) -> f64 {
        self.pipe
            .decayed_temp(plug.entry_temp, plug.age(step), self.interval_s)
    }

    fn previous_inflow(&self, step: usize) -> Option<f64> {
        step.checked_sub(1)
            .and_then(|prev| self.mass_flow.known(0, prev))
    }

    fn delay_column(&self, entry_step: i64) -> usize {
        if entry_step < 0 {
            self.history_steps
                .binary_search(&entry_step)
                .unwrap_or_else(|i| i)
        } else {
            self.history_steps.len() + entry_step as usize
        }
    }

    /// Outlet temperature for the current step.
    ///
    /// Until the edge has been pushed this is an estimate assuming the
    /// previous step's flow; the estimate is cached.
    pub(crate) fn outlet_temp(&mut self, grid: &mut Grid) -> SimResult<Reading> {
        let step = grid.step;
        if let Some(temp) = self.temp.known(1, step) {
            return Ok(Reading {
                temp,
                entry_step_global: self.outlet_entry_step_global.get(step),
            });
        }

        let previous = self.previous_inflow(step);
        let expected = previous.map_or(0.0, |m| m * self.interval_s);
        let mut fulfilled = 0.0;
        let mut temp = 0.0;
        let mut esg = 0.0;
        for plug in self.plugs.iter().rev() {
            let t = self.plug_temp(plug, step);
            if expected <= 0.0 {
                temp = t;
                esg = plug.entry_step_global;
                break;
            }
            let consumed = plug.mass.min(expected - fulfilled);
            fulfilled += consumed;
            temp += t * consumed / expected;
            esg += plug.entry_step_global * consumed / expected;
            if fulfilled >= expected {
                break;
            }
        }
        if expected > 0.0 && fulfilled < expected {
            let inlet = grid.node_outlet_temp(self.inlet, previous)?;
            let share = (expected - fulfilled) / expected;
            temp += inlet.temp * share;
            esg += inlet.entry_step_global * share;
        }

        self.temp.set(1, step, temp);
        self.outlet_entry_step_global.set(step, esg);
        Ok(Reading {
            temp,
            entry_step_global: esg,
        })
    }

    /// Exact decomposition of what will leave the edge, outlet end first,
    /// closed by an unbounded entry of fresh water from the inlet node.
    pub(crate) fn outlet_bundle(&mut self, grid: &mut Grid) -> SimResult<Vec<BundleEntry>> {
        let step = grid.step;
        let mut bundle: Vec<BundleEntry> = self
            .plugs
            .iter()
            .rev()
            .map(|p| BundleEntry {
                temp: self.plug_temp(p, step),
                mass: p.mass,
                entry_step_global: p.entry_step_global,
            })
            .collect();
        let inlet = grid.node_outlet_temp(self.inlet, self.previous_inflow(step))?;
        bundle.push(BundleEntry {
            temp: inlet.temp,
            mass: f64::INFINITY,
            entry_step_global: inlet.entry_step_global,
        });
        Ok(bundle)
    }

    /// Heat lost during this step and heat held before the push, energy units.
    fn account_heat(&mut self, step: usize) {
        let cp = self.pipe.heat_capacity.value;
        let mut loss = 0.0;
        let mut held = 0.0;
        for plug in &self.plugs {
            let age = plug.age(step);
            loss += self
                .pipe
                .step_heat_loss(plug.entry_temp, plug.mass, age, self.interval_s);
            held += self.plug_temp(plug, step) * plug.mass * cp;
        }
        self.heat_loss.set(step, loss / self.energy_unit);
        self.heat_in_pipe.set(step, held / self.energy_unit);
    }

    /// Remove `mass` kg from the outlet end.
    fn push_out(&mut self, mass: f64, step: usize) -> SimResult<Outflow> {
        let cp = self.pipe.heat_capacity.value;
        let mut out = Outflow {
            temp: 0.0,
            entry_step_global: 0.0,
            delay_row: vec![0.0; self.history_steps.len() + self.temp.steps()],
        };

        if mass <= 0.0 {
            if let Some(plug) = self.plugs.back() {
                out.temp = self.plug_temp(plug, step);
                out.entry_step_global = plug.entry_step_global;
            }
            return Ok(out);
        }

        let mut fulfilled = 0.0;
        while fulfilled < mass {
            let remaining = mass - fulfilled;
            let part = match self.plugs.back_mut() {
                None => {
                    return Err(SimError::PlugUnderflow {
                        edge: self.object,
                        step,
                        missing: remaining,
                    });
                }
                Some(back) if back.mass > remaining => {
                    fulfilled = mass;
                    back.take(remaining)
                }
                Some(back) => {
                    let whole = *back;
                    self.plugs.pop_back();
                    fulfilled += whole.mass;
                    whole
                }
            };
            let weight = part.mass / mass;
            let t = self.plug_temp(&part, step);
            let column = self.delay_column(part.entry_step);
            out.delay_row[column] += weight;
            out.temp += t * weight;
            out.entry_step_global += part.entry_step_global * weight;
            let held = self.heat_in_pipe.get(step) - part.mass * t * cp / self.energy_unit;
            self.heat_in_pipe.set(step, held);
        }
        Ok(out)
    }

    /// Push `mass_flow` through the edge for the current step.
    ///
    /// `slot` tells which end the push came from: 1 when the outlet node
    /// pulled it (the inlet node is scheduled next), 0 when the inlet node
    /// sent it (the outlet node is scheduled next).
    pub(crate) fn set_mass_flow(
        &mut self,
        slot: usize,
        mass_flow: f64,
        grid: &mut Grid,
    ) -> SimResult<()> {
        if slot > 1 {
            return Err(SimError::InvalidArg {
                what: "edges only have slots 0 and 1",
            });
        }
        if !(mass_flow.is_finite() && mass_flow >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "edge mass flow must be finite and non-negative",
            });
        }
        let step = grid.step;

        self.account_heat(step);
        let speed = self.pipe.flow_speed(mass_flow);
        self.flow_speed.set(step, speed);
        self.violations.record(
            ViolationKind::FlowSpeed,
            step,
            self.pipe.flow_speed_violation(speed),
        );

        let mass = mass_flow * self.interval_s;
        let entry = grid.node_outlet_temp(self.inlet, Some(mass_flow))?;
        if mass > 0.0 {
            self.plugs.push_front(Plug::new(
                mass,
                step as i64,
                entry.temp,
                entry.entry_step_global,
            ));
            let held = self.heat_in_pipe.get(step)
                + mass * entry.temp * self.pipe.heat_capacity.value / self.energy_unit;
            self.heat_in_pipe.set(step, held);
        }

        let out = self.push_out(mass, step)?;
        self.actual_outlet_temp.set(step, out.temp);
        self.delay_matrix[step] = out.delay_row;

        if slot == 1 {
            grid.schedule(Target::Node(self.inlet.node), self.inlet.slot, mass_flow);
            if !self.temp.is_known(1, step) {
                self.temp.set(1, step, out.temp);
                self.outlet_entry_step_global
                    .set(step, out.entry_step_global);
            }
        } else {
            grid.schedule(Target::Node(self.outlet.node), self.outlet.slot, mass_flow);
            self.temp.set(1, step, out.temp);
            self.outlet_entry_step_global
                .set(step, out.entry_step_global);
        }

        self.mass_flow.set_all_slots(step, mass_flow);
        self.temp.set(0, step, entry.temp);
        self.snapshots.push(self.plugs.iter().copied().collect());

        self.settle_pressure(mass_flow, grid)
    }

    fn settle_pressure(&mut self, mass_flow: f64, grid: &Grid) -> SimResult<()> {
        let step = grid.step;
        let drop = self.pipe.pressure_drop(mass_flow);
        let p_in = grid.node_pressure(self.inlet)?;
        let p_out = grid.node_pressure(self.outlet)?;
        let (p_in, p_out) = match (p_in, p_out) {
            (Some(p_in), Some(p_out)) => {
                let actual = p_in - p_out;
                if (actual - drop).abs() > self.tolerances.pressure {
                    return Err(SimError::PressureMismatch {
                        edge: self.object,
                        step,
                        expected: drop,
                        actual,
                    });
                }
                (p_in, p_out)
            }
            (Some(p_in), None) => (p_in, p_in - drop),
            (None, Some(p_out)) => (p_out + drop, p_out),
            (None, None) => {
                return Err(SimError::NotYetWritten {
                    object: self.object,
                    what: "pressure at either end",
                    slot: 0,
                    step,
                });
            }
        };
        self.pressure.set(0, step, p_in);
        self.pressure.set(1, step, p_out);
        Ok(())
    }

    /// Queue contents at the start of `time`, newest first.
    pub(crate) fn plug_conditions(&self, time: usize) -> SimResult<Vec<PlugState>> {
        let plugs = self.snapshots.get(time).ok_or(SimError::InvalidArg {
            what: "no pipe state recorded for that step",
        })?;
        Ok(plugs
            .iter()
            .map(|p| PlugState {
                mass: p.mass,
                temp: self.pipe.decayed_temp(
                    p.entry_temp,
                    time as i64 - p.entry_step - 1,
                    self.interval_s,
                ),
                entry_temp: p.entry_temp,
                entry_step: p.entry_step,
            })
            .collect())
    }

    /// Number of steps whose plug state can be queried.
    pub(crate) fn recorded_steps(&self) -> usize {
        self.snapshots.len()
    }

    /// `steps x steps` retention factors: cell `(i, j)` is the share of the
    /// excess over ground temperature kept by water that entered at step `j`
    /// and left at step `i`, 0 where no such water left.
    pub(crate) fn delay_loss_matrix(&self) -> Vec<Vec<f64>> {
        let tau = self.pipe.thermal_time_constant();
        let history = self.history_steps.len();
        let steps = self.temp.steps();
        self.delay_matrix
            .iter()
            .enumerate()
            .map(|(i, row)| {
                (0..steps)
                    .map(|j| {
                        if row[history + j] > 0.0 {
                            let lag = i as f64 - j as f64;
                            (-lag * self.interval_s / tau).exp()
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Total plug mass currently in the pipe.
    pub(crate) fn plug_mass(&self) -> f64 {
        self.plugs.iter().map(|p| p.mass).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ConsumerSpec, NetworkBuilder, PipeSpec, ProducerSpec};
    use crate::config::SimConfig;
    use crate::network::{Network, StepControl};
    use hg_components::HeatExchanger;
    use hg_core::units::{kgps, m, m2};
    use proptest::prelude::*;

    fn pipe() -> PipeSpec {
        PipeSpec::new(m(0.3), m(2000.0), 1.36, 90.0)
    }

    fn network(demand: Vec<f64>) -> Network {
        let config = SimConfig {
            interval_s: 600.0,
            horizon: demand.len(),
            ..SimConfig::default()
        };
        let mut b = NetworkBuilder::new(config);
        let plant = b.add_producer("plant", ProducerSpec::temperature_controlled());
        let house = b.add_consumer(
            "house",
            ConsumerSpec::new(demand)
                .with_heat_exchanger(HeatExchanger::new(kgps(300.0), m2(400.0), 207.15)),
        );
        b.add_pipe("supply", (plant, 1), (house, 0), pipe());
        let mut ret = pipe();
        ret.fill = crate::builder::PipeFill::Uniform(50.0);
        b.add_pipe("return", (house, 1), (plant, 0), ret);
        b.build().unwrap()
    }

    fn edges(network: &Network) -> Vec<&Edge> {
        network.grid.edges.iter().collect()
    }

    #[test]
    fn saved_states_are_shifted_to_end_before_step_zero() {
        let states = [
            PlugState {
                mass: 10.0,
                temp: 80.0,
                entry_temp: 81.0,
                entry_step: 7,
            },
            PlugState {
                mass: 20.0,
                temp: 70.0,
                entry_temp: 75.0,
                entry_step: 5,
            },
        ];
        let plugs = plugs_from_states(&states).unwrap();
        assert_eq!(plugs[0].entry_step, -1);
        assert_eq!(plugs[1].entry_step, -3);
        assert_eq!(plugs[1].entry_temp, 75.0);
        assert_eq!(plugs[1].entry_step_global, -3.0);
        assert!(plugs_from_states(&[]).is_err());
    }

    #[test]
    fn initial_plugs_must_fill_the_pipe() {
        let spec = pipe();
        let config = SimConfig::default();
        let at = Endpoint::new(hg_core::Id::from_index(0), 0);
        let half = vec![Plug::new(spec.pipe.water_mass().value / 2.0, -1, 90.0, -1.0)];
        let edge = Edge::new(
            hg_core::Id::from_index(0),
            hg_core::Id::from_index(0),
            at,
            at,
            spec.pipe.clone(),
            half,
            &config,
        );
        assert!(matches!(edge, Err(SimError::InvalidArg { .. })));

        let full = Edge::uniform_fill(&spec.pipe, 90.0);
        let edge = Edge::new(
            hg_core::Id::from_index(0),
            hg_core::Id::from_index(0),
            at,
            at,
            spec.pipe,
            full,
            &config,
        )
        .unwrap();
        assert_eq!(edge.recorded_steps(), 1);
        assert!((edge.plug_mass() - edge.pipe_mass).abs() < 1e-9);
    }

    #[test]
    fn pushes_record_loss_delay_and_pressure() {
        let mut net = network(vec![10.0; 6]);
        for _ in 0..6 {
            net.solve_one_step(StepControl::Temp(vec![90.0])).unwrap();
        }
        for edge in edges(&net) {
            assert_eq!(edge.recorded_steps(), 7);
            for step in 0..6 {
                assert!(edge.heat_loss.get(step) > 0.0);
                assert!(edge.mass_flow.get(0, step) > 0.0);
                let drop = edge.pressure.get(0, step) - edge.pressure.get(1, step);
                let expected = edge.pipe.pressure_drop(edge.mass_flow.get(0, step));
                assert!((drop - expected).abs() < 1e-6);
                let row: f64 = edge.delay_matrix[step].iter().sum();
                assert!((row - 1.0).abs() < 1e-9, "row {step} sums to {row}");
            }
            for row in edge.delay_loss_matrix() {
                assert!(row.iter().all(|&f| (0.0..=1.0).contains(&f)));
            }
        }
        let supply = edges(&net)[0];
        assert_eq!(supply.temp.get(0, 5), 90.0);
        assert!(supply.temp.get(1, 5) < 90.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn every_push_conserves_pipe_mass(
            demand in prop::collection::vec(1.0f64..20.0, 4..10),
        ) {
            let steps = demand.len();
            let mut net = network(demand);
            for _ in 0..steps {
                net.solve_one_step(StepControl::Temp(vec![90.0])).unwrap();
                for edge in edges(&net) {
                    let rel = (edge.plug_mass() - edge.pipe_mass).abs() / edge.pipe_mass;
                    prop_assert!(rel < 1e-9, "edge {} off by {rel}", edge.object);
                }
            }
        }
    }
}
