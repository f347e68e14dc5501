//! Heat consumer: a substation heat exchanger with fixed secondary temperatures.

use hg_components::HeatExchanger;
use hg_core::{Series, ViolationKind, weighted_mean};

use super::{NodeModel, NodeState};
use crate::edge::BundleEntry;
use crate::error::{SimError, SimResult};
use crate::grid::{Grid, Reading, Target};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConsumerParams {
    pub hx: HeatExchanger,
    /// Floor of the minimum primary supply temperature, °C
    pub min_supply_temp: f64,
    /// Pressure on the primary supply side, Pa
    pub pressure_load: f64,
    pub setpoint_t_supply_s: f64,
    pub t_return_s: f64,
}

/// Mass drawn from one bundle entry together with its exchanger solution.
struct Draw {
    mass: f64,
    t_supply_p: f64,
    t_return_p: f64,
    t_supply_s: f64,
    entry_step_global: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Consumer {
    pub state: NodeState,
    pub params: ConsumerParams,
    /// Energy units
    pub demand: Series,
    /// Lowest primary supply temperature that meets the demand, °C
    pub min_t_supply_p: Series,
    /// Delivered heat, energy units
    pub heat: Series,
    /// Delivered heat, W
    pub heat_w: Series,
    pub alpha: Series,
    /// Secondary supply temperature, °C
    pub sec_supply_temp: Series,
    /// Steps between leaving the producer and arriving here
    pub real_time_delay: Series,
    conversion: f64,
}

impl Consumer {
    pub(crate) const VIOLATIONS: [ViolationKind; 2] =
        [ViolationKind::SupplyTemp, ViolationKind::HeatDelivered];

    pub(crate) fn new(
        state: NodeState,
        params: ConsumerParams,
        demand: &[f64],
        conversion: f64,
    ) -> SimResult<Self> {
        let steps = state.steps();
        let mut consumer = Self {
            state,
            params,
            demand: Series::unknown(steps),
            min_t_supply_p: Series::unknown(steps),
            heat: Series::unknown(steps),
            heat_w: Series::unknown(steps),
            alpha: Series::unknown(steps),
            sec_supply_temp: Series::unknown(steps),
            real_time_delay: Series::unknown(steps),
            conversion,
        };
        consumer.update_demand(demand)?;
        consumer.clear();
        Ok(consumer)
    }

    fn secondary_flow(&self, demand_w: f64) -> f64 {
        let p = &self.params;
        demand_w / (p.hx.heat_capacity.value * (p.setpoint_t_supply_s - p.t_return_s))
    }

    /// Replace the demand series and recompute the minimum supply temperatures.
    pub(crate) fn update_demand(&mut self, demand: &[f64]) -> SimResult<()> {
        if demand.len() != self.demand.len() {
            return Err(SimError::InvalidArg {
                what: "demand series must cover the whole horizon",
            });
        }
        if demand.iter().any(|d| !(d.is_finite() && *d >= 0.0)) {
            return Err(SimError::InvalidArg {
                what: "demand must be finite and non-negative",
            });
        }
        let floor = self.params.min_supply_temp;
        for (step, &d) in demand.iter().enumerate() {
            let demand_w = d * self.conversion;
            let min_t = if demand_w < self.params.hx.tolerances.trivial_heat {
                floor
            } else {
                let t = self.params.hx.minimum_t_supply_p(
                    demand_w,
                    self.params.setpoint_t_supply_s,
                    self.params.hx.max_mass_flow_p.value,
                    self.secondary_flow(demand_w),
                    Some(d),
                )?;
                if t.is_finite() { t.max(floor) } else { floor }
            };
            self.demand.set(step, d);
            self.min_t_supply_p.set(step, min_t);
        }
        Ok(())
    }

    /// Draw one interval of primary flow from the bundle, entry by entry.
    fn draw(
        &self,
        bundle: &[BundleEntry],
        mass_flow_s: f64,
        demand: f64,
        interval: f64,
        min_t: f64,
    ) -> SimResult<(Vec<Draw>, f64)> {
        let p = &self.params;
        let mut draws = Vec::new();
        let mut shortfall = 0.0_f64;
        let mut elapsed = 0.0;
        for entry in bundle {
            if entry.temp < min_t {
                shortfall = shortfall.min(entry.temp - min_t);
            }
            let sol = p.hx.solve(
                entry.temp,
                p.setpoint_t_supply_s,
                p.t_return_s,
                mass_flow_s,
                Some(demand),
            )?;
            let duration = entry.mass / sol.mass_flow_p;
            let fits = duration + elapsed < interval;
            let mass = if fits {
                elapsed += duration;
                entry.mass
            } else {
                sol.mass_flow_p * (interval - elapsed)
            };
            draws.push(Draw {
                mass,
                t_supply_p: entry.temp,
                t_return_p: sol.t_return_p,
                t_supply_s: sol.t_supply_s,
                entry_step_global: entry.entry_step_global,
            });
            if !fits {
                break;
            }
        }
        Ok((draws, shortfall))
    }

    /// Unmet demand (MWh when reporting in MW) over steps `0..=up_to_step`,
    /// skipping steps that were not solved.
    pub(crate) fn unfulfilled_demand(&self, up_to_step: Option<usize>, interval: f64) -> f64 {
        let last = up_to_step.map_or(self.demand.len(), |s| s + 1);
        let missing: f64 = (0..last.min(self.demand.len()))
            .filter_map(|step| {
                self.heat
                    .known(step)
                    .map(|q| self.demand.get(step) - q)
            })
            .sum();
        missing * interval / 3600.0
    }

    /// Positive shortfall of delivered heat in `step`, ignoring shortfalls below `dead_band`.
    pub(crate) fn heat_shortfall(&self, step: usize, dead_band: f64) -> f64 {
        let missing = (self.demand.get(step) - self.heat.get(step)).max(0.0);
        if missing < dead_band { 0.0 } else { missing }
    }
}

impl NodeModel for Consumer {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn outlet_temp(
        &mut self,
        slot: usize,
        _flow_hint: Option<f64>,
        grid: &mut Grid,
    ) -> SimResult<Reading> {
        if slot != 1 {
            return Err(SimError::InvalidArg {
                what: "consumers only send water out of slot 1",
            });
        }
        let step = grid.step;
        Ok(Reading {
            temp: self.state.require_temp(1, step)?,
            entry_step_global: self.state.entry_step_global.get(step),
        })
    }

    fn set_mass_flow(&mut self, _slot: usize, _mass_flow: f64, _grid: &mut Grid) -> SimResult<()> {
        Err(SimError::InvalidArg {
            what: "consumers set their own mass flow",
        })
    }

    fn solve(&mut self, grid: &mut Grid) -> SimResult<()> {
        let step = grid.step;
        let interval = grid.interval();
        let tolerances = grid.config.tolerances;
        let cp = self.params.hx.heat_capacity.value;

        let demand = self
            .demand
            .known(step)
            .ok_or_else(|| self.state.unwritten("demand", 0, step))?;
        let mass_flow_s = self.secondary_flow(demand * self.conversion);
        let supply_edge = self.state.edge(0)?;
        let return_edge = self.state.edge(1)?;

        let bundle = grid.edge_bundle(supply_edge)?;
        let min_t = self.min_t_supply_p.get(step);
        let (draws, shortfall) = self.draw(&bundle, mass_flow_s, demand, interval, min_t)?;

        let consumed: f64 = draws.iter().map(|d| d.mass).sum();
        let avg = |f: fn(&Draw) -> f64| {
            weighted_mean(draws.iter().map(|d| (f(d), d.mass)))
                .or_else(|| draws.first().map(f))
                .unwrap_or(f64::NAN)
        };
        let t_supply_p = avg(|d| d.t_supply_p);
        let mut t_return_p = avg(|d| d.t_return_p);
        let t_supply_s = avg(|d| d.t_supply_s);
        let entry_step_global = avg(|d| d.entry_step_global);
        let mut mass_flow_p = consumed / interval;

        if mass_flow_p < tolerances.zero_flow && t_supply_p <= self.params.t_return_s {
            mass_flow_p = self.params.hx.max_mass_flow_p.value;
            t_return_p = t_supply_p;
        }

        self.state.mass_flow.set_all_slots(step, mass_flow_p);
        self.state.temp.set(0, step, t_supply_p);
        self.state.temp.set(1, step, t_return_p);
        let heat_w = mass_flow_p * (t_supply_p - t_return_p) * cp;
        let heat = heat_w / self.conversion;
        self.heat_w.set(step, heat_w);
        self.heat.set(step, heat);
        self.sec_supply_temp.set(step, t_supply_s);
        self.alpha.set(
            step,
            (t_return_p - self.params.t_return_s) / (t_supply_p - self.params.t_return_s),
        );
        self.state.entry_step_global.set(step, entry_step_global);
        self.real_time_delay
            .set(step, step as f64 - entry_step_global);

        let delivered = heat - demand;
        let violations = &mut self.state.violations;
        violations.record(ViolationKind::SupplyTemp, step, shortfall);
        violations.record(
            ViolationKind::HeatDelivered,
            step,
            if delivered.abs() < tolerances.heat_delivered {
                0.0
            } else {
                delivered
            },
        );

        grid.schedule(Target::Edge(supply_edge), 1, mass_flow_p);
        grid.schedule(Target::Edge(return_edge), 0, mass_flow_p);
        Ok(())
    }

    fn clear(&mut self) {
        self.state.clear();
        self.state.pressure.fill_slot(0, self.params.pressure_load);
        self.state.pressure.fill_slot(1, 0.0);
        for s in [
            &mut self.heat,
            &mut self.heat_w,
            &mut self.alpha,
            &mut self.sec_supply_temp,
            &mut self.real_time_delay,
        ] {
            s.fill(f64::NAN);
        }
    }
}
