//! Heat producer, optionally a combined heat and power plant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use hg_components::{OperationRegion, ramp_excess};
use hg_core::{Series, ViolationKind};
use hg_results::{Aggregate, CostKind, ProducerMargin, TimeAggregation};

use super::{NodeModel, NodeState};
use crate::error::{SimError, SimResult};
use crate::grid::{Grid, Reading};

/// What the operator commands at a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Supply temperature (°C)
    #[default]
    Temperature,
    /// Heat output (energy units)
    Heat,
}

/// Static parameters of a producer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProducerParams {
    pub control: ControlMode,
    /// J/(kg K)
    pub heat_capacity: f64,
    /// kg/m^3
    pub density: f64,
    pub pump_efficiency: f64,
    /// Highest supply temperature the plant can deliver, °C
    pub temp_upper_bound: f64,
}

/// Values of the step before the first one, used for ramp checks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChpHistory {
    /// Energy units
    pub heat: f64,
    /// Energy units
    pub electricity: f64,
    /// °C
    pub temp: f64,
}

/// Combined heat and power extension of a producer.
#[derive(Debug, Clone)]
pub(crate) struct Chp {
    pub region: OperationRegion,
    /// Cost per unit of heat and per unit of electricity
    pub fuel_cost: [f64; 2],
    /// Largest step change as a share of the maximum heat
    pub max_ramp_heat: f64,
    /// Largest step change as a share of the maximum electricity
    pub max_ramp_electricity: f64,
    /// Largest step change in supply temperature, K
    pub max_ramp_temp: f64,
    pub history: Option<ChpHistory>,

    pub electricity: Series,
    pub production_cost: Series,
    pub ramp_cost: Series,
    pub pump_electricity_cost: Series,
    pub cost: Series,
    pub profit: Series,
}

impl Chp {
    pub(crate) const VIOLATIONS: [ViolationKind; 4] = [
        ViolationKind::HeatRamp,
        ViolationKind::ElectricityRamp,
        ViolationKind::TempRamp,
        ViolationKind::OperationRegion,
    ];

    pub(crate) fn new(
        region: OperationRegion,
        fuel_cost: [f64; 2],
        ramps: [f64; 3],
        history: Option<ChpHistory>,
        steps: usize,
    ) -> Self {
        Self {
            region,
            fuel_cost,
            max_ramp_heat: ramps[0],
            max_ramp_electricity: ramps[1],
            max_ramp_temp: ramps[2],
            history,
            electricity: Series::unknown(steps),
            production_cost: Series::unknown(steps),
            ramp_cost: Series::unknown(steps),
            pump_electricity_cost: Series::unknown(steps),
            cost: Series::unknown(steps),
            profit: Series::unknown(steps),
        }
    }

    fn clear(&mut self) {
        for s in [
            &mut self.electricity,
            &mut self.production_cost,
            &mut self.ramp_cost,
            &mut self.pump_electricity_cost,
            &mut self.cost,
            &mut self.profit,
        ] {
            s.fill(f64::NAN);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Producer {
    pub state: NodeState,
    pub params: ProducerParams,
    /// Heat output, energy units
    pub heat: Series,
    /// Heat output, W
    pub heat_w: Series,
    /// Pump power, energy units
    pub pump_power: Series,
    /// Supply temperature the commanded heat would need without the upper bound
    pub virtual_temp_sup: Series,
    /// Electricity price per energy unit
    pub electricity_price: Series,
    /// Initial entry temperature of the supply pipe, used before any flow is known
    pub initial_supply_temp: f64,
    pub chp: Option<Chp>,
}

impl Producer {
    pub(crate) fn new(state: NodeState, params: ProducerParams, chp: Option<Chp>) -> Self {
        let steps = state.steps();
        Self {
            state,
            params,
            heat: Series::unknown(steps),
            heat_w: Series::unknown(steps),
            pump_power: Series::unknown(steps),
            virtual_temp_sup: Series::unknown(steps),
            electricity_price: Series::filled(steps, 0.0),
            initial_supply_temp: f64::NAN,
            chp,
        }
    }

    fn heat_lift(&self, heat_w: f64, mass_flow: f64) -> f64 {
        if heat_w == 0.0 {
            0.0
        } else if mass_flow <= 0.0 {
            f64::INFINITY
        } else {
            heat_w / mass_flow / self.params.heat_capacity
        }
    }

    fn require_heat(&self, step: usize) -> SimResult<f64> {
        self.heat
            .known(step)
            .ok_or_else(|| self.state.unwritten("heat output", 1, step))
    }

    /// Return temperature estimate for the heat-controlled supply temperature.
    fn estimated_return_temp(&self, grid: &mut Grid) -> SimResult<f64> {
        let step = grid.step;
        let return_edge = self.state.edge(0)?;
        match grid.edge_outlet_temp(return_edge) {
            Ok(r) => Ok(r.temp),
            Err(e) if e.is_pending() && step > 0 => {
                warn!(
                    producer = %self.state.object,
                    step,
                    reason = %e,
                    "return temperature not available, using the previous step"
                );
                self.state.require_temp(0, step - 1)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the commanded quantity and derive the other one from the flow.
    fn settle_heat(&mut self, step: usize, mass_flow: f64, conversion: f64) -> SimResult<()> {
        let cp = self.params.heat_capacity;
        let t_return = self.state.require_temp(0, step)?;
        match self.params.control {
            ControlMode::Temperature => {
                let t_supply = self.state.require_temp(1, step)?;
                let heat_w = mass_flow * (t_supply - t_return) * cp;
                self.heat_w.set(step, heat_w);
                self.heat.set(step, heat_w / conversion);
            }
            ControlMode::Heat => {
                let heat = self.require_heat(step)?;
                let heat_w = heat * conversion;
                self.heat_w.set(step, heat_w);
                let temp = self.heat_lift(heat_w, mass_flow) + t_return;
                let bound = self.params.temp_upper_bound;
                self.virtual_temp_sup.set(step, temp);
                self.state.temp.set(1, step, temp.min(bound));
                self.state.violations.record(
                    ViolationKind::SupplyTemp,
                    step,
                    (temp - bound).max(0.0),
                );
            }
        }
        Ok(())
    }

    fn solve_chp(&mut self, step: usize) {
        let heat = self.heat.get(step);
        let temp = self.state.temp.get(1, step);
        let pump = self.pump_power.get(step);
        let price = self.electricity_price.get(step);
        let Some(chp) = self.chp.as_mut() else {
            return;
        };
        let electricity = chp.electricity.known(step).unwrap_or(0.0);

        let (prev_heat, prev_electricity, prev_temp) = match step.checked_sub(1) {
            Some(prev) => (
                self.heat.known(prev),
                chp.electricity.known(prev),
                self.state.temp.known(1, prev),
            ),
            None => (
                chp.history.map(|h| h.heat),
                chp.history.map(|h| h.electricity),
                chp.history.map(|h| h.temp),
            ),
        };

        let violations = &mut self.state.violations;
        violations.record(
            ViolationKind::HeatRamp,
            step,
            ramp_excess(heat, prev_heat, chp.max_ramp_heat, chp.region.max_heat()),
        );
        violations.record(
            ViolationKind::ElectricityRamp,
            step,
            ramp_excess(
                electricity,
                prev_electricity,
                chp.max_ramp_electricity,
                chp.region.max_power(),
            ),
        );
        violations.record(
            ViolationKind::TempRamp,
            step,
            ramp_excess(temp, prev_temp, chp.max_ramp_temp, 1.0),
        );
        let outside = !chp.region.contains(heat, electricity);
        violations.record(
            ViolationKind::OperationRegion,
            step,
            if outside { 1.0 } else { 0.0 },
        );

        let production = heat * chp.fuel_cost[0] + electricity * chp.fuel_cost[1];
        let pump_cost = pump * price;
        chp.production_cost.set(step, production);
        chp.ramp_cost.set(step, 0.0);
        chp.pump_electricity_cost.set(step, pump_cost);
        chp.cost.set(step, production + pump_cost);
        chp.profit.set(step, electricity * price);
    }

    /// Cost components and profit over the solved steps.
    pub(crate) fn margin(&self, time: TimeAggregation, current_step: usize) -> ProducerMargin {
        let agg = |s: &Series| Aggregate::from_steps(s.values(), current_step, time);
        let mut cost = BTreeMap::from([(CostKind::Pump, agg(&self.pump_power))]);
        match &self.chp {
            Some(chp) => {
                cost.insert(CostKind::ProductionCost, agg(&chp.production_cost));
                cost.insert(CostKind::RampCost, agg(&chp.ramp_cost));
                ProducerMargin {
                    cost,
                    profit: agg(&chp.profit),
                }
            }
            None => ProducerMargin {
                cost,
                profit: Aggregate::zero(time, current_step),
            },
        }
    }

    /// Supply temperature above the plant's upper bound in the current step.
    pub(crate) fn supply_excess(&self, step: usize) -> f64 {
        self.virtual_temp_sup
            .known(step)
            .map_or(0.0, |t| (t - self.params.temp_upper_bound).max(0.0))
    }
}

impl NodeModel for Producer {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn outlet_temp(
        &mut self,
        slot: usize,
        flow_hint: Option<f64>,
        grid: &mut Grid,
    ) -> SimResult<Reading> {
        if slot != 1 {
            return Err(SimError::InvalidArg {
                what: "producers only send water out of slot 1",
            });
        }
        let step = grid.step;
        let temp = match self.params.control {
            ControlMode::Temperature => self.state.require_temp(1, step)?,
            ControlMode::Heat => {
                let heat = self.require_heat(step)?;
                match flow_hint.filter(|m| !m.is_nan()) {
                    None => self.initial_supply_temp,
                    Some(mass_flow) => {
                        let lift = self.heat_lift(heat * grid.conversion(), mass_flow);
                        lift + self.estimated_return_temp(grid)?
                    }
                }
                .min(self.params.temp_upper_bound)
            }
        };
        Ok(Reading {
            temp,
            entry_step_global: step as f64,
        })
    }

    fn set_mass_flow(&mut self, slot: usize, mass_flow: f64, grid: &mut Grid) -> SimResult<()> {
        let step = grid.step;
        let tolerances = grid.config.tolerances;
        let object = self.state.object;
        let mismatch = |expected: f64| SimError::FlowMismatch {
            object,
            step,
            expected,
            actual: mass_flow,
        };
        match slot {
            0 => match self.state.mass_flow.known(1, step) {
                Some(supply) if !tolerances.flows_match(supply, mass_flow) => {
                    Err(mismatch(supply))
                }
                Some(_) => Ok(()),
                None => {
                    self.state.mass_flow.set(0, step, mass_flow);
                    Ok(())
                }
            },
            1 => {
                if let Some(ret) = self.state.mass_flow.known(0, step)
                    && !tolerances.flows_match(ret, mass_flow)
                {
                    return Err(mismatch(ret));
                }
                self.state.mass_flow.set_all_slots(step, mass_flow);

                let return_edge = self.state.edge(0)?;
                let supply_edge = self.state.edge(1)?;
                let t_return = grid.edge_outlet_temp(return_edge)?.temp;
                self.state.temp.set(0, step, t_return);
                self.settle_heat(step, mass_flow, grid.conversion())?;

                let p_out = grid
                    .edge_pressure(supply_edge, 0)?
                    .ok_or_else(|| self.state.unwritten("supply pipe pressure", 1, step))?;
                let p_in = grid
                    .edge_pressure(return_edge, 1)?
                    .ok_or_else(|| self.state.unwritten("return pipe pressure", 0, step))?;
                self.state.pressure.set(1, step, p_out);
                self.state.pressure.set(0, step, p_in);
                let pump = (p_out - p_in) * mass_flow
                    / (self.params.density * self.params.pump_efficiency)
                    / grid.conversion();
                self.pump_power.set(step, pump);
                Ok(())
            }
            _ => Err(SimError::InvalidArg {
                what: "producers only have slots 0 and 1",
            }),
        }
    }

    fn solve(&mut self, grid: &mut Grid) -> SimResult<()> {
        self.solve_chp(grid.step);
        Ok(())
    }

    fn clear(&mut self) {
        self.state.clear();
        for s in [
            &mut self.heat,
            &mut self.heat_w,
            &mut self.pump_power,
            &mut self.virtual_temp_sup,
        ] {
            s.fill(f64::NAN);
        }
        if let Some(chp) = self.chp.as_mut() {
            chp.clear();
        }
    }
}
