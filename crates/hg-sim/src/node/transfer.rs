//! Transfer station: a heat exchanger coupling a primary network to a
//! secondary one.

use hg_components::{HeatExchanger, HxRegime};
use hg_core::Series;

use super::{NodeModel, NodeState};
use crate::error::{SimError, SimResult};
use crate::grid::{Grid, Reading, Target};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TransferParams {
    pub hx: HeatExchanger,
    /// Desired secondary supply temperature, °C
    pub opt_temp: f64,
    /// Pressure on the primary supply side, Pa
    pub pressure_load: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Transfer {
    pub state: NodeState,
    pub params: TransferParams,
    /// Heat passed to the secondary side, energy units
    pub heat: Series,
}

impl Transfer {
    pub(crate) fn new(state: NodeState, params: TransferParams) -> Self {
        let steps = state.steps();
        let mut transfer = Self {
            state,
            params,
            heat: Series::unknown(steps),
        };
        transfer.clear();
        transfer
    }
}

impl NodeModel for Transfer {
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
        let step = grid.step;
        match slot {
            1 => Ok(Reading {
                temp: self.state.require_temp(1, step)?,
                entry_step_global: self.state.entry_step_global.get(step),
            }),
            2 => {
                let primary = grid.edge_outlet_temp(self.state.edge(0)?)?;
                self.state.temp.set(0, step, primary.temp);
                let temp = self.params.opt_temp.min(primary.temp);
                self.state.temp.set(2, step, temp);
                self.state
                    .entry_step_global
                    .set(step, primary.entry_step_global);
                Ok(Reading {
                    temp,
                    entry_step_global: primary.entry_step_global,
                })
            }
            _ => Err(SimError::InvalidArg {
                what: "transfers only send water out of slots 1 and 2",
            }),
        }
    }

    fn set_mass_flow(&mut self, slot: usize, mass_flow: f64, grid: &mut Grid) -> SimResult<()> {
        if slot != 2 && slot != 3 {
            return Err(SimError::InvalidArg {
                what: "transfers take secondary flow on slots 2 and 3 only",
            });
        }
        let step = grid.step;
        match self.state.mass_flow.known(3, step) {
            None => self.state.mass_flow.set(3, step, mass_flow),
            Some(first) if !grid.config.tolerances.flows_match(first, mass_flow) => {
                return Err(SimError::FlowMismatch {
                    object: self.state.object,
                    step,
                    expected: first,
                    actual: mass_flow,
                });
            }
            Some(_) => {}
        }
        if slot == 3 {
            return Ok(());
        }

        let t_return_s = grid.edge_outlet_temp(self.state.edge(3)?)?.temp;
        self.state.temp.set(3, step, t_return_s);
        let setpoint = self.state.require_temp(2, step)?;
        if t_return_s > setpoint {
            return Err(SimError::TransferReturnTooHot {
                object: self.state.object,
                return_temp: t_return_s,
                setpoint,
            });
        }

        let t_supply_p = self.state.require_temp(0, step)?;
        let sol = self
            .params
            .hx
            .solve(t_supply_p, setpoint, t_return_s, mass_flow, None)?;

        self.state.mass_flow.set(0, step, sol.mass_flow_p);
        self.state.mass_flow.set(1, step, sol.mass_flow_p);
        self.state.mass_flow.set(2, step, mass_flow);
        self.state.mass_flow.set(3, step, mass_flow);
        self.state.temp.set(1, step, sol.t_return_p);
        self.heat.set(step, sol.q / grid.conversion());

        let gap = (sol.t_supply_s - setpoint).abs();
        if sol.regime != HxRegime::Idle && gap > grid.config.tolerances.transfer_setpoint {
            return Err(SimError::TransferSetpointUnreachable {
                object: self.state.object,
                setpoint,
                achievable: sol.t_supply_s,
            });
        }

        grid.schedule(Target::Edge(self.state.edge(0)?), 1, sol.mass_flow_p);
        grid.schedule(Target::Edge(self.state.edge(1)?), 0, sol.mass_flow_p);
        Ok(())
    }

    fn clear(&mut self) {
        self.state.clear();
        self.state.temp.fill_slot(2, self.params.opt_temp);
        self.state.pressure.fill_slot(0, self.params.pressure_load);
        self.state.pressure.fill_slot(1, 0.0);
        self.heat.fill(f64::NAN);
    }
}
