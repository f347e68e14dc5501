//! One inlet, several outlets.

use super::connector::{Connector, FlowDirection};
use super::{NodeModel, NodeState};
use crate::error::{SimError, SimResult};
use crate::grid::{Grid, Reading};

#[derive(Debug, Clone)]
pub(crate) struct Branch {
    pub connector: Connector,
}

impl Branch {
    pub(crate) fn new(state: NodeState, default_valve: Option<f64>) -> SimResult<Self> {
        Ok(Self {
            connector: Connector::new(state, FlowDirection::Diverging, default_valve)?,
        })
    }
}

impl NodeModel for Branch {
    fn state(&self) -> &NodeState {
        &self.connector.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.connector.state
    }

    /// Every outlet carries the inlet edge's water.
    fn outlet_temp(
        &mut self,
        slot: usize,
        _flow_hint: Option<f64>,
        grid: &mut Grid,
    ) -> SimResult<Reading> {
        if slot == 0 || slot > self.connector.sides() {
            return Err(SimError::InvalidArg {
                what: "branches send water out of their side slots",
            });
        }
        let step = grid.step;
        if let Some(temp) = self.connector.state.temp.known(slot, step) {
            return Ok(Reading {
                temp,
                entry_step_global: self.connector.state.entry_step_global.get(step),
            });
        }
        let inlet = grid.edge_outlet_temp(self.connector.state.edge(0)?)?;
        self.connector.state.temp.set_all_slots(step, inlet.temp);
        self.connector
            .state
            .entry_step_global
            .set(step, inlet.entry_step_global);
        Ok(inlet)
    }

    fn set_mass_flow(&mut self, slot: usize, mass_flow: f64, grid: &mut Grid) -> SimResult<()> {
        self.connector.set_mass_flow(slot, mass_flow, grid)
    }
}
