//! Several inlets, one outlet.

use hg_core::weighted_mean;

use super::connector::{Connector, FlowDirection};
use super::{NodeModel, NodeState};
use crate::error::{SimError, SimResult};
use crate::grid::{Grid, Reading};

#[derive(Debug, Clone)]
pub(crate) struct Junction {
    pub connector: Connector,
}

impl Junction {
    pub(crate) fn new(state: NodeState, default_valve: Option<f64>) -> SimResult<Self> {
        Ok(Self {
            connector: Connector::new(state, FlowDirection::Converging, default_valve)?,
        })
    }

    /// Mixing weights of the inlets: actual flows once every inlet is known
    /// (all on the first inlet if nothing flows), the valve position before.
    fn weights(&self, step: usize) -> SimResult<Vec<f64>> {
        match self.connector.side_flows(step) {
            Some(flows) => {
                let total: f64 = flows.iter().sum();
                if total == 0.0 {
                    let mut w = vec![0.0; flows.len()];
                    w[0] = 1.0;
                    Ok(w)
                } else {
                    Ok(flows.iter().map(|f| f / total).collect())
                }
            }
            None => self.connector.valve_at(step),
        }
    }
}

impl NodeModel for Junction {
    fn state(&self) -> &NodeState {
        &self.connector.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.connector.state
    }

    fn outlet_temp(
        &mut self,
        slot: usize,
        _flow_hint: Option<f64>,
        grid: &mut Grid,
    ) -> SimResult<Reading> {
        if slot != 0 {
            return Err(SimError::InvalidArg {
                what: "junctions send water out of slot 0 only",
            });
        }
        let step = grid.step;
        let weights = self.weights(step)?;
        let mut inlets = Vec::with_capacity(weights.len());
        for (i, &w) in weights.iter().enumerate() {
            let slot = i + 1;
            let reading = grid.edge_outlet_temp(self.connector.state.edge(slot)?)?;
            self.connector.state.temp.set(slot, step, reading.temp);
            inlets.push((reading, w));
        }
        let temp = inlets.iter().map(|(r, w)| r.temp * w).sum();
        let entry_step_global = weighted_mean(inlets.iter().map(|(r, w)| (r.entry_step_global, *w)))
            .unwrap_or(f64::NAN);
        self.connector.state.temp.set(0, step, temp);
        self.connector
            .state
            .entry_step_global
            .set(step, entry_step_global);
        Ok(Reading {
            temp,
            entry_step_global,
        })
    }

    fn set_mass_flow(&mut self, slot: usize, mass_flow: f64, grid: &mut Grid) -> SimResult<()> {
        self.connector.set_mass_flow(slot, mass_flow, grid)
    }
}
