//! Shared split/merge logic of branches and junctions.
//!
//! A connector has one main slot (0) and `N` side slots (`1..=N`). The valve
//! position of a step is a fraction per side slot: fractions are commanded
//! for slots `2..=N` and slot 1 takes the complement.

use hg_core::SlotSeries;

use super::NodeState;
use crate::error::{SimError, SimResult};
use crate::grid::{Grid, Target};

/// Which way water crosses the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlowDirection {
    /// Main slot in, side slots out (branch)
    Diverging,
    /// Side slots in, main slot out (junction)
    Converging,
}

impl FlowDirection {
    /// Edge slot a side edge is pushed through.
    fn side_push_slot(self) -> usize {
        match self {
            FlowDirection::Diverging => 0,
            FlowDirection::Converging => 1,
        }
    }

    /// Edge slot the main edge is pushed through.
    fn main_push_slot(self) -> usize {
        1 - self.side_push_slot()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Connector {
    pub state: NodeState,
    pub direction: FlowDirection,
    /// One row per side slot
    pub valve: SlotSeries,
}

impl Connector {
    pub(crate) fn new(
        state: NodeState,
        direction: FlowDirection,
        default_valve: Option<f64>,
    ) -> SimResult<Self> {
        let sides = state.edges.len().saturating_sub(1);
        if sides == 0 {
            return Err(SimError::InvalidArg {
                what: "a connector needs at least one side slot",
            });
        }
        let steps = state.steps();
        let mut connector = Self {
            state,
            direction,
            valve: SlotSeries::unknown(sides, steps),
        };
        if let Some(fraction) = default_valve {
            let fractions = vec![fraction; sides - 1];
            connector.set_valve(0, steps, &fractions)?;
        }
        Ok(connector)
    }

    pub(crate) fn sides(&self) -> usize {
        self.valve.slots()
    }

    /// Command the valve for steps `[start, end)`.
    ///
    /// `fractions` covers side slots `2..=N`; side slot 1 gets the rest.
    pub(crate) fn set_valve(&mut self, start: usize, end: usize, fractions: &[f64]) -> SimResult<()> {
        if fractions.len() + 1 != self.sides() {
            return Err(SimError::InvalidArg {
                what: "valve position needs one fraction per side slot after the first",
            });
        }
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(SimError::InvalidArg {
                what: "valve fractions must lie in [0, 1]",
            });
        }
        let first = 1.0 - fractions.iter().sum::<f64>();
        if first < -1e-12 {
            return Err(SimError::InvalidArg {
                what: "valve fractions must not add up to more than 1",
            });
        }
        for step in start..end.min(self.valve.steps()) {
            self.valve.set(0, step, first.max(0.0));
            for (i, &f) in fractions.iter().enumerate() {
                self.valve.set(i + 1, step, f);
            }
        }
        Ok(())
    }

    /// Side fractions of `step`, side slot 1 first.
    pub(crate) fn valve_at(&self, step: usize) -> SimResult<Vec<f64>> {
        (0..self.sides())
            .map(|i| {
                self.valve
                    .known(i, step)
                    .ok_or_else(|| self.state.unwritten("valve position", i + 1, step))
            })
            .collect()
    }

    /// Known flows of every side slot in `step`, `None` while any is missing.
    pub(crate) fn side_flows(&self, step: usize) -> Option<Vec<f64>> {
        (1..=self.sides())
            .map(|slot| self.state.mass_flow.known(slot, step))
            .collect()
    }

    pub(crate) fn set_mass_flow(
        &mut self,
        slot: usize,
        mass_flow: f64,
        grid: &mut Grid,
    ) -> SimResult<()> {
        if slot > self.sides() {
            return Err(SimError::InvalidArg {
                what: "connector has no such slot",
            });
        }
        self.state.mass_flow.set(slot, grid.step, mass_flow);
        if slot == 0 {
            self.split(mass_flow, grid)
        } else {
            self.join(slot, grid)
        }
    }

    fn split(&mut self, mass_flow: f64, grid: &mut Grid) -> SimResult<()> {
        let step = grid.step;
        let valve = self.valve_at(step)?;
        for (i, fraction) in valve.into_iter().enumerate() {
            let slot = i + 1;
            let flow = fraction * mass_flow;
            self.state.mass_flow.set(slot, step, flow);
            grid.schedule(
                Target::Edge(self.state.edge(slot)?),
                self.direction.side_push_slot(),
                flow,
            );
        }
        let main = self.state.edge(0)?;
        if let Some(p) = grid.edge_pressure(main, self.direction.main_push_slot())? {
            self.state.pressure.set_all_slots(step, p);
        }
        Ok(())
    }

    fn join(&mut self, slot: usize, grid: &mut Grid) -> SimResult<()> {
        let step = grid.step;
        let side = self.state.edge(slot)?;
        if let Some(p) = grid.edge_pressure(side, self.direction.side_push_slot())? {
            self.state.pressure.set(slot, step, p);
        }
        let Some(flows) = self.side_flows(step) else {
            return Ok(());
        };
        let total: f64 = flows.iter().sum();
        self.state.mass_flow.set(0, step, total);

        let side_pressures = (1..=self.sides()).filter_map(|s| self.state.pressure.known(s, step));
        let pressure = match self.direction {
            FlowDirection::Diverging => side_pressures.fold(f64::NEG_INFINITY, f64::max),
            FlowDirection::Converging => side_pressures.fold(f64::INFINITY, f64::min),
        };
        if pressure.is_finite() {
            self.state.pressure.set_all_slots(step, pressure);
        }
        grid.schedule(
            Target::Edge(self.state.edge(0)?),
            self.direction.main_push_slot(),
            total,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_core::Id;

    fn connector(sides: usize, default_valve: Option<f64>) -> Connector {
        let edges = (0..=sides).map(Id::from_usize).collect();
        let state = NodeState::new(Id::from_index(9), edges, 3, &[]);
        Connector::new(state, FlowDirection::Diverging, default_valve).unwrap()
    }

    #[test]
    fn default_valve_gives_complement_to_first_side() {
        let c = connector(3, Some(0.25));
        assert_eq!(c.valve_at(2).unwrap(), vec![0.5, 0.25, 0.25]);
    }

    #[test]
    fn missing_valve_position_is_unwritten() {
        let c = connector(2, None);
        assert!(matches!(
            c.valve_at(0),
            Err(SimError::NotYetWritten { slot: 1, .. })
        ));
    }

    #[test]
    fn valve_commands_are_checked() {
        let mut c = connector(3, None);
        assert!(c.set_valve(0, 3, &[0.5]).is_err());
        assert!(c.set_valve(0, 3, &[0.7, 0.6]).is_err());
        assert!(c.set_valve(0, 3, &[-0.1, 0.5]).is_err());
        c.set_valve(1, 2, &[0.1, 0.2]).unwrap();
        assert!(c.valve_at(0).is_err());
        let v = c.valve_at(1).unwrap();
        assert!((v[0] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn single_side_takes_everything() {
        let c = connector(1, Some(0.3));
        assert_eq!(c.valve_at(0).unwrap(), vec![1.0]);
    }
}
