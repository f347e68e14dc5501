//! Precomputed heat-exchanger operating points.
//!
//! Maps (primary supply temperature, secondary mass flow) on a regular grid
//! to the primary return temperature, and interpolates bilinearly between
//! grid points. The table is built for one secondary setpoint and return
//! temperature; callers keep it consistent with the exchanger it serves.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::error::{ComponentError, ComponentResult};
use crate::heat_exchanger::HeatExchanger;

#[derive(Debug, Clone, PartialEq)]
pub struct HxLookupTable {
    resolution: f64,
    values: HashMap<(i64, i64), f64>,
}

impl HxLookupTable {
    pub fn new(resolution: f64) -> ComponentResult<Self> {
        if !(resolution > 0.0 && resolution.is_finite()) {
            return Err(ComponentError::InvalidArg {
                what: "lookup table resolution",
            });
        }
        Ok(Self {
            resolution,
            values: HashMap::new(),
        })
    }

    /// Solve `hx` on every grid point of the two ranges (both ends included).
    ///
    /// `demand` sets the heat-transfer constant of an exchanger with a
    /// dynamic k and must then be given; the table only holds for that demand.
    pub fn generate(
        hx: &HeatExchanger,
        setpoint_t_supply_s: f64,
        t_return_s: f64,
        temp_range: RangeInclusive<f64>,
        mass_range: RangeInclusive<f64>,
        demand: Option<f64>,
    ) -> ComponentResult<Self> {
        let mut table = Self::new(hx.tolerances.grid_resolution)?;
        let temps = table.grid_cells(&temp_range);
        let masses = table.grid_cells(&mass_range);

        for i in temps.clone() {
            for j in masses.clone() {
                let t = i as f64 * table.resolution;
                let m = j as f64 * table.resolution;
                let sol = hx.solve_with(t, setpoint_t_supply_s, t_return_s, m, demand, None)?;
                table.values.insert((i, j), sol.t_return_p);
            }
        }
        Ok(table)
    }

    fn cell(&self, x: f64) -> i64 {
        (x / self.resolution).floor() as i64
    }

    fn grid_cells(&self, range: &RangeInclusive<f64>) -> RangeInclusive<i64> {
        self.cell(*range.start())..=(*range.end() / self.resolution).ceil() as i64
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Record the primary return temperature at the grid point containing `(t_supply_p, mass_flow_s)`.
    pub fn insert(&mut self, t_supply_p: f64, mass_flow_s: f64, t_return_p: f64) {
        let key = (self.cell(t_supply_p), self.cell(mass_flow_s));
        self.values.insert(key, t_return_p);
    }

    /// Bilinear estimate of the primary return temperature.
    ///
    /// `None` unless all four surrounding grid points are present.
    pub fn interpolate(&self, t_supply_p: f64, mass_flow_s: f64) -> Option<f64> {
        let (i, j) = (self.cell(t_supply_p), self.cell(mass_flow_s));
        let q11 = *self.values.get(&(i, j))?;
        let q12 = *self.values.get(&(i, j + 1))?;
        let q21 = *self.values.get(&(i + 1, j))?;
        let q22 = *self.values.get(&(i + 1, j + 1))?;

        let r = self.resolution;
        let (x1, y1) = (i as f64 * r, j as f64 * r);
        let (x2, y2) = (x1 + r, y1 + r);
        let (x, y) = (t_supply_p, mass_flow_s);

        Some(
            (q11 * (x2 - x) * (y2 - y)
                + q21 * (x - x1) * (y2 - y)
                + q12 * (x2 - x) * (y - y1)
                + q22 * (x - x1) * (y - y1))
                / ((x2 - x1) * (y2 - y1)),
        )
    }
}
