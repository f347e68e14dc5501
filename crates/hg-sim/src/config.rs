//! Simulation configuration.

use hg_core::{Tolerances, nearly_equal};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Numeric thresholds of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimTolerances {
    /// Allowed disagreement (Pa) between an edge's friction drop and the
    /// pressures of its two end nodes.
    pub pressure: f64,
    /// Consumer primary flows below this (kg/s) count as no flow.
    pub zero_flow: f64,
    /// Dead band (energy units) of the `heat delivered` violation.
    pub heat_delivered: f64,
    /// Relative tolerance when two pushes must carry the same flow.
    pub flow_match: f64,
    /// Relative tolerance on the total mass of initial plugs.
    pub plug_mass: f64,
    /// Unmet consumer heat (energy units) below this is not reported as a
    /// condition violation.
    pub unmet_heat: f64,
    /// Allowed gap (K) between a transfer's secondary supply temperature and
    /// its setpoint.
    pub transfer_setpoint: f64,
}

impl Default for SimTolerances {
    fn default() -> Self {
        Self {
            pressure: 1e-3,
            zero_flow: 1e-4,
            heat_delivered: 1e-3,
            flow_match: 1e-9,
            plug_mass: 1e-6,
            unmet_heat: 1.0,
            transfer_setpoint: 1e-9,
        }
    }
}

impl SimTolerances {
    /// Whether two flows agree within `flow_match`.
    pub fn flows_match(&self, a: f64, b: f64) -> bool {
        let tol = Tolerances {
            abs: self.flow_match,
            rel: self.flow_match,
        };
        nearly_equal(a, b, tol)
    }
}

/// Step layout and units of one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Step length (seconds)
    pub interval_s: f64,
    /// Number of steps the network can solve
    pub horizon: usize,
    /// Watts per reporting energy unit (1e6 reports in MW)
    pub energy_unit_conversion: f64,
    pub tolerances: SimTolerances,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            interval_s: 3600.0,
            horizon: 24,
            energy_unit_conversion: 1e6,
            tolerances: SimTolerances::default(),
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(yaml: &str) -> SimResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> SimResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.interval_s.is_finite() && self.interval_s > 0.0) {
            return Err(SimError::InvalidArg {
                what: "interval_s must be positive",
            });
        }
        if self.horizon == 0 {
            return Err(SimError::InvalidArg {
                what: "horizon must be at least one step",
            });
        }
        if !(self.energy_unit_conversion.is_finite() && self.energy_unit_conversion > 0.0) {
            return Err(SimError::InvalidArg {
                what: "energy_unit_conversion must be positive",
            });
        }
        let t = &self.tolerances;
        if [
            t.pressure,
            t.zero_flow,
            t.heat_delivered,
            t.flow_match,
            t.plug_mass,
            t.unmet_heat,
            t.transfer_setpoint,
        ]
        .iter()
            .any(|v| !(v.is_finite() && *v >= 0.0))
        {
            return Err(SimError::InvalidArg {
                what: "tolerances must be finite and non-negative",
            });
        }
        Ok(())
    }

    /// Seconds per step as a uom quantity.
    pub fn interval(&self) -> hg_core::units::Time {
        hg_core::units::s(self.interval_s)
    }
}
