//! Insulated buried pipe: geometry, Newtonian heat loss and friction.

use crate::common::check_positive;
use crate::error::ComponentResult;
use hg_core::units::constants::{WATER_CP, WATER_DENSITY};
use hg_core::units::{Area, Density, Length, Mass, SpecificHeat, Velocity};
use hg_core::units::{j_per_kg_k, kg_per_m3, mps};

/// Static parameters of a district-heating pipe.
///
/// Temperatures are in °C. The pipe is always completely full, so its water
/// mass is fixed by geometry and density.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    /// Inner diameter
    pub diameter: Length,
    pub length: Length,
    /// Insulation resistance (K m / W)
    pub thermal_resistance: f64,
    pub heat_capacity: SpecificHeat,
    pub density: Density,
    /// °C
    pub ground_temp: f64,
    /// Pressure drop per squared mass flow, Pa/(kg/s)^2
    pub friction_coefficient: f64,
    pub max_flow_speed: Velocity,
    pub min_flow_speed: Velocity,
}

impl Pipe {
    /// Water-filled pipe with the usual network defaults.
    pub fn new(diameter: Length, length: Length, thermal_resistance: f64) -> Self {
        Self {
            diameter,
            length,
            thermal_resistance,
            heat_capacity: j_per_kg_k(WATER_CP),
            density: kg_per_m3(WATER_DENSITY),
            ground_temp: 10.0,
            friction_coefficient: 1.29 * std::f64::consts::SQRT_2,
            max_flow_speed: mps(10.0),
            min_flow_speed: mps(0.0),
        }
    }

    pub fn validate(&self) -> ComponentResult<()> {
        check_positive(self.diameter.value, "pipe diameter")?;
        check_positive(self.length.value, "pipe length")?;
        check_positive(self.thermal_resistance, "pipe thermal resistance")?;
        check_positive(self.heat_capacity.value, "pipe heat capacity")?;
        check_positive(self.density.value, "pipe density")?;
        Ok(())
    }

    /// Inner cross-section.
    pub fn cross_section(&self) -> Area {
        let r = self.diameter / 2.0;
        std::f64::consts::PI * r * r
    }

    /// Mass of water filling the pipe.
    pub fn water_mass(&self) -> Mass {
        self.length * self.cross_section() * self.density
    }

    /// Newton cooling time constant in seconds.
    pub fn thermal_time_constant(&self) -> f64 {
        self.cross_section().value
            * self.heat_capacity.value
            * self.density.value
            * self.thermal_resistance
    }

    /// Temperature of water that entered at `entry_temp` after `age` steps of `interval_s`.
    pub fn decayed_temp(&self, entry_temp: f64, age: i64, interval_s: f64) -> f64 {
        let tau = age as f64 * interval_s;
        self.ground_temp
            + (entry_temp - self.ground_temp) * (-tau / self.thermal_time_constant()).exp()
    }

    /// Energy (J) a plug lost during its most recent step in the pipe.
    pub fn step_heat_loss(&self, entry_temp: f64, mass: f64, age: i64, interval_s: f64) -> f64 {
        let tc = self.thermal_time_constant();
        let before = ((age - 1).max(0) as f64 * interval_s) / tc;
        let now = (age as f64 * interval_s) / tc;
        (entry_temp - self.ground_temp)
            * ((-before).exp() - (-now).exp())
            * self.heat_capacity.value
            * mass
    }

    /// Mean flow speed (m/s) for a mass flow in kg/s.
    pub fn flow_speed(&self, mass_flow: f64) -> f64 {
        mass_flow / self.cross_section().value / self.density.value
    }

    /// Signed excess over the speed limits, zero inside them.
    pub fn flow_speed_violation(&self, speed: f64) -> f64 {
        (speed - self.max_flow_speed.value).max(0.0) + (speed - self.min_flow_speed.value).min(0.0)
    }

    /// Friction pressure drop (Pa) for a mass flow in kg/s.
    pub fn pressure_drop(&self, mass_flow: f64) -> f64 {
        self.friction_coefficient * mass_flow * mass_flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_core::units::m;

    fn pipe() -> Pipe {
        Pipe::new(m(0.3), m(2000.0), 1.36)
    }

    #[test]
    fn geometry() {
        let p = pipe();
        let area = std::f64::consts::PI * 0.15 * 0.15;
        assert!((p.cross_section().value - area).abs() < 1e-12);
        assert!((p.water_mass().value - 2000.0 * area * 963.0).abs() < 1e-6);
    }

    #[test]
    fn decay_approaches_ground() {
        let p = pipe();
        assert_eq!(p.decayed_temp(90.0, 0, 3600.0), 90.0);
        let one_day = p.decayed_temp(90.0, 24, 3600.0);
        assert!(one_day < 90.0 && one_day > 10.0);
        let long = p.decayed_temp(90.0, 1_000_000, 3600.0);
        assert!((long - 10.0).abs() < 1e-6);
    }

    #[test]
    fn step_loss_matches_temperature_drop() {
        let p = pipe();
        let mass = 1000.0;
        let loss = p.step_heat_loss(90.0, mass, 3, 600.0);
        let drop = p.decayed_temp(90.0, 2, 600.0) - p.decayed_temp(90.0, 3, 600.0);
        assert!((loss - drop * 4181.3 * mass).abs() < 1e-6);
        // Fresh water has not lost anything yet.
        assert_eq!(p.step_heat_loss(90.0, mass, 0, 600.0), 0.0);
    }

    #[test]
    fn speed_violation_sign() {
        let mut p = pipe();
        p.min_flow_speed = mps(0.1);
        assert_eq!(p.flow_speed_violation(1.0), 0.0);
        assert!((p.flow_speed_violation(12.0) - 2.0).abs() < 1e-12);
        assert!((p.flow_speed_violation(0.05) + 0.05).abs() < 1e-12);
    }

    #[test]
    fn pressure_drop_is_quadratic() {
        let p = pipe();
        assert!((p.pressure_drop(2.0) - 4.0 * p.friction_coefficient).abs() < 1e-12);
    }

    #[test]
    fn rejects_zero_diameter() {
        let mut p = pipe();
        p.diameter = m(0.0);
        assert!(p.validate().is_err());
    }
}
