//! Counter-flow heat exchanger between a primary (network) and a secondary
//! (building or sub-network) circuit.
//!
//! The exchanger is sized by effectiveness-NTU. When the demanded heat is
//! within reach the exchanger is in its thermal regime: the full demand is
//! delivered and the primary return temperature follows from the LMTD
//! relation, solved with Newton-Raphson on the ratio of the terminal
//! temperature differences. When the primary valve would have to open past
//! its maximum the exchanger is in its hydraulic regime: primary flow is
//! capped and the secondary supply temperature drops.
//!
//! References: Palsson 1999 (p45-51) for the overall coefficient
//! `U = k / (m_p^-q + m_s^-q)` and the Newton formulation, Giraud 2015 (b)
//! (p82-83) for the regimes and the stability of the iteration.

use tracing::warn;

use crate::common::{check_finite, reflect_into};
use crate::error::{ComponentError, ComponentResult};
use crate::hx_table::HxLookupTable;
use crate::newton::{NewtonConfig, newton_solve};
use hg_core::units::constants::WATER_CP;
use hg_core::units::{Area, MassRate, SpecificHeat, j_per_kg_k, kgps, m2};

/// Demand-scaled heat-transfer coefficient: `k = k_max (demand / capacity)^0.3`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicK {
    pub k_max: f64,
    /// Same unit as the demand passed to `solve` (MW).
    pub demand_capacity: f64,
}

/// Numeric thresholds of the exchanger model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HxTolerances {
    /// Secondary supply stays at least this far (K) below primary supply.
    pub min_temp_margin: f64,
    /// Demands below this (W) are treated as no demand.
    pub trivial_heat: f64,
    /// Newton step tolerance on the temperature-difference ratio.
    pub newton_step: f64,
    /// Distance from ratio 1 inside which the limiting form is used.
    pub singularity: f64,
    pub max_iterations: usize,
    /// Relative LMTD recheck tolerance before a precision warning.
    pub lmtd_rel: f64,
    /// Allowed primary flow above the hardware maximum (kg/s).
    pub max_flow_excess: f64,
    /// Lookup table grid spacing.
    pub grid_resolution: f64,
}

impl Default for HxTolerances {
    fn default() -> Self {
        Self {
            min_temp_margin: 0.1,
            trivial_heat: 1.0,
            newton_step: 0.001,
            singularity: 0.0001,
            max_iterations: 100,
            lmtd_rel: 0.001,
            max_flow_excess: 0.0001,
            grid_resolution: 0.015625,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HxRegime {
    /// No (or negligible) demand; nothing flows on the primary side.
    Idle,
    /// Demand is met; primary flow is whatever it takes.
    Thermal,
    /// Primary flow is capped; delivered heat falls short of demand.
    Hydraulic,
}

/// Operating point of the exchanger for one set of inlet conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HxSolution {
    /// kg/s
    pub mass_flow_p: f64,
    /// °C
    pub t_return_p: f64,
    /// °C
    pub t_supply_s: f64,
    /// W
    pub q: f64,
    pub regime: HxRegime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatExchanger {
    pub heat_capacity: SpecificHeat,
    /// Primary flow with the control valve fully open.
    pub max_mass_flow_p: MassRate,
    pub surface_area: Area,
    /// Flow exponent `q` of the overall coefficient.
    pub heat_transfer_q: f64,
    /// Heat-transfer constant `k`.
    pub heat_transfer_k: f64,
    pub dynamic_k: Option<DynamicK>,
    pub tolerances: HxTolerances,
    table: Option<HxLookupTable>,
}

impl Default for HeatExchanger {
    fn default() -> Self {
        Self {
            heat_capacity: j_per_kg_k(WATER_CP),
            max_mass_flow_p: kgps(300.0),
            surface_area: m2(10.0),
            heat_transfer_q: 0.8,
            heat_transfer_k: 50_000.0,
            dynamic_k: None,
            tolerances: HxTolerances::default(),
            table: None,
        }
    }
}

/// Counter-flow effectiveness for `NTU` and capacity ratio `c_r`.
pub fn effectiveness(ntu: f64, c_r: f64) -> f64 {
    if c_r == 1.0 {
        ntu / (1.0 + ntu)
    } else if c_r == 0.0 {
        1.0 - (-ntu).exp()
    } else {
        let x = (-ntu * (1.0 - c_r)).exp();
        (1.0 - x) / (1.0 - c_r * x)
    }
}

/// Log-mean temperature difference of a counter-flow exchanger.
pub fn lmtd(t_supply_p: f64, t_supply_s: f64, t_return_p: f64, t_return_s: f64) -> f64 {
    let hot_end = t_supply_p - t_supply_s;
    let cold_end = t_return_p - t_return_s;
    (hot_end - cold_end) / (hot_end.ln() - cold_end.ln())
}

impl HeatExchanger {
    pub fn new(max_mass_flow_p: MassRate, surface_area: Area, heat_transfer_k: f64) -> Self {
        Self {
            max_mass_flow_p,
            surface_area,
            heat_transfer_k,
            ..Self::default()
        }
    }

    pub fn with_dynamic_k(mut self, k_max: f64, demand_capacity: f64) -> Self {
        self.dynamic_k = Some(DynamicK {
            k_max,
            demand_capacity,
        });
        self
    }

    pub fn with_table(mut self, table: HxLookupTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn set_table(&mut self, table: Option<HxLookupTable>) {
        self.table = table;
    }

    pub fn table(&self) -> Option<&HxLookupTable> {
        self.table.as_ref()
    }

    /// Heat-transfer constant for the given demand (MW).
    pub fn heat_transfer_coefficient(&self, demand: Option<f64>) -> ComponentResult<f64> {
        match self.dynamic_k {
            None => Ok(self.heat_transfer_k),
            Some(DynamicK {
                k_max,
                demand_capacity,
            }) => {
                let demand = demand.ok_or(ComponentError::InvalidArg {
                    what: "dynamic heat-transfer coefficient needs a demand",
                })?;
                Ok(k_max * (demand / demand_capacity).powf(0.3))
            }
        }
    }

    /// Overall heat-transfer coefficient U (W/(m^2 K)).
    pub fn overall_coefficient(&self, k: f64, mass_flow_p: f64, mass_flow_s: f64) -> f64 {
        let q = self.heat_transfer_q;
        k / (mass_flow_p.powf(-q) + mass_flow_s.powf(-q))
    }

    /// Heat (W) implied by the LMTD relation for a complete operating point.
    pub fn lmtd_heat(
        &self,
        k: f64,
        t_supply_p: f64,
        t_supply_s: f64,
        t_return_p: f64,
        t_return_s: f64,
        mass_flow_p: f64,
        mass_flow_s: f64,
    ) -> f64 {
        self.overall_coefficient(k, mass_flow_p, mass_flow_s)
            * self.surface_area.value
            * lmtd(t_supply_p, t_supply_s, t_return_p, t_return_s)
    }

    /// Lowest primary supply temperature (°C) that still delivers `q` (W) at
    /// the given flows and secondary supply temperature.
    ///
    /// The result is non-finite when no temperature can deliver `q`.
    pub fn minimum_t_supply_p(
        &self,
        q: f64,
        t_supply_s: f64,
        mass_flow_p: f64,
        mass_flow_s: f64,
        demand: Option<f64>,
    ) -> ComponentResult<f64> {
        let k = self.heat_transfer_coefficient(demand)?;
        let cp = self.heat_capacity.value;
        let u = self.overall_coefficient(k, mass_flow_p, mass_flow_s);
        let lmtd = q / u / self.surface_area.value;
        let dt_p = q / mass_flow_p / cp;
        let dt_s = q / mass_flow_s / cp;
        let a = ((dt_p - dt_s) / lmtd).exp();
        Ok((t_supply_s - a * (dt_p + t_supply_s - dt_s)) / (1.0 - a))
    }

    /// Operating point for the given inlet conditions.
    ///
    /// Uses the lookup table when one is attached and covers the point,
    /// Newton-Raphson otherwise.
    pub fn solve(
        &self,
        t_supply_p: f64,
        setpoint_t_supply_s: f64,
        t_return_s: f64,
        mass_flow_s: f64,
        demand: Option<f64>,
    ) -> ComponentResult<HxSolution> {
        self.solve_with(
            t_supply_p,
            setpoint_t_supply_s,
            t_return_s,
            mass_flow_s,
            demand,
            self.table.as_ref(),
        )
    }

    pub(crate) fn solve_with(
        &self,
        t_supply_p: f64,
        setpoint_t_supply_s: f64,
        t_return_s: f64,
        mass_flow_s: f64,
        demand: Option<f64>,
        table: Option<&HxLookupTable>,
    ) -> ComponentResult<HxSolution> {
        check_finite(t_supply_p, "primary supply temperature")?;
        check_finite(setpoint_t_supply_s, "secondary supply setpoint")?;
        check_finite(t_return_s, "secondary return temperature")?;
        check_finite(mass_flow_s, "secondary mass flow")?;

        let tol = &self.tolerances;
        let cp = self.heat_capacity.value;
        let max_flow = self.max_mass_flow_p.value;
        let k = self.heat_transfer_coefficient(demand)?;

        let t_supply_s = setpoint_t_supply_s.min(t_supply_p - tol.min_temp_margin);
        let demanded_q = mass_flow_s * cp * (t_supply_s - t_return_s);

        if demanded_q < tol.trivial_heat {
            return Ok(HxSolution {
                mass_flow_p: 0.0,
                t_return_p: t_supply_p,
                t_supply_s: t_return_s,
                q: 0.0,
                regime: HxRegime::Idle,
            });
        }

        let c_min = max_flow.min(mass_flow_s) * cp;
        let c_max = max_flow.max(mass_flow_s) * cp;
        let q_max = c_min * (t_supply_p - t_return_s);
        let u = self.overall_coefficient(k, max_flow, mass_flow_s);
        let ntu = u * self.surface_area.value / c_min;
        let thermal_max_q = effectiveness(ntu, c_min / c_max) * q_max;

        if thermal_max_q < demanded_q {
            return Ok(HxSolution {
                mass_flow_p: max_flow,
                t_return_p: t_supply_p - thermal_max_q / max_flow / cp,
                t_supply_s: t_return_s + thermal_max_q / mass_flow_s / cp,
                q: thermal_max_q,
                regime: HxRegime::Hydraulic,
            });
        }

        let q = demanded_q;
        let t_return_p = match table.and_then(|t| t.interpolate(t_supply_p, mass_flow_s)) {
            Some(t) => t,
            None => self.thermal_return_temp(t_supply_p, t_return_s, t_supply_s, q, k)?,
        };

        let mass_flow_p = q / (cp * (t_supply_p - t_return_p).abs());

        let q_lmtd = self.lmtd_heat(
            k,
            t_supply_p,
            t_supply_s,
            t_return_p,
            t_return_s,
            mass_flow_p,
            mass_flow_s,
        );
        let q_tolerance = tol.lmtd_rel * (t_supply_p - t_supply_s) * mass_flow_p * cp;
        if (q_lmtd - q).abs() > q_tolerance {
            warn!(
                q,
                q_lmtd,
                t_supply_p,
                t_supply_s,
                t_return_p,
                t_return_s,
                mass_flow_p,
                mass_flow_s,
                "heat exchanger precision error: area or k probably too large, or flow too small"
            );
        }

        if mass_flow_p > max_flow + tol.max_flow_excess {
            return Err(ComponentError::HardwareLimit {
                what: "heat exchanger primary mass flow",
                value: mass_flow_p,
                limit: max_flow,
            });
        }

        Ok(HxSolution {
            mass_flow_p,
            t_return_p,
            t_supply_s,
            q,
            regime: HxRegime::Thermal,
        })
    }

    /// Primary outlet temperature in the thermal regime.
    ///
    /// Unknown is the ratio `a = (t_out_1 - t_in_2) / (t_in_1 - t_out_2)` of
    /// the terminal temperature differences. Substituting the primary flow
    /// implied by `a` into `q = U A LMTD` gives `f(a) = q^(1-q_exp) / c_1`.
    fn thermal_return_temp(
        &self,
        t_in_1: f64,
        t_in_2: f64,
        t_out_2: f64,
        q: f64,
        k: f64,
    ) -> ComponentResult<f64> {
        let tol = &self.tolerances;
        let qe = self.heat_transfer_q;
        let cp = self.heat_capacity.value;

        let c_1 = k * self.surface_area.value * (t_in_1 - t_out_2).abs()
            / (cp * (t_out_2 - t_in_2).abs()).powf(qe);
        let c_2 = (t_in_1 - t_out_2).abs() / (t_out_2 - t_in_2).abs();
        let target = q.powf(1.0 - qe) / c_1;

        let singular = |a: f64| (a - 1.0).abs() < tol.singularity;
        let g_2 = |a: f64| 1.0 + (1.0 - c_2 * (a - 1.0)).powf(qe);
        let f = |a: f64| {
            if singular(a) {
                0.5
            } else {
                (a - 1.0) / (g_2(a) * a.ln())
            }
        };
        let derivative = |a: f64| {
            if singular(a) {
                return 0.5 * (0.5 + c_2 * qe / 2.0);
            }
            let g_1 = a - 1.0;
            let g_3 = a.ln();
            let x_1 = (g_3 - g_1 / a) / (g_1 * g_3);
            let x_2 = c_2 * qe * (1.0 - c_2 * g_1).powf(qe - 1.0) / g_2(a);
            f(a) * (x_1 + x_2)
        };

        // Beyond this bound the primary flow implied by `a` turns negative.
        let bound = 1.0 / c_2 + 1.0;
        let project = |a: f64, next: f64| {
            if singular(a) {
                next
            } else {
                reflect_into(next, bound)
            }
        };

        let config = NewtonConfig {
            max_iterations: tol.max_iterations,
            step_tol: tol.newton_step,
        };
        let alpha = newton_solve(0.5 * bound, |a| f(a) - target, derivative, project, &config)?;

        Ok(t_in_2 + alpha.root * (t_in_1 - t_out_2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exchanger sized for roughly 10 MW at 90/70/45 °C.
    fn substation() -> HeatExchanger {
        HeatExchanger::new(kgps(300.0), m2(400.0), 207.15)
    }

    #[test]
    fn effectiveness_branches() {
        assert!((effectiveness(1.0, 1.0) - 0.5).abs() < 1e-12);
        assert!((effectiveness(1.0, 0.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-12);
        let e = effectiveness(2.0, 0.5);
        assert!(e > effectiveness(2.0, 1.0) && e < effectiveness(2.0, 0.0));
    }

    #[test]
    fn negligible_demand_is_idle() {
        let hx = substation();
        let sol = hx.solve(90.0, 70.0, 45.0, 0.0, None).unwrap();
        assert_eq!(sol.regime, HxRegime::Idle);
        assert_eq!(sol.mass_flow_p, 0.0);
        assert_eq!(sol.t_return_p, 90.0);
        assert_eq!(sol.q, 0.0);

        // Supply colder than the secondary return cannot heat anything.
        let cold = hx.solve(40.0, 70.0, 45.0, 50.0, None).unwrap();
        assert_eq!(cold.regime, HxRegime::Idle);
    }

    #[test]
    fn thermal_regime_meets_demand() {
        let hx = substation();
        let ms = 10e6 / (WATER_CP * 25.0);
        let sol = hx.solve(90.0, 70.0, 45.0, ms, None).unwrap();
        assert_eq!(sol.regime, HxRegime::Thermal);
        assert!((sol.q - 10e6).abs() < 1e-3);
        assert_eq!(sol.t_supply_s, 70.0);
        assert!(sol.t_return_p > 45.0 && sol.t_return_p < 70.0);
        assert!(sol.mass_flow_p > 0.0 && sol.mass_flow_p < 300.0);
        // Energy balance on the primary side.
        let q_p = sol.mass_flow_p * WATER_CP * (90.0 - sol.t_return_p);
        assert!((q_p - sol.q).abs() / sol.q < 1e-9);
    }

    #[test]
    fn thermal_regime_satisfies_lmtd() {
        let hx = substation();
        for (t_p, ms) in [(90.0, 60.0), (85.0, 95.0), (100.0, 150.0)] {
            let sol = hx.solve(t_p, 70.0, 45.0, ms, None).unwrap();
            assert_eq!(sol.regime, HxRegime::Thermal);
            let q_lmtd = hx.lmtd_heat(
                hx.heat_transfer_k,
                t_p,
                sol.t_supply_s,
                sol.t_return_p,
                45.0,
                sol.mass_flow_p,
                ms,
            );
            assert!(
                (q_lmtd - sol.q).abs() / sol.q < 1e-2,
                "q={} q_lmtd={}",
                sol.q,
                q_lmtd
            );
        }
    }

    #[test]
    fn hydraulic_regime_caps_primary_flow() {
        let hx = substation();
        let ms = 60e6 / (WATER_CP * 25.0);
        let sol = hx.solve(90.0, 70.0, 45.0, ms, None).unwrap();
        assert_eq!(sol.regime, HxRegime::Hydraulic);
        assert_eq!(sol.mass_flow_p, 300.0);
        assert!(sol.q < 60e6);
        assert!(sol.t_supply_s < 70.0);
        let q_p = 300.0 * WATER_CP * (90.0 - sol.t_return_p);
        assert!((q_p - sol.q).abs() / sol.q < 1e-9);
    }

    #[test]
    fn secondary_supply_stays_below_primary() {
        let hx = substation();
        let sol = hx.solve(65.0, 70.0, 45.0, 20.0, None).unwrap();
        assert!(sol.t_supply_s <= 65.0 - 0.1 + 1e-12);
    }

    #[test]
    fn minimum_supply_inverts_lmtd() {
        let hx = substation();
        let q = 10e6;
        let ms = q / (WATER_CP * 25.0);
        let t_min = hx.minimum_t_supply_p(q, 70.0, 300.0, ms, None).unwrap();
        assert!(t_min > 70.0 && t_min < 75.0, "t_min={t_min}");
        // At that supply temperature and full primary flow the LMTD relation closes.
        let t_return_p = t_min - q / (300.0 * WATER_CP);
        let q_lmtd = hx.lmtd_heat(hx.heat_transfer_k, t_min, 70.0, t_return_p, 45.0, 300.0, ms);
        assert!((q_lmtd - q).abs() / q < 1e-9);
    }

    #[test]
    fn dynamic_k_scales_with_demand() {
        let hx = substation().with_dynamic_k(300.0, 10.0);
        assert!((hx.heat_transfer_coefficient(Some(10.0)).unwrap() - 300.0).abs() < 1e-12);
        let half = hx.heat_transfer_coefficient(Some(5.0)).unwrap();
        assert!((half - 300.0 * 0.5f64.powf(0.3)).abs() < 1e-9);
        assert!(matches!(
            hx.heat_transfer_coefficient(None),
            Err(ComponentError::InvalidArg { .. })
        ));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let hx = substation();
        assert!(matches!(
            hx.solve(f64::NAN, 70.0, 45.0, 10.0, None),
            Err(ComponentError::NonPhysical { .. })
        ));
    }
}
