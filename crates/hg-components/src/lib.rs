//! hg-components: physics library for district-heating networks.
//!
//! Provides stateless models used by the network engine:
//! - Plugs of water travelling through a pipe
//! - Pipe physics: Newtonian cooling toward ground temperature, friction
//!   pressure drop, flow speed limits
//! - Counter-flow heat exchanger (effectiveness-NTU with thermal and
//!   hydraulic regimes) and its bilinear lookup table
//! - Scalar Newton-Raphson with a projection hook
//! - CHP operating region and ramp checks
//!
//! # Example
//!
//! ```
//! use hg_components::HeatExchanger;
//!
//! let hx = HeatExchanger::default();
//! let sol = hx.solve(90.0, 70.0, 45.0, 10.0, None).unwrap();
//! assert!(sol.q > 0.0);
//! assert!(sol.t_return_p < 90.0);
//! ```

pub mod chp;
pub mod common;
pub mod error;
pub mod heat_exchanger;
pub mod hx_table;
pub mod newton;
pub mod pipe;
pub mod plug;

pub use chp::{OperationRegion, ramp_excess};
pub use error::{ComponentError, ComponentResult};
pub use heat_exchanger::{DynamicK, HeatExchanger, HxRegime, HxSolution, HxTolerances};
pub use hx_table::HxLookupTable;
pub use newton::{NewtonConfig, NewtonResult, newton_solve};
pub use pipe::Pipe;
pub use plug::Plug;
