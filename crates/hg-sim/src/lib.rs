//! hg-sim: transient simulation of district heating networks.
//!
//! Provides:
//! - Plug-flow pipes with advection delay, heat loss and pressure drop
//! - Producers (plain or CHP), consumers, transfer stations, branches and junctions
//! - A staged step solver: consumers pull supply water, a FIFO queue pushes
//!   mass flows back through the network, producers close the step
//! - Queries for object status, pipe states, heat and loss, margins and violations
//!
//! # Example
//!
//! ```
//! use hg_components::HeatExchanger;
//! use hg_core::units::{kgps, m, m2};
//! use hg_sim::{ConsumerSpec, NetworkBuilder, PipeSpec, ProducerSpec, SimConfig, StepControl};
//!
//! let config = SimConfig {
//!     horizon: 4,
//!     ..SimConfig::default()
//! };
//! let mut builder = NetworkBuilder::new(config);
//! let plant = builder.add_producer("plant", ProducerSpec::temperature_controlled());
//! let hx = HeatExchanger::new(kgps(300.0), m2(400.0), 207.15);
//! let house = builder.add_consumer(
//!     "house",
//!     ConsumerSpec::new(vec![10.0; 4]).with_heat_exchanger(hx),
//! );
//! builder.add_pipe("supply", (plant, 1), (house, 0), PipeSpec::new(m(0.3), m(500.0), 1.36, 90.0));
//! builder.add_pipe("return", (house, 1), (plant, 0), PipeSpec::new(m(0.3), m(500.0), 1.36, 50.0));
//! let mut network = builder.build().unwrap();
//!
//! let report = network.solve_one_step(StepControl::Temp(vec![90.0])).unwrap();
//! assert_eq!(report.step, 0);
//! assert!(report.heat_delivered[0] > 0.0);
//! assert_eq!(network.current_step(), 1);
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod network;
pub mod queries;

mod edge;
mod grid;
mod node;

pub use builder::{
    ChpSpec, ConsumerSpec, NetworkBuilder, PipeFill, PipeSpec, ProducerSpec, TransferSpec,
};
pub use config::{SimConfig, SimTolerances};
pub use error::{SimError, SimResult};
pub use network::{Network, ProducerControl, RunCommand, StepControl, StepReport};
pub use node::{ChpHistory, ControlMode};
pub use queries::ConditionViolations;

pub use hg_results::{
    Aggregate, CostAndProfit, CostKind, HeatAndLoss, HeatLossLevel, HeatLossReport, MarginLevel,
    MarginReport, ObjectStatus, PipeStates, PlugState, ProducerMargin, SnapshotStore,
    StatusFlags, TimeAggregation,
};
