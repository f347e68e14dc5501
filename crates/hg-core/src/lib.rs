//! hg-core: shared foundation for heatgrid.
//!
//! Contains:
//! - units (uom SI types + constructors for static pipe parameters)
//! - numeric (Real + tolerances + float helpers)
//! - ids (compact object ids shared by nodes and edges)
//! - series (per-step storage where NaN means "not written yet")
//! - violation (soft constraint kinds and per-step violation maps)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod series;
pub mod units;
pub mod violation;

pub use error::{HgError, HgResult};
pub use ids::*;
pub use numeric::*;
pub use series::{Series, SlotSeries};
pub use units::*;
pub use violation::{ViolationKind, Violations};
