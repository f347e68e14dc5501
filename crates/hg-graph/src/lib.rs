//! hg-graph: topology layer for heatgrid.
//!
//! Provides:
//! - Node kinds with their slot layout (which slots take water in, which send it out)
//! - Incremental topology builder with validation of every slot link
//! - Slot-indexed adjacency (node slot -> edge)
//! - Object index mapping user-facing ids to arena handles
//! - Supply/return classification of every edge
//!
//! # Example
//!
//! ```
//! use hg_graph::{Endpoint, NodeKind, Side, TopologyBuilder};
//!
//! let mut builder = TopologyBuilder::new();
//! let plant = builder.add_node("plant", NodeKind::Producer);
//! let house = builder.add_node("house", NodeKind::Consumer);
//! let supply = builder.add_edge("supply", Endpoint::new(plant, 1), Endpoint::new(house, 0));
//! let ret = builder.add_edge("return", Endpoint::new(house, 1), Endpoint::new(plant, 0));
//! let topology = builder.build().unwrap();
//!
//! assert_eq!(topology.slot_edge(plant, 1), Some(supply));
//! assert_eq!(topology.side(supply), Some(Side::Supply));
//! assert_eq!(topology.side(ret), Some(Side::Return));
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub mod indexing;
pub(crate) mod sides;
pub(crate) mod validate;

pub use builder::TopologyBuilder;
pub use error::GraphError;
pub use graph::{Edge, Endpoint, Node, NodeKind, Side, SlotDirection, Topology};
pub use indexing::{Handle, ObjectIndex};
