//! Result data types.

use std::collections::BTreeMap;

use hg_core::{ObjectId, ViolationKind};
use serde::{Deserialize, Serialize};

/// How a per-step quantity is reduced over the solved steps `[0, current)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAggregation {
    /// Sum over all solved steps.
    #[default]
    Summed,
    /// One value per solved step.
    PerStep,
    /// Value of the last solved step.
    Current,
}

/// A quantity reduced by a [`TimeAggregation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Aggregate {
    Value(f64),
    Series(Vec<f64>),
}

impl Aggregate {
    /// Reduce `values[..current_step]`. `Current` on step 0 is NaN.
    pub fn from_steps(values: &[f64], current_step: usize, time: TimeAggregation) -> Self {
        let solved = &values[..current_step.min(values.len())];
        match time {
            TimeAggregation::Summed => Aggregate::Value(solved.iter().sum()),
            TimeAggregation::PerStep => Aggregate::Series(solved.to_vec()),
            TimeAggregation::Current => {
                Aggregate::Value(solved.last().copied().unwrap_or(f64::NAN))
            }
        }
    }

    /// Additive identity of the same shape as `self`.
    pub fn zero_like(&self) -> Self {
        match self {
            Aggregate::Value(_) => Aggregate::Value(0.0),
            Aggregate::Series(v) => Aggregate::Series(vec![0.0; v.len()]),
        }
    }

    pub fn zero(time: TimeAggregation, current_step: usize) -> Self {
        match time {
            TimeAggregation::PerStep => Aggregate::Series(vec![0.0; current_step]),
            _ => Aggregate::Value(0.0),
        }
    }

    /// Elementwise `self += scale * other`; mismatched shapes leave `self` as is.
    pub fn accumulate(&mut self, other: &Aggregate, scale: f64) {
        match (self, other) {
            (Aggregate::Value(a), Aggregate::Value(b)) => *a += scale * b,
            (Aggregate::Series(a), Aggregate::Series(b)) => {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += scale * y;
                }
            }
            _ => {}
        }
    }

    /// Sum of all items, each shaped like `like`.
    pub fn sum<'a>(like: &Aggregate, items: impl IntoIterator<Item = &'a Aggregate>) -> Aggregate {
        let mut total = like.zero_like();
        for item in items {
            total.accumulate(item, 1.0);
        }
        total
    }

    pub fn as_value(&self) -> Option<f64> {
        match self {
            Aggregate::Value(v) => Some(*v),
            Aggregate::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            Aggregate::Value(_) => None,
            Aggregate::Series(v) => Some(v),
        }
    }
}

/// Which per-step arrays an object status query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlags {
    pub temp: bool,
    pub mass_flow: bool,
    pub pressure: bool,
    pub violation: bool,
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self {
            temp: true,
            mass_flow: false,
            pressure: false,
            violation: false,
        }
    }
}

impl StatusFlags {
    pub fn all() -> Self {
        Self {
            temp: true,
            mass_flow: true,
            pressure: true,
            violation: true,
        }
    }
}

/// Per-slot arrays of one object over a step window; empty when not requested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectStatus {
    /// `temp[slot][step - start]`, °C
    pub temp: Vec<Vec<f64>>,
    /// kg/s
    pub mass_flow: Vec<Vec<f64>>,
    /// Pa
    pub pressure: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub violation: BTreeMap<ViolationKind, Vec<f64>>,
}

/// One plug of water as seen at a given step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlugState {
    /// kg
    pub mass: f64,
    /// Temperature at the queried step, °C
    pub temp: f64,
    /// Temperature when the plug entered the pipe, °C
    pub entry_temp: f64,
    /// Pipe-relative step at which the plug entered
    pub entry_step: i64,
}

/// Plug contents of every pipe, inlet end first, at the start of `step`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipeStates {
    pub step: usize,
    pub pipes: BTreeMap<ObjectId, Vec<PlugState>>,
}

impl PipeStates {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Spatial reduction for heat and loss queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatLossLevel {
    /// Whole network
    #[default]
    Grid,
    SupplyReturn,
    PerEdge,
}

/// Heat carried into pipes and heat lost to the ground, in energy units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatAndLoss {
    pub heat: Aggregate,
    pub loss: Aggregate,
}

impl HeatAndLoss {
    pub fn zero_like(&self) -> Self {
        Self {
            heat: self.heat.zero_like(),
            loss: self.loss.zero_like(),
        }
    }

    pub fn accumulate(&mut self, other: &HeatAndLoss) {
        self.heat.accumulate(&other.heat, 1.0);
        self.loss.accumulate(&other.loss, 1.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatLossReport {
    Grid(HeatAndLoss),
    SupplyReturn {
        supply: HeatAndLoss,
        #[serde(rename = "return")]
        return_: HeatAndLoss,
    },
    PerEdge(BTreeMap<ObjectId, HeatAndLoss>),
}

/// Reduction for margin queries, from a single net figure down to every cost component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginLevel {
    /// Profit minus cost over all producers
    #[default]
    Net,
    /// Cost and profit over all producers
    Grid,
    PerProducer,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    /// Pump power
    Pump,
    ProductionCost,
    RampCost,
}

/// Cost components and profit of one producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerMargin {
    pub cost: BTreeMap<CostKind, Aggregate>,
    pub profit: Aggregate,
}

impl ProducerMargin {
    pub fn total(&self) -> CostAndProfit {
        CostAndProfit {
            cost: Aggregate::sum(&self.profit, self.cost.values()),
            profit: self.profit.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAndProfit {
    pub cost: Aggregate,
    pub profit: Aggregate,
}

impl CostAndProfit {
    pub fn net(&self) -> Aggregate {
        let mut net = self.profit.clone();
        net.accumulate(&self.cost, -1.0);
        net
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginReport {
    Net(Aggregate),
    Grid(CostAndProfit),
    PerProducer(BTreeMap<ObjectId, CostAndProfit>),
    Detailed(BTreeMap<ObjectId, ProducerMargin>),
}

impl MarginReport {
    /// Reduce per-producer margins to the requested level.
    pub fn build(
        margins: BTreeMap<ObjectId, ProducerMargin>,
        level: MarginLevel,
        like: &Aggregate,
    ) -> Self {
        if level == MarginLevel::Detailed {
            return MarginReport::Detailed(margins);
        }
        let per_producer: BTreeMap<ObjectId, CostAndProfit> =
            margins.iter().map(|(id, m)| (*id, m.total())).collect();
        if level == MarginLevel::PerProducer {
            return MarginReport::PerProducer(per_producer);
        }
        let grid = CostAndProfit {
            cost: Aggregate::sum(like, per_producer.values().map(|m| &m.cost)),
            profit: Aggregate::sum(like, per_producer.values().map(|m| &m.profit)),
        };
        match level {
            MarginLevel::Grid => MarginReport::Grid(grid),
            _ => MarginReport::Net(grid.net()),
        }
    }
}
