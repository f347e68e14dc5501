//! Soft constraint violations.
//!
//! A violation is a signed per-step magnitude. Zero means the constraint held;
//! a negative value is a shortfall, a positive value an excess.

use std::collections::BTreeMap;
use std::fmt;

use crate::series::Series;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViolationKind {
    SupplyTemp,
    HeatDelivered,
    FlowSpeed,
    HeatRamp,
    ElectricityRamp,
    TempRamp,
    OperationRegion,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 7] = [
        ViolationKind::SupplyTemp,
        ViolationKind::HeatDelivered,
        ViolationKind::FlowSpeed,
        ViolationKind::HeatRamp,
        ViolationKind::ElectricityRamp,
        ViolationKind::TempRamp,
        ViolationKind::OperationRegion,
    ];

    /// Report label.
    pub fn label(self) -> &'static str {
        match self {
            ViolationKind::SupplyTemp => "supply temp",
            ViolationKind::HeatDelivered => "heat delivered",
            ViolationKind::FlowSpeed => "flow speed",
            ViolationKind::HeatRamp => "Q ramp(%)",
            ViolationKind::ElectricityRamp => "E ramp(%)",
            ViolationKind::TempRamp => "temp ramp(degree)",
            ViolationKind::OperationRegion => "operation region(bool)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ViolationKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ViolationKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = <String as serde::Deserialize>::deserialize(deserializer)?;
        ViolationKind::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown violation `{label}`")))
    }
}

/// Per-entity violation map, keyed by kind in a fixed order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Violations {
    steps: usize,
    map: BTreeMap<ViolationKind, Series>,
}

impl Violations {
    /// Unknown series for every kind the entity tracks.
    pub fn new(steps: usize, kinds: &[ViolationKind]) -> Self {
        Self {
            steps,
            map: kinds
                .iter()
                .map(|&k| (k, Series::unknown(steps)))
                .collect(),
        }
    }

    pub fn record(&mut self, kind: ViolationKind, step: usize, value: f64) {
        let steps = self.steps;
        self.map
            .entry(kind)
            .or_insert_with(|| Series::unknown(steps))
            .set(step, value);
    }

    pub fn get(&self, kind: ViolationKind) -> Option<&Series> {
        self.map.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViolationKind, &Series)> {
        self.map.iter().map(|(&k, s)| (k, s))
    }

    /// Values written at `step`, skipping kinds that were not evaluated.
    pub fn at_step(&self, step: usize) -> BTreeMap<ViolationKind, f64> {
        self.map
            .iter()
            .filter_map(|(&k, s)| s.known(step).map(|v| (k, v)))
            .collect()
    }

    /// Reset every tracked series to unknown.
    pub fn clear(&mut self) {
        for series in self.map.values_mut() {
            series.fill(f64::NAN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for kind in ViolationKind::ALL {
            assert_eq!(ViolationKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(ViolationKind::from_label("pressure"), None);
    }

    #[test]
    fn record_and_query_one_step() {
        let mut v = Violations::new(3, &[ViolationKind::SupplyTemp]);
        v.record(ViolationKind::SupplyTemp, 1, -2.5);
        v.record(ViolationKind::HeatDelivered, 1, 0.0);
        let step = v.at_step(1);
        assert_eq!(step[&ViolationKind::SupplyTemp], -2.5);
        assert_eq!(step[&ViolationKind::HeatDelivered], 0.0);
        assert!(v.at_step(0).is_empty());

        v.clear();
        assert!(v.at_step(1).is_empty());
    }
}
