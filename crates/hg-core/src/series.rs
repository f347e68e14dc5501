//! Per-step value storage.
//!
//! Every per-step quantity in the engine starts out as NaN, meaning "not
//! written yet". Reading a cell through [`Series::require`] or
//! [`SlotSeries::require`] turns an unwritten cell into an error instead of
//! letting NaN propagate.

use crate::error::{HgError, HgResult};

/// One value per step.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    values: Vec<f64>,
}

impl Series {
    /// A series of `steps` unknown cells.
    pub fn unknown(steps: usize) -> Self {
        Self::filled(steps, f64::NAN)
    }

    pub fn filled(steps: usize, value: f64) -> Self {
        Self {
            values: vec![value; steps],
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value, NaN if unknown or out of range.
    pub fn get(&self, step: usize) -> f64 {
        self.values.get(step).copied().unwrap_or(f64::NAN)
    }

    /// Value if it has been written.
    pub fn known(&self, step: usize) -> Option<f64> {
        let v = self.get(step);
        if v.is_nan() { None } else { Some(v) }
    }

    pub fn require(&self, step: usize, what: &'static str) -> HgResult<f64> {
        self.known(step)
            .ok_or(HgError::Unwritten { what, slot: 0, step })
    }

    pub fn set(&mut self, step: usize, value: f64) {
        self.values[step] = value;
    }

    /// Write a value, failing instead of panicking on an out-of-range step.
    pub fn try_set(&mut self, step: usize, value: f64, what: &'static str) -> HgResult<()> {
        let len = self.values.len();
        let cell = self.values.get_mut(step).ok_or(HgError::IndexOob {
            what,
            index: step,
            len,
        })?;
        *cell = value;
        Ok(())
    }

    pub fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values in `[start, end)`, clamped to the series length.
    pub fn window(&self, start: usize, end: usize) -> &[f64] {
        let end = end.min(self.values.len());
        let start = start.min(end);
        &self.values[start..end]
    }
}

/// `slots x steps` matrix of per-step values, one row per slot.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotSeries {
    slots: usize,
    steps: usize,
    data: Vec<f64>,
}

impl SlotSeries {
    pub fn unknown(slots: usize, steps: usize) -> Self {
        Self::filled(slots, steps, f64::NAN)
    }

    pub fn filled(slots: usize, steps: usize, value: f64) -> Self {
        Self {
            slots,
            steps,
            data: vec![value; slots * steps],
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    fn offset(&self, slot: usize, step: usize) -> Option<usize> {
        (slot < self.slots && step < self.steps).then_some(slot * self.steps + step)
    }

    /// Raw value, NaN if unknown or out of range.
    pub fn get(&self, slot: usize, step: usize) -> f64 {
        self.offset(slot, step)
            .map_or(f64::NAN, |i| self.data[i])
    }

    pub fn known(&self, slot: usize, step: usize) -> Option<f64> {
        let v = self.get(slot, step);
        if v.is_nan() { None } else { Some(v) }
    }

    pub fn is_known(&self, slot: usize, step: usize) -> bool {
        self.known(slot, step).is_some()
    }

    pub fn require(&self, slot: usize, step: usize, what: &'static str) -> HgResult<f64> {
        self.known(slot, step)
            .ok_or(HgError::Unwritten { what, slot, step })
    }

    pub fn set(&mut self, slot: usize, step: usize, value: f64) {
        let i = slot * self.steps + step;
        debug_assert!(slot < self.slots && step < self.steps);
        self.data[i] = value;
    }

    pub fn try_set(
        &mut self,
        slot: usize,
        step: usize,
        value: f64,
        what: &'static str,
    ) -> HgResult<()> {
        let i = self.offset(slot, step).ok_or(HgError::IndexOob {
            what,
            index: step,
            len: self.steps,
        })?;
        self.data[i] = value;
        Ok(())
    }

    /// Write the same value into every slot at `step`.
    pub fn set_all_slots(&mut self, step: usize, value: f64) {
        for slot in 0..self.slots {
            self.set(slot, step, value);
        }
    }

    /// Overwrite a whole slot row.
    pub fn fill_slot(&mut self, slot: usize, value: f64) {
        self.row_mut(slot).fill(value);
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn row(&self, slot: usize) -> &[f64] {
        &self.data[slot * self.steps..(slot + 1) * self.steps]
    }

    fn row_mut(&mut self, slot: usize) -> &mut [f64] {
        &mut self.data[slot * self.steps..(slot + 1) * self.steps]
    }

    /// Rows cut to `[start, end)`, one vector per slot.
    pub fn window(&self, start: usize, end: usize) -> Vec<Vec<f64>> {
        let end = end.min(self.steps);
        let start = start.min(end);
        (0..self.slots)
            .map(|slot| self.row(slot)[start..end].to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_cells_fail_on_require() {
        let s = SlotSeries::unknown(2, 3);
        let err = s.require(1, 2, "temp").unwrap_err();
        assert_eq!(
            err,
            HgError::Unwritten {
                what: "temp",
                slot: 1,
                step: 2
            }
        );
        assert!(!s.is_known(0, 0));
    }

    #[test]
    fn set_and_read_back() {
        let mut s = SlotSeries::unknown(2, 3);
        s.set(1, 2, 42.0);
        assert_eq!(s.known(1, 2), Some(42.0));
        assert_eq!(s.known(0, 2), None);
        s.set_all_slots(0, 7.0);
        assert_eq!(s.row(0)[0], 7.0);
        assert_eq!(s.row(1)[0], 7.0);
    }

    #[test]
    fn out_of_range_reads_are_unknown() {
        let s = SlotSeries::filled(1, 2, 1.0);
        assert!(s.get(0, 5).is_nan());
        assert!(s.get(3, 0).is_nan());
        assert!(Series::filled(2, 1.0).get(9).is_nan());
    }

    #[test]
    fn try_set_rejects_steps_past_horizon() {
        let mut s = Series::unknown(2);
        assert!(s.try_set(1, 3.0, "q").is_ok());
        assert!(matches!(
            s.try_set(2, 3.0, "q"),
            Err(HgError::IndexOob { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn window_clamps_to_length() {
        let s = Series::from_values(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.window(1, 10), &[2.0, 3.0]);
        let m = SlotSeries::filled(2, 3, 5.0);
        assert_eq!(m.window(0, 2), vec![vec![5.0, 5.0], vec![5.0, 5.0]]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn window_never_leaves_the_series(
                slots in 1usize..4,
                steps in 0usize..20,
                start in 0usize..30,
                len in 0usize..30,
            ) {
                let m = SlotSeries::filled(slots, steps, 1.0);
                let w = m.window(start, start + len);
                prop_assert_eq!(w.len(), slots);
                for row in &w {
                    prop_assert!(row.len() <= len);
                    prop_assert!(row.len() <= steps.saturating_sub(start));
                }
            }
        }
    }
}
