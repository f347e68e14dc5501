//! A contiguous parcel of water inside a pipe.

/// Water that entered a pipe during one step.
///
/// `entry_step` is relative to the pipe's own clock and negative for water
/// that was already in the pipe when the simulation started.
/// `entry_step_global` is the step at which the water left its producer and
/// becomes fractional once streams have been mixed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plug {
    /// kg
    pub mass: f64,
    pub entry_step: i64,
    /// °C
    pub entry_temp: f64,
    pub entry_step_global: f64,
}

impl Plug {
    pub fn new(mass: f64, entry_step: i64, entry_temp: f64, entry_step_global: f64) -> Self {
        Self {
            mass,
            entry_step,
            entry_temp,
            entry_step_global,
        }
    }

    /// Steps spent in the pipe as of `step`.
    pub fn age(&self, step: usize) -> i64 {
        step as i64 - self.entry_step
    }

    /// Split `mass` off this plug, returning the detached part.
    pub fn take(&mut self, mass: f64) -> Plug {
        self.mass -= mass;
        Plug { mass, ..*self }
    }
}
