/// A simulation clock that tracks fixed-length steps from a start time.
///
/// Each tick yields the step index and the time at the *end* of that step,
/// so the first tick is strictly later than the start time.
///
/// # Examples
///
/// ```
/// use ess_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(0.0, 900.0, 3);
/// let mut times = Vec::new();
///
/// clock.run(|_, t| times.push(t));
/// assert_eq!(times, vec![900.0, 1800.0, 2700.0]);
/// ```
pub struct Clock {
    /// Current step of the simulation
    current: usize,
    /// Total steps to run in the simulation
    total: usize,
    start_s: f64,
    step_s: f64,
}

impl Clock {
    /// Creates a new clock.
    ///
    /// # Arguments
    ///
    /// * `start_s` - Time before the first step, s
    /// * `step_s` - Step length, s
    /// * `total` - The total number of steps the clock will run
    pub fn new(start_s: f64, step_s: f64, total: usize) -> Self {
        Self {
            current: 0,
            total,
            start_s,
            step_s,
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some((step, time_s))` - Step index (from 0) and the time at its end
    /// * `None` - If the clock has reached its total steps
    pub fn tick(&mut self) -> Option<(usize, f64)> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some((step, self.start_s + self.current as f64 * self.step_s))
        } else {
            None
        }
    }

    /// Steps not yet ticked.
    pub fn remaining(&self) -> usize {
        self.total - self.current
    }

    /// Runs a function for each remaining step in the clock.
    pub fn run(&mut self, mut f: impl FnMut(usize, f64)) {
        while let Some((step, time_s)) = self.tick() {
            f(step, time_s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_ends_one_step_after_start() {
        let mut clock = Clock::new(100.0, 50.0, 2);
        assert_eq!(clock.remaining(), 2);
        assert_eq!(clock.tick(), Some((0, 150.0)));
        assert_eq!(clock.remaining(), 1);
        assert_eq!(clock.tick(), Some((1, 200.0)));
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.remaining(), 0);
    }

    #[test]
    fn run_resumes_after_manual_ticks() {
        let mut clock = Clock::new(0.0, 3600.0, 4);
        clock.tick();
        let mut steps = Vec::new();
        clock.run(|step, _| steps.push(step));
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn zero_steps_never_calls_back() {
        let mut clock = Clock::new(0.0, 1.0, 0);
        let mut called = false;
        clock.run(|_, _| called = true);
        assert!(!called);
    }
}
