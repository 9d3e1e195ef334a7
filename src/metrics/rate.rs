//! CPU rate from cumulative counters.

/// Previous CPU sample. Zeroed at start, so the first computation yields 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateState {
    pub previous_cpu_sys: f64,
    pub previous_cpu_user: f64,
    /// Seconds since the Unix epoch; 0 means no previous sample
    pub previous_timestamp: f64,
}

impl RateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample and return the CPU percentage since the previous one,
    /// clamped to [0, 100].
    pub fn cpu_percent(&mut self, cpu_sys: f64, cpu_user: f64, now_secs: f64) -> f64 {
        let had_sample = self.previous_timestamp > 0.0;
        let delta_t = now_secs - self.previous_timestamp;
        let delta_cpu = (cpu_sys + cpu_user) - (self.previous_cpu_sys + self.previous_cpu_user);

        self.previous_cpu_sys = cpu_sys;
        self.previous_cpu_user = cpu_user;
        self.previous_timestamp = now_secs;

        if !had_sample || delta_t <= 0.0 {
            return 0.0;
        }

        let percent = delta_cpu / delta_t * 100.0;
        if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_zero() {
        let mut state = RateState::new();
        assert_eq!(state.cpu_percent(12.0, 30.0, 1_700_000_000.0), 0.0);
        assert_eq!(state.previous_cpu_sys, 12.0);
    }

    #[test]
    fn rate_is_cpu_delta_over_time_delta() {
        let mut state = RateState::new();
        state.cpu_percent(1.0, 1.0, 100.0);
        // 0.5s of CPU over 2s
        let percent = state.cpu_percent(1.25, 1.25, 102.0);
        assert!((percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn rate_is_clamped() {
        let mut state = RateState::new();
        state.cpu_percent(0.0, 0.0, 10.0);
        assert_eq!(state.cpu_percent(50.0, 50.0, 11.0), 100.0);
        // Counter reset after a store restart
        assert_eq!(state.cpu_percent(0.0, 0.0, 12.0), 0.0);
    }

    #[test]
    fn non_positive_time_delta_is_zero() {
        let mut state = RateState::new();
        state.cpu_percent(1.0, 1.0, 10.0);
        assert_eq!(state.cpu_percent(2.0, 2.0, 10.0), 0.0);
        assert_eq!(state.cpu_percent(3.0, 3.0, 9.0), 0.0);
    }
}
