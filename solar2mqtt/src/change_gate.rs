use std::collections::HashMap;

use log::{debug, warn};

/// Remembers the last published value per metric slug and suppresses
/// publishes that would not change it by at least `epsilon`.
///
/// Nothing is persisted: after a restart the first value of every metric is
/// published again.
#[derive(Debug, Default)]
pub struct ChangeGate {
    epsilon: f64,
    last: HashMap<String, f64>,
}

impl ChangeGate {
    /// `None` means an epsilon of 0. Negative or non-finite values fall back to 0.
    pub fn new(epsilon: Option<f64>) -> Self {
        let epsilon = match epsilon {
            Some(eps) if eps.is_finite() && eps >= 0.0 => eps,
            Some(eps) => {
                warn!("ignoring invalid change epsilon {eps}, using 0");
                0.0
            }
            None => 0.0,
        };
        Self {
            epsilon,
            last: HashMap::new(),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// True iff a value was recorded for `slug` and `value` lies strictly
    /// closer than epsilon to it.
    pub fn should_skip(&self, slug: &str, value: f64) -> bool {
        match self.last.get(slug) {
            Some(&previous) if (previous - value).abs() < self.epsilon => {
                debug!(
                    "No change for '{slug}' (prev={previous:.6}, new={value:.6}, eps={}) - skipping publish",
                    self.epsilon
                );
                true
            }
            _ => false,
        }
    }

    /// Must only be called once `value` was actually published.
    pub fn record(&mut self, slug: &str, value: f64) {
        self.last.insert(slug.to_string(), value);
    }

    pub fn last(&self, slug: &str) -> Option<f64> {
        self.last.get(slug).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_is_never_skipped() {
        let gate = ChangeGate::new(Some(1_000.0));
        assert!(!gate.should_skip("solar_total", 0.0));
        assert!(!gate.should_skip("solar_total", f64::MAX));
    }

    #[test]
    fn zero_epsilon_never_skips() {
        // a difference of 0 is not strictly below an epsilon of 0
        let mut gate = ChangeGate::new(None);
        gate.record("grid_import", 12.5);

        assert!(!gate.should_skip("grid_import", 12.5));
        assert!(!gate.should_skip("grid_import", 12.500001));
    }

    #[test]
    fn difference_equal_to_epsilon_is_published() {
        let mut gate = ChangeGate::new(Some(0.5));
        gate.record("grid_export", 10.0);

        assert!(gate.should_skip("grid_export", 10.25));
        assert!(gate.should_skip("grid_export", 9.75));
        assert!(!gate.should_skip("grid_export", 10.5));
        assert!(!gate.should_skip("grid_export", 9.5));
        assert!(!gate.should_skip("grid_export", 11.0));
    }

    #[test]
    fn record_overwrites_previous_value() {
        let mut gate = ChangeGate::new(Some(0.1));
        gate.record("solar_total", 1.0);
        gate.record("solar_total", 2.0);

        assert_eq!(gate.last("solar_total"), Some(2.0));
        assert!(gate.should_skip("solar_total", 2.05));
        assert!(!gate.should_skip("solar_total", 1.0));
    }

    #[test]
    fn slugs_are_tracked_independently() {
        let mut gate = ChangeGate::new(Some(0.1));
        gate.record("solar_total", 1.0);

        assert!(gate.should_skip("solar_total", 1.0));
        assert!(!gate.should_skip("grid_import", 1.0));
    }

    #[test]
    fn invalid_epsilon_means_exact_comparison() {
        assert_eq!(ChangeGate::new(Some(-1.0)).epsilon(), 0.0);
        assert_eq!(ChangeGate::new(Some(f64::NAN)).epsilon(), 0.0);
        assert_eq!(ChangeGate::new(Some(0.25)).epsilon(), 0.25);
    }
}
