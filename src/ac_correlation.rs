use crate::ac_interface::{LinkIndex, Verdict};
use rand::rngs::StdRng;
use rand::Rng;

// ============================================================================
// Configuration
// ============================================================================

/// Tuning for the correlation strategy
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Number of (induced delay, observed mean) pairs collected before
    /// the verdict (default: 20)
    pub repetitions: usize,

    /// Correlation magnitude at or above which the suspect is convicted
    /// (default: 0.5)
    pub min_correlation: f64,

    /// Latency samples averaged into each round's observation
    /// (default: 8)
    pub window: usize,

    /// Bounds for the uniformly drawn induced delay, seconds
    /// (default: 0.0 .. 1.0)
    pub delay_range_s: (f64, f64),
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            repetitions: 20,
            min_correlation: 0.5,
            window: 8,
            delay_range_s: (0.0, 1.0),
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// Random-delay correlation detection.
///
/// Each round the leader holds its move toward the suspect for a freshly
/// drawn random delay and records the suspect's mean measured latency for
/// that round. A peer that waits on the leader's moves ends up echoing
/// the random delays in its own latency, so after `repetitions` rounds
/// the Pearson correlation between sent delays and observed means is
/// close to one for a cheater and near zero for an honest peer.
pub struct CorrelationStrategy {
    config: CorrelationConfig,
    rng: StdRng,

    suspect: Option<LinkIndex>,
    delay_s: f64,
    verdict: Verdict,

    /// Induced delay applied during round i.
    sent: Vec<f64>,
    /// Mean measured latency observed during round i.
    received: Vec<f64>,
    /// Current round, index into `sent`/`received`.
    round: usize,
    /// Running mean for the current round's window.
    acc_s: f64,
    /// Samples accumulated in the current round's window.
    index: usize,
}

impl CorrelationStrategy {
    pub fn new(mut config: CorrelationConfig, rng: StdRng) -> Self {
        // rounds index the sample buffers and the window mean divides by
        // window; a zero-length schedule is clamped to one slot of each
        config.repetitions = config.repetitions.max(1);
        config.window = config.window.max(1);
        let repetitions = config.repetitions;
        Self {
            config,
            rng,
            suspect: None,
            delay_s: 0.0,
            verdict: Verdict::Unknown,
            sent: vec![0.0; repetitions],
            received: vec![0.0; repetitions],
            round: 0,
            acc_s: 0.0,
            index: 0,
        }
    }

    /// Rebind to a new suspect. The first round's delay is drawn right
    /// away so the delay in force always matches the round being
    /// recorded.
    pub fn set_new_suspect(&mut self, link: Option<LinkIndex>) {
        self.suspect = link;
        self.verdict = Verdict::Unknown;
        self.round = 0;
        self.acc_s = 0.0;
        self.index = 0;
        // sent/received are fully rewritten round by round
        if link.is_some() {
            self.counter_attack();
        }
    }

    /// Feed one measured latency sample (seconds). A full window closes
    /// the round; the last round computes the verdict.
    pub fn register_delay(&mut self, latency_s: f64) {
        if self.verdict != Verdict::Unknown || self.suspect.is_none() {
            return;
        }

        self.acc_s += latency_s / self.config.window as f64;
        self.index += 1;
        if self.index < self.config.window {
            return;
        }

        self.received[self.round] = self.acc_s;
        log::debug!(
            "correlation: round {} sent {:.4}s received {:.4}s",
            self.round,
            self.sent[self.round],
            self.acc_s
        );

        self.acc_s = 0.0;
        self.index = 0;
        self.round += 1;

        if self.round == self.config.repetitions {
            self.finish();
        } else {
            self.counter_attack();
        }
    }

    /// Draw the next round's induced delay.
    pub fn counter_attack(&mut self) {
        if self.verdict != Verdict::Unknown || self.round >= self.config.repetitions {
            return;
        }

        let (lo, hi) = self.config.delay_range_s;
        // a collapsed range means a fixed probe delay, not a panic
        self.delay_s = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
        self.sent[self.round] = self.delay_s;
    }

    fn finish(&mut self) {
        self.verdict = match self.correlation_index() {
            Some(r) if r.abs() >= self.config.min_correlation => Verdict::Cheater,
            // includes the degenerate zero-variance case
            _ => Verdict::NotCheater,
        };
    }

    /// Pearson correlation over the collected rounds (population
    /// statistics). `None` when either series has zero variance.
    pub fn correlation_index(&self) -> Option<f64> {
        let n = self.config.repetitions as f64;

        let mean_sent: f64 = self.sent.iter().sum::<f64>() / n;
        let mean_received: f64 = self.received.iter().sum::<f64>() / n;

        let mut var_sent = 0.0;
        let mut var_received = 0.0;
        let mut covariance = 0.0;
        for i in 0..self.config.repetitions {
            let ds = self.sent[i] - mean_sent;
            let dr = self.received[i] - mean_received;
            var_sent += ds * ds;
            var_received += dr * dr;
            covariance += ds * dr;
        }
        var_sent /= n;
        var_received /= n;
        covariance /= n;

        if var_sent <= 0.0 || var_received <= 0.0 {
            return None;
        }
        Some(covariance / (var_sent.sqrt() * var_received.sqrt()))
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn suspect(&self) -> Option<LinkIndex> {
        self.suspect
    }

    pub fn induced_delay_s(&self) -> f64 {
        self.delay_s
    }

    /// The correlation probe delays from the first sample on.
    pub fn is_counter_attacking(&self) -> bool {
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_strategy(repetitions: usize, window: usize, min_correlation: f64) -> CorrelationStrategy {
        let config = CorrelationConfig {
            repetitions,
            window,
            min_correlation,
            ..CorrelationConfig::default()
        };
        CorrelationStrategy::new(config, StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_echoed_delays_convict() {
        let mut strategy = test_strategy(10, 2, 0.9);
        strategy.set_new_suspect(Some(1));

        // The suspect's latency follows the induced delay exactly, plus
        // constant network delay: correlation 1.0.
        let mut fed = 0;
        while strategy.verdict() == Verdict::Unknown {
            let latency = 0.02 + strategy.induced_delay_s();
            strategy.register_delay(latency);
            fed += 1;
        }

        assert_eq!(strategy.verdict(), Verdict::Cheater);
        // verdict lands exactly when the last round's window closes
        assert_eq!(fed, 10 * 2);
    }

    #[test]
    fn test_inverted_delays_convict_by_magnitude() {
        let mut strategy = test_strategy(10, 2, 0.9);
        strategy.set_new_suspect(Some(1));

        while strategy.verdict() == Verdict::Unknown {
            let latency = 1.5 - strategy.induced_delay_s();
            strategy.register_delay(latency);
        }

        // correlation is -1.0; magnitude convicts
        assert_eq!(strategy.verdict(), Verdict::Cheater);
        let r = strategy.correlation_index().unwrap();
        assert!(r < -0.99);
    }

    #[test]
    fn test_flat_latency_clears() {
        let mut strategy = test_strategy(10, 2, 0.5);
        strategy.set_new_suspect(Some(0));

        // An honest peer shows the same latency no matter what delay the
        // leader draws: zero variance on the received side.
        for _ in 0..(10 * 2) {
            strategy.register_delay(0.05);
        }

        assert_eq!(strategy.verdict(), Verdict::NotCheater);
        assert_eq!(strategy.correlation_index(), None);
    }

    #[test]
    fn test_uncorrelated_latency_clears() {
        let mut strategy = test_strategy(20, 3, 0.8);
        strategy.set_new_suspect(Some(1));

        // Honest latency varies with the link, not with the induced
        // delay: drawn from a stream of its own, it tracks nothing.
        let mut link = StdRng::seed_from_u64(7);
        while strategy.verdict() == Verdict::Unknown {
            strategy.register_delay(link.gen_range(0.0..1.5));
        }

        assert_eq!(strategy.verdict(), Verdict::NotCheater);
        let r = strategy.correlation_index().unwrap();
        assert!(r.is_finite());
        assert!(
            r.abs() < 0.8,
            "independent draws came out correlated: r = {}",
            r
        );
    }

    #[test]
    fn test_partial_echo_stays_above_threshold() {
        let mut strategy = test_strategy(16, 4, 0.5);
        strategy.set_new_suspect(Some(2));

        // Half the delay leaks into the latency; still plainly correlated.
        while strategy.verdict() == Verdict::Unknown {
            let latency = 0.05 + 0.5 * strategy.induced_delay_s();
            strategy.register_delay(latency);
        }

        assert_eq!(strategy.verdict(), Verdict::Cheater);
    }

    #[test]
    fn test_set_new_suspect_restarts_rounds() {
        let mut strategy = test_strategy(6, 2, 0.9);
        strategy.set_new_suspect(Some(0));

        while strategy.verdict() == Verdict::Unknown {
            let latency = 0.02 + strategy.induced_delay_s();
            strategy.register_delay(latency);
        }
        assert_eq!(strategy.verdict(), Verdict::Cheater);

        strategy.set_new_suspect(Some(3));
        assert_eq!(strategy.verdict(), Verdict::Unknown);
        assert_eq!(strategy.suspect(), Some(3));

        // the rebound pursuit runs its full course again
        let mut fed = 0;
        while strategy.verdict() == Verdict::Unknown {
            strategy.register_delay(0.02 + strategy.induced_delay_s());
            fed += 1;
        }
        assert_eq!(fed, 6 * 2);
    }

    #[test]
    fn test_samples_without_suspect_are_ignored() {
        let mut strategy = test_strategy(4, 2, 0.5);

        for _ in 0..20 {
            strategy.register_delay(0.5);
        }
        assert_eq!(strategy.verdict(), Verdict::Unknown);
    }

    #[test]
    fn test_zero_length_schedule_clears() {
        let mut strategy = test_strategy(0, 0, 0.5);
        strategy.set_new_suspect(Some(4));

        // clamped to a single one-sample round, which leaves nothing
        // to correlate
        for _ in 0..3 {
            strategy.register_delay(0.2);
        }

        assert_eq!(strategy.verdict(), Verdict::NotCheater);
        assert_eq!(strategy.correlation_index(), None);
    }
}
