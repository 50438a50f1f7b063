use crate::ac_interface::{LinkIndex, Verdict};

// ============================================================================
// Configuration
// ============================================================================

/// Tuning for the escalating-delay strategy
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct IncreaseConfig {
    /// Induced delay at the start of a pursuit (default: 1.0 s)
    pub initial_delay_s: f64,

    /// Ceiling on the induced delay; reaching it without a conviction
    /// clears the suspect (default: 10.0 s)
    pub delay_limit_s: f64,

    /// How far the counter-attack mean must rise above the baseline mean
    /// to convict (default: 1.0 s)
    pub threshold_s: f64,

    /// Latency samples averaged per decision window (default: 40)
    pub window: usize,

    /// Multiplier applied to the induced delay after each undecided
    /// window (default: 1.02)
    pub growth: f64,
}

impl Default for IncreaseConfig {
    fn default() -> Self {
        Self {
            initial_delay_s: 1.0,
            delay_limit_s: 10.0,
            threshold_s: 1.0,
            window: 40,
            growth: 1.02,
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// Escalating-delay detection.
///
/// True network delay to a suspect is roughly constant. A look-ahead
/// cheater waits to observe others' moves (including the leader's
/// deliberately delayed ones) before stamping its own, so its measured
/// latency rises with the induced delay while an honest peer's stays
/// flat. The strategy first averages a window of samples into a baseline,
/// then keeps raising the delay until the counter-attack window mean
/// exceeds the baseline by the threshold (Cheater) or the delay hits its
/// ceiling (NotCheater).
#[derive(Debug, Clone)]
pub struct IncreaseStrategy {
    config: IncreaseConfig,

    suspect: Option<LinkIndex>,
    counter_attacking: bool,
    delay_s: f64,
    verdict: Verdict,

    /// Mean latency over the window collected before counter-attacking.
    baseline_s: f64,
    /// Mean latency over the current counter-attack window.
    current_s: f64,
    /// Samples accumulated in the running window.
    index: usize,
}

impl IncreaseStrategy {
    pub fn new(config: IncreaseConfig) -> Self {
        let delay_s = config.initial_delay_s;
        Self {
            config,
            suspect: None,
            counter_attacking: false,
            delay_s,
            verdict: Verdict::Unknown,
            baseline_s: 0.0,
            current_s: 0.0,
            index: 0,
        }
    }

    /// Rebind to a new suspect and reset every per-suspect accumulator.
    pub fn set_new_suspect(&mut self, link: Option<LinkIndex>) {
        self.suspect = link;
        self.counter_attacking = false;
        self.delay_s = self.config.initial_delay_s;
        self.verdict = Verdict::Unknown;
        self.baseline_s = 0.0;
        self.current_s = 0.0;
        self.index = 0;
    }

    /// Feed one measured latency sample (seconds).
    ///
    /// Samples arrive pre-divided into the running window mean; a full
    /// window either establishes the baseline, convicts, or escalates.
    pub fn register_delay(&mut self, latency_s: f64) {
        if self.verdict != Verdict::Unknown || self.suspect.is_none() {
            return;
        }

        let share = latency_s / self.config.window as f64;
        if self.counter_attacking {
            self.current_s += share;
        } else {
            self.baseline_s += share;
        }

        self.index += 1;
        if self.index < self.config.window {
            return;
        }
        self.index = 0;

        if !self.counter_attacking {
            // baseline mean complete, the counter-attack can start
            self.counter_attacking = true;
            log::debug!(
                "increase: baseline {:.4}s over {} samples",
                self.baseline_s,
                self.config.window
            );
            return;
        }

        log::debug!(
            "increase: window mean {:.4}s (baseline {:.4}s, threshold {:.2}s)",
            self.current_s,
            self.baseline_s,
            self.config.threshold_s
        );

        if self.current_s >= self.baseline_s + self.config.threshold_s {
            self.verdict = Verdict::Cheater;
        } else {
            self.counter_attack();
        }
    }

    /// Raise the induced delay one growth step and restart the window.
    /// Hitting the ceiling means the latency never followed the delay,
    /// so the suspect is cleared.
    pub fn counter_attack(&mut self) {
        if self.verdict != Verdict::Unknown {
            return;
        }

        self.delay_s *= self.config.growth;
        self.current_s = 0.0;

        log::debug!("increase: induced delay now {:.4}s", self.delay_s);

        if self.delay_s >= self.config.delay_limit_s {
            self.verdict = Verdict::NotCheater;
        }
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

    pub fn is_counter_attacking(&self) -> bool {
        self.counter_attacking
    }
}

// ============================================================================
// Tests
// ============================================================================
