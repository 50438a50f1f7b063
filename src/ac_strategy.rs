use crate::ac_correlation::{CorrelationConfig, CorrelationStrategy};
use crate::ac_increase::{IncreaseConfig, IncreaseStrategy};
use crate::ac_interface::{LinkIndex, SimTime, Verdict};
use rand::rngs::StdRng;

// ============================================================================
// Strategy Selection
// ============================================================================

/// Which detection strategy a peer runs, with its tuning.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyConfig {
    Increase(IncreaseConfig),
    Correlation(CorrelationConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Increase(IncreaseConfig::default())
    }
}

impl StrategyConfig {
    /// Instantiate the configured strategy. The correlation variant owns
    /// the RNG it draws probe delays from.
    pub fn build(&self, rng: StdRng) -> DetectionStrategy {
        match self {
            StrategyConfig::Increase(config) => {
                DetectionStrategy::Increase(IncreaseStrategy::new(config.clone()))
            }
            StrategyConfig::Correlation(config) => {
                DetectionStrategy::Correlation(CorrelationStrategy::new(config.clone(), rng))
            }
        }
    }
}

// ============================================================================
// Detection Strategy
// ============================================================================

/// The closed family of detection strategies.
///
/// Every variant answers the same four-operation contract: rebind to a
/// suspect, ingest a latency sample, escalate the induced delay, report
/// the latched verdict.
pub enum DetectionStrategy {
    Increase(IncreaseStrategy),
    Correlation(CorrelationStrategy),
}

impl DetectionStrategy {
    pub fn set_new_suspect(&mut self, link: Option<LinkIndex>) {
        match self {
            DetectionStrategy::Increase(s) => s.set_new_suspect(link),
            DetectionStrategy::Correlation(s) => s.set_new_suspect(link),
        }
    }

    pub fn register_delay(&mut self, latency_s: f64) {
        match self {
            DetectionStrategy::Increase(s) => s.register_delay(latency_s),
            DetectionStrategy::Correlation(s) => s.register_delay(latency_s),
        }
    }

    pub fn counter_attack(&mut self) {
        match self {
            DetectionStrategy::Increase(s) => s.counter_attack(),
            DetectionStrategy::Correlation(s) => s.counter_attack(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            DetectionStrategy::Increase(s) => s.verdict(),
            DetectionStrategy::Correlation(s) => s.verdict(),
        }
    }

    pub fn suspect(&self) -> Option<LinkIndex> {
        match self {
            DetectionStrategy::Increase(s) => s.suspect(),
            DetectionStrategy::Correlation(s) => s.suspect(),
        }
    }

    /// Current artificial delay toward the suspect. A strategy configured
    /// with negative delays induces none.
    pub fn induced_delay(&self) -> SimTime {
        let secs = match self {
            DetectionStrategy::Increase(s) => s.induced_delay_s(),
            DetectionStrategy::Correlation(s) => s.induced_delay_s(),
        };
        // from_secs_f64 rejects negative input
        SimTime::from_secs_f64(secs.max(0.0))
    }

    /// Whether the leader should divert moves toward the suspect through
    /// the delayed-probe path. Increase holds off until its baseline is
    /// in; correlation probes from the first sample.
    pub fn is_counter_attacking(&self) -> bool {
        match self {
            DetectionStrategy::Increase(s) => s.is_counter_attacking(),
            DetectionStrategy::Correlation(s) => s.is_counter_attacking(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DetectionStrategy::Increase(_) => "increase",
            DetectionStrategy::Correlation(_) => "correlation",
        }
    }
}
