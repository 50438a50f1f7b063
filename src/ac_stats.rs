use crate::ac_interface::Verdict;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Detection Outcome Tally
// ============================================================================

// Process-wide accumulators, written wherever verdicts are compared with
// ground truth and read once when a run finishes. Reset explicitly at
// run start.
static TRUE_POSITIVES: AtomicU64 = AtomicU64::new(0);
static FALSE_POSITIVES: AtomicU64 = AtomicU64::new(0);
static TRUE_NEGATIVES: AtomicU64 = AtomicU64::new(0);
static FALSE_NEGATIVES: AtomicU64 = AtomicU64::new(0);

/// Zero the tally. Call once at the start of every run.
pub fn reset_outcome_tally() {
    TRUE_POSITIVES.store(0, Ordering::Relaxed);
    FALSE_POSITIVES.store(0, Ordering::Relaxed);
    TRUE_NEGATIVES.store(0, Ordering::Relaxed);
    FALSE_NEGATIVES.store(0, Ordering::Relaxed);
}

/// Score one settled verdict against ground truth. `Unknown` verdicts
/// are not outcomes and are ignored.
pub fn record_outcome(verdict: Verdict, truly_cheater: bool) {
    let counter = match (verdict, truly_cheater) {
        (Verdict::Cheater, true) => &TRUE_POSITIVES,
        (Verdict::Cheater, false) => &FALSE_POSITIVES,
        (Verdict::NotCheater, false) => &TRUE_NEGATIVES,
        (Verdict::NotCheater, true) => &FALSE_NEGATIVES,
        (Verdict::Unknown, _) => return,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Snapshot of the tally with derived quality metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutcomeReport {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
}

/// Read the current tally.
pub fn outcome_report() -> OutcomeReport {
    OutcomeReport {
        true_positives: TRUE_POSITIVES.load(Ordering::Relaxed),
        false_positives: FALSE_POSITIVES.load(Ordering::Relaxed),
        true_negatives: TRUE_NEGATIVES.load(Ordering::Relaxed),
        false_negatives: FALSE_NEGATIVES.load(Ordering::Relaxed),
    }
}

impl OutcomeReport {
    pub fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    /// Fraction of accusations that were right. `None` with no
    /// accusations at all.
    pub fn precision(&self) -> Option<f64> {
        let accused = self.true_positives + self.false_positives;
        if accused == 0 {
            return None;
        }
        Some(self.true_positives as f64 / accused as f64)
    }

    /// Fraction of cheater verdicts among actual cheaters. `None` when
    /// no cheater was ever examined.
    pub fn recall(&self) -> Option<f64> {
        let cheaters = self.true_positives + self.false_negatives;
        if cheaters == 0 {
            return None;
        }
        Some(self.true_positives as f64 / cheaters as f64)
    }

    /// Harmonic mean of precision and recall.
    pub fn f_measure(&self) -> Option<f64> {
        let p = self.precision()?;
        let r = self.recall()?;
        if p + r == 0.0 {
            return Some(0.0);
        }
        Some(2.0 * p * r / (p + r))
    }
}

impl fmt::Display for OutcomeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn metric(value: Option<f64>) -> String {
            match value {
                Some(v) => format!("{:.3}", v),
                None => "n/a".to_string(),
            }
        }
        write!(
            f,
            "tp={} fp={} tn={} fn={} precision={} recall={} f-measure={}",
            self.true_positives,
            self.false_positives,
            self.true_negatives,
            self.false_negatives,
            metric(self.precision()),
            metric(self.recall()),
            metric(self.f_measure()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // single test so the process-wide tally is not shared across
    // concurrently running test threads
    #[test]
    fn test_tally_records_and_resets() {
        reset_outcome_tally();

        record_outcome(Verdict::Cheater, true);
        record_outcome(Verdict::Cheater, true);
        record_outcome(Verdict::Cheater, false);
        record_outcome(Verdict::NotCheater, false);
        record_outcome(Verdict::NotCheater, true);
        record_outcome(Verdict::Unknown, true);

        let report = outcome_report();
        assert_eq!(report.true_positives, 2);
        assert_eq!(report.false_positives, 1);
        assert_eq!(report.true_negatives, 1);
        assert_eq!(report.false_negatives, 1);
        assert_eq!(report.total(), 5);

        reset_outcome_tally();
        assert_eq!(outcome_report().total(), 0);
    }

    #[test]
    fn test_report_metrics() {
        let report = OutcomeReport {
            true_positives: 8,
            false_positives: 2,
            true_negatives: 5,
            false_negatives: 2,
        };

        assert_eq!(report.precision(), Some(0.8));
        assert_eq!(report.recall(), Some(0.8));
        let f = report.f_measure().unwrap();
        assert!((f - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_report_metrics_without_samples() {
        let report = OutcomeReport::default();
        assert_eq!(report.precision(), None);
        assert_eq!(report.recall(), None);
        assert_eq!(report.f_measure(), None);
    }
}
