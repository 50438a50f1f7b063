use crate::ac_interface::SimTime;

/// Tuning for the look-ahead adversary
#[derive(Debug, Clone)]
pub struct CheaterConfig {
    /// Length of one timestamp-collection interval (default: 1.0 s)
    pub interval: SimTime,

    /// Back-stamp offset: the fabricated move claims to predate the
    /// earliest observed move by this much. Doubles as the underflow
    /// floor (default: 1.0 s)
    pub offset: SimTime,
}

impl Default for CheaterConfig {
    fn default() -> Self {
        Self {
            interval: SimTime::from_secs(1),
            offset: SimTime::from_secs(1),
        }
    }
}

/// Look-ahead cheating behavior.
///
/// Instead of moving on its own schedule, the cheater collects incoming
/// moves for a fixed interval, then emits a move stamped just below the
/// minimum timestamp it saw, pretending it had committed first. An
/// interval that saw nothing (or only stamps below the floor) produces
/// an honestly stamped move.
#[derive(Debug, Clone)]
pub struct CheaterState {
    config: CheaterConfig,
    /// Minimum stamp observed in the current interval.
    min_stamp: Option<SimTime>,
}

impl CheaterState {
    pub fn new(config: CheaterConfig) -> Self {
        Self {
            config,
            min_stamp: None,
        }
    }

    /// Track one incoming application-message timestamp.
    pub fn observe(&mut self, stamp: SimTime) {
        match self.min_stamp {
            Some(min) if stamp >= min => {}
            _ => self.min_stamp = Some(stamp),
        }
    }

    /// Close the interval: produce the stamp for the move to emit now
    /// and start collecting afresh.
    pub fn next_stamp(&mut self, now: SimTime) -> SimTime {
        match self.min_stamp.take() {
            Some(min) if min > self.config.offset => min - self.config.offset,
            _ => now,
        }
    }

    pub fn interval(&self) -> SimTime {
        self.config.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> SimTime {
        SimTime::from_secs_f64(s)
    }

    #[test]
    fn test_back_stamps_below_interval_minimum() {
        let mut cheater = CheaterState::new(CheaterConfig::default());

        cheater.observe(secs(2.10));
        cheater.observe(secs(2.05));
        cheater.observe(secs(2.30));

        assert_eq!(cheater.next_stamp(secs(3.0)), secs(1.05));
    }

    #[test]
    fn test_empty_interval_stamps_honestly() {
        let mut cheater = CheaterState::new(CheaterConfig::default());
        assert_eq!(cheater.next_stamp(secs(4.2)), secs(4.2));
    }

    #[test]
    fn test_floor_prevents_underflow() {
        let mut cheater = CheaterState::new(CheaterConfig::default());

        // early stamps sit below the offset floor
        cheater.observe(secs(0.4));
        assert_eq!(cheater.next_stamp(secs(0.9)), secs(0.9));
    }

    #[test]
    fn test_interval_minimum_resets() {
        let mut cheater = CheaterState::new(CheaterConfig::default());

        cheater.observe(secs(2.05));
        let _ = cheater.next_stamp(secs(3.0));

        // next interval starts empty
        assert_eq!(cheater.next_stamp(secs(3.5)), secs(3.5));

        cheater.observe(secs(9.0));
        assert_eq!(cheater.next_stamp(secs(9.5)), secs(8.0));
    }
}
