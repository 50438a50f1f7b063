// Cheat Detection Simulator Statistics

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use acdc_rust::{DetectionEvent, DetectionSink, OutcomeReport, PeerId, SimTime, Verdict};

// ============================================================================
// Event Recording
// ============================================================================

/// One protocol event with its origin and simulated time
#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub time: SimTime,
    pub peer: PeerId,
    pub event: DetectionEvent,
}

/// Sink that appends every event to a log shared with the runner
pub struct RecordingSink {
    log: Rc<RefCell<Vec<LoggedEvent>>>,
}

impl RecordingSink {
    pub fn new(log: Rc<RefCell<Vec<LoggedEvent>>>) -> Self {
        Self { log }
    }
}

impl DetectionSink for RecordingSink {
    fn log(&mut self, now: SimTime, peer: PeerId, event: DetectionEvent) {
        self.log.borrow_mut().push(LoggedEvent {
            time: now,
            peer,
            event,
        });
    }
}

// ============================================================================
// Simulation Result
// ============================================================================

/// Complete simulation result
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Configuration summary
    pub config_summary: String,

    /// Random seed used
    pub seed_used: u64,

    /// Simulated time reached, seconds
    pub sim_time_s: f64,

    /// Peer ids in creation order (index-aligned with the config)
    pub peer_ids: Vec<PeerId>,

    /// Peers that truly cheated
    pub true_cheaters: Vec<PeerId>,

    /// Every verdict any leader reached
    pub verdicts: Vec<VerdictRecord>,

    /// Every majority exclusion
    pub exclusions: Vec<ExclusionRecord>,

    /// Detection quality over all verdicts
    pub outcome: OutcomeReport,

    /// How often the token changed hands
    pub leadership_changes: usize,

    /// Tokens passed along by peers that had already voted
    pub tokens_relayed: usize,

    /// Message traffic by kind
    pub messages: MessageCounts,

    /// Leader-side latency measurements toward suspects
    pub latency_series: Vec<LatencyPoint>,

    /// Active-peer count as seen by each surviving node at the end
    pub final_active_view: Vec<usize>,
}

/// One verdict as it happened
#[derive(Debug, Clone)]
pub struct VerdictRecord {
    pub time_s: f64,
    pub leader: PeerId,
    pub suspect: PeerId,
    pub verdict: Verdict,
    pub votes: u32,
    pub elapsed_s: f64,
}

/// One majority exclusion
#[derive(Debug, Clone)]
pub struct ExclusionRecord {
    pub time_s: f64,
    pub leader: PeerId,
    pub excluded: PeerId,
    pub votes: u32,
}

/// One measured latency sample, with the delay the leader was inducing
/// at that moment
#[derive(Debug, Clone)]
pub struct LatencyPoint {
    pub time_s: f64,
    pub leader: PeerId,
    pub suspect: PeerId,
    pub latency_s: f64,
    pub induced_delay_s: f64,
}

/// Message traffic by kind
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCounts {
    pub moves: u64,
    pub delayed_moves: u64,
    pub tokens: u64,
    pub info: u64,
}

impl MessageCounts {
    pub fn total(&self) -> u64 {
        self.moves + self.delayed_moves + self.tokens + self.info
    }
}

// ============================================================================
// Reporting
// ============================================================================

impl SimulationResult {
    /// Average detection round length across concluded verdicts.
    pub fn mean_verdict_elapsed_s(&self) -> Option<f64> {
        if self.verdicts.is_empty() {
            return None;
        }
        Some(self.verdicts.iter().map(|v| v.elapsed_s).sum::<f64>() / self.verdicts.len() as f64)
    }

    /// True when every cheater was excluded and nobody honest was.
    pub fn detection_complete(&self) -> bool {
        self.true_cheaters
            .iter()
            .all(|c| self.exclusions.iter().any(|e| e.excluded == *c))
            && self
                .exclusions
                .iter()
                .all(|e| self.true_cheaters.contains(&e.excluded))
    }

    fn short(&self, peer: PeerId) -> String {
        match self.peer_ids.iter().position(|p| *p == peer) {
            Some(index) => format!("peer{}", index),
            None => format!("{:#x}", peer),
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║    CHEAT DETECTION SIMULATION RESULTS                  ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration: {}", self.config_summary);
        println!("Seed: {}", self.seed_used);
        println!("Simulated time: {:.0} s", self.sim_time_s);
        println!();

        println!("═══ Exclusions ═══");
        if self.exclusions.is_empty() {
            println!("  (none)");
        }
        for e in &self.exclusions {
            println!(
                "  {:8.1}s  {} excluded {} with {} votes",
                e.time_s,
                self.short(e.leader),
                self.short(e.excluded),
                e.votes
            );
        }
        println!();

        println!("═══ Verdicts ═══");
        let accusations = self
            .verdicts
            .iter()
            .filter(|v| v.verdict == Verdict::Cheater)
            .count();
        println!("  Total: {}", self.verdicts.len());
        println!("  Cheater: {}", accusations);
        println!("  NotCheater: {}", self.verdicts.len() - accusations);
        if let Some(mean) = self.mean_verdict_elapsed_s() {
            println!("  Avg round: {:.1} s", mean);
        }
        println!();

        println!("═══ Detection Quality ═══");
        println!("  {}", self.outcome);
        println!(
            "  Network cleaned: {}",
            if self.detection_complete() { "yes" } else { "no" }
        );
        println!();

        println!("═══ Token Circulation ═══");
        println!("  Leadership changes: {}", self.leadership_changes);
        println!("  Relayed (already voted): {}", self.tokens_relayed);
        println!();

        println!("═══ Message Overhead ═══");
        println!("  Total: {}", self.messages.total());
        println!("  Moves: {}", self.messages.moves);
        println!("  Delayed moves: {}", self.messages.delayed_moves);
        println!("  Tokens: {}", self.messages.tokens);
        println!("  Info: {}", self.messages.info);
        println!();

        println!("═══ Final Network View ═══");
        let min = self.final_active_view.iter().min().copied().unwrap_or(0);
        let max = self.final_active_view.iter().max().copied().unwrap_or(0);
        println!(
            "  Active peers seen: min={}, max={} (of {})",
            min,
            max,
            self.peer_ids.len()
        );
        println!();
    }

    /// Print the full verdict timeline; useful for slow-burn scenarios
    /// where the summary counts hide the order of events.
    pub fn print_verdicts(&self) {
        println!("═══ Verdict Timeline ═══");
        if self.verdicts.is_empty() {
            println!("  (none)");
        }
        for v in &self.verdicts {
            println!(
                "  {:8.1}s  {} -> {}: {:?} (vote {}, {:.1}s round)",
                v.time_s,
                self.short(v.leader),
                self.short(v.suspect),
                v.verdict,
                v.votes,
                v.elapsed_s
            );
        }
        println!();
    }

    /// Write the latency time series as CSV, one measurement per row.
    pub fn write_latency_csv(&self, path: &str) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        writeln!(file, "time_s,leader,suspect,latency_s,induced_delay_s")?;
        for p in &self.latency_series {
            writeln!(
                file,
                "{:.4},{},{},{:.6},{:.6}",
                p.time_s,
                self.short(p.leader),
                self.short(p.suspect),
                p.latency_s,
                p.induced_delay_s
            )?;
        }
        Ok(())
    }
}
