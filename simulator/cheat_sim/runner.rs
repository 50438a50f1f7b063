// Cheat Detection Simulator Runner

use super::config::{CheatSimConfig, ConfigError};
use super::stats::*;
use acdc_rust::{
    outcome_report, record_outcome, reset_outcome_tally, AcPeer, DetectionEvent, PeerAction,
    PeerId, SimTime, StrategyConfig, TimerKind, WireMessage,
};
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

// ============================================================================
// Event Queue
// ============================================================================

/// Tie-break class for simultaneous events: timers fire before deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventPriority {
    Timer,
    Delivery,
}

/// Total order for the event queue: time, then priority, then target peer,
/// then insertion sequence. The sequence keeps keys unique, so ties stay
/// FIFO and a BTreeMap can hold the queue directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EventKey {
    time: SimTime,
    priority: EventPriority,
    peer: PeerId,
    sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.peer.cmp(&other.peer))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What happens when a queue entry comes due.
#[derive(Debug, Clone)]
enum QueuedEvent {
    Deliver { from: PeerId, message: WireMessage },
    Timer(TimerKind),
}

// ============================================================================
// Core Structures
// ============================================================================

/// Main simulator runner
pub struct CheatSimRunner {
    config: CheatSimConfig,
    rng: StdRng,
    seed_used: u64,
    now: SimTime,
    sequence: u64,

    // Network state
    queue: BTreeMap<EventKey, QueuedEvent>,
    peers: IndexMap<PeerId, AcPeer>,
    /// (receiver, sender) to the receiver's arrival link, precomputed for
    /// the hot delivery path
    arrival_links: HashMap<(PeerId, PeerId), usize>,
    cheater_ids: HashSet<PeerId>,

    // Metrics tracking
    counts: MessageCounts,
    events: Rc<RefCell<Vec<LoggedEvent>>>,
}

impl CheatSimRunner {
    /// Create new simulator. Rejects configurations the protocol cannot
    /// run on.
    pub fn new(config: CheatSimConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let seed_used = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let rng = StdRng::seed_from_u64(seed_used);

        Ok(Self {
            config,
            rng,
            seed_used,
            now: SimTime::ZERO,
            sequence: 0,
            queue: BTreeMap::new(),
            peers: IndexMap::new(),
            arrival_links: HashMap::new(),
            cheater_ids: HashSet::new(),
            counts: MessageCounts::default(),
            events: Rc::new(RefCell::new(Vec::new())),
        })
    }

    /// Run the simulation
    pub fn run(mut self) -> SimulationResult {
        reset_outcome_tally();

        // 1. Build the mesh and let every peer announce itself
        self.initialize_network();

        // 2. Drain the queue until the horizon
        let end = SimTime::from_secs_f64(self.config.duration_s);
        let mut actions: Vec<PeerAction> = Vec::new();
        while let Some((key, event)) = self.queue.pop_first() {
            if key.time > end {
                self.now = end;
                break;
            }
            self.now = key.time;

            let Some(peer) = self.peers.get_mut(&key.peer) else {
                continue;
            };
            match event {
                QueuedEvent::Deliver { from, message } => {
                    match &message {
                        WireMessage::Move { .. } => self.counts.moves += 1,
                        WireMessage::DelayedMove { .. } => self.counts.delayed_moves += 1,
                        WireMessage::Token { .. } => self.counts.tokens += 1,
                        _ => self.counts.info += 1,
                    }
                    if let Some(&link) = self.arrival_links.get(&(key.peer, from)) {
                        peer.handle_message(self.now, link, &message, &mut actions);
                    }
                }
                QueuedEvent::Timer(timer) => peer.handle_timer(self.now, timer, &mut actions),
            }
            self.route_actions(key.peer, &mut actions);
        }

        // 3. Build final result
        self.build_result()
    }

    /// Create the full mesh and bootstrap every peer; the first created
    /// peer holds the token initially.
    fn initialize_network(&mut self) {
        let num_peers = self.config.num_peers;
        let peer_ids: Vec<PeerId> = (0..num_peers).map(|_| self.rng.gen()).collect();

        self.cheater_ids = self
            .config
            .cheaters
            .iter()
            .map(|&index| peer_ids[index])
            .collect();

        for &peer_id in &peer_ids {
            let neighbors: Vec<PeerId> = peer_ids
                .iter()
                .copied()
                .filter(|&other| other != peer_id)
                .collect();
            let cheats = self.cheater_ids.contains(&peer_id);

            let peer = AcPeer::new_with_sink(
                peer_id,
                &neighbors,
                self.config.peer_config(cheats),
                StdRng::from_seed(self.rng.gen()),
                Box::new(RecordingSink::new(self.events.clone())),
            );

            for &other in &neighbors {
                if let Some(link) = peer.link_for(other) {
                    self.arrival_links.insert((peer_id, other), link);
                }
            }
            self.peers.insert(peer_id, peer);
        }

        let mut actions: Vec<PeerAction> = Vec::new();
        for (index, &peer_id) in peer_ids.iter().enumerate() {
            if let Some(peer) = self.peers.get_mut(&peer_id) {
                peer.start(SimTime::ZERO, index == 0, &mut actions);
            }
            self.route_actions(peer_id, &mut actions);
        }
    }

    /// Turn one peer's pending actions into queue entries: sends become
    /// deliveries after a fresh link latency, schedules become timers.
    fn route_actions(&mut self, from: PeerId, actions: &mut Vec<PeerAction>) {
        for action in actions.drain(..) {
            match action {
                PeerAction::Send { link, message } => {
                    let Some(to) = self.peers.get(&from).and_then(|p| p.neighbor(link)) else {
                        continue;
                    };
                    let latency = self.draw_latency();
                    self.push(
                        self.now + latency,
                        EventPriority::Delivery,
                        to,
                        QueuedEvent::Deliver { from, message },
                    );
                }
                PeerAction::Schedule { delay, timer } => {
                    self.push(
                        self.now + delay,
                        EventPriority::Timer,
                        from,
                        QueuedEvent::Timer(timer),
                    );
                }
            }
        }
    }

    fn push(&mut self, time: SimTime, priority: EventPriority, peer: PeerId, event: QueuedEvent) {
        self.sequence += 1;
        self.queue.insert(
            EventKey {
                time,
                priority,
                peer,
                sequence: self.sequence,
            },
            event,
        );
    }

    fn draw_latency(&mut self) -> SimTime {
        let (lo, hi) = self.config.network.latency_s;
        let secs = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
        SimTime::from_secs_f64(secs)
    }

    /// Score every verdict against the true cheater set and fold the event
    /// log into the result.
    fn build_result(self) -> SimulationResult {
        let peer_ids: Vec<PeerId> = self.peers.keys().copied().collect();
        let true_cheaters: Vec<PeerId> = self
            .config
            .cheaters
            .iter()
            .map(|&index| peer_ids[index])
            .collect();
        let final_active_view: Vec<usize> =
            self.peers.values().map(|p| p.n_active_peers()).collect();

        let mut verdicts = Vec::new();
        let mut exclusions = Vec::new();
        let mut latency_series = Vec::new();
        let mut leadership_changes = 0;
        let mut tokens_relayed = 0;

        for logged in self.events.borrow().iter() {
            let time_s = logged.time.as_secs_f64();
            match &logged.event {
                DetectionEvent::LeaderElected { .. } => leadership_changes += 1,
                DetectionEvent::TokenRelayed { .. } => tokens_relayed += 1,
                DetectionEvent::VerdictReached {
                    suspect,
                    verdict,
                    votes,
                    elapsed,
                } => {
                    record_outcome(*verdict, self.cheater_ids.contains(suspect));
                    verdicts.push(VerdictRecord {
                        time_s,
                        leader: logged.peer,
                        suspect: *suspect,
                        verdict: *verdict,
                        votes: *votes,
                        elapsed_s: elapsed.as_secs_f64(),
                    });
                }
                DetectionEvent::CheaterExcluded { excluded, votes } => {
                    exclusions.push(ExclusionRecord {
                        time_s,
                        leader: logged.peer,
                        excluded: *excluded,
                        votes: *votes,
                    });
                }
                DetectionEvent::LatencySample {
                    suspect,
                    latency,
                    induced_delay,
                } => latency_series.push(LatencyPoint {
                    time_s,
                    leader: logged.peer,
                    suspect: *suspect,
                    latency_s: latency.as_secs_f64(),
                    induced_delay_s: induced_delay.as_secs_f64(),
                }),
                _ => {}
            }
        }

        let strategy = match &self.config.protocol.strategy {
            StrategyConfig::Increase(_) => "increase",
            StrategyConfig::Correlation(_) => "correlation",
        };
        let result = SimulationResult {
            config_summary: format!(
                "{} peers, {} cheater(s), {} strategy, {:.0} s horizon",
                self.config.num_peers,
                self.config.cheaters.len(),
                strategy,
                self.config.duration_s
            ),
            seed_used: self.seed_used,
            sim_time_s: self.now.as_secs_f64(),
            peer_ids,
            true_cheaters,
            verdicts,
            exclusions,
            outcome: outcome_report(),
            leadership_changes,
            tokens_relayed,
            messages: self.counts,
            latency_series,
            final_active_view,
        };

        if let Some(path) = &self.config.output.csv_path {
            if let Err(err) = result.write_latency_csv(path) {
                log::warn!("could not write {}: {}", path, err);
            }
        }
        result
    }
}

// ============================================================================
// Integration Tests
// ============================================================================
