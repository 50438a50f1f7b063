use std::collections::{BTreeMap, HashSet};

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use simple_logger::SimpleLogger;

use acdc_rust::ac_cheater::CheaterConfig;
use acdc_rust::ac_increase::IncreaseConfig;
use acdc_rust::{
    outcome_report, record_outcome, reset_outcome_tally, AcPeer, AcPeerConfig, DetectionEvent,
    DetectionSink, PeerAction, PeerId, SimTime, StrategyConfig, TimerKind, WireMessage,
};

/// Grades every verdict against the known cheater set as it happens.
struct GradeSink {
    cheaters: HashSet<PeerId>,
}

impl DetectionSink for GradeSink {
    fn log(&mut self, now: SimTime, peer: PeerId, event: DetectionEvent) {
        match event {
            DetectionEvent::VerdictReached {
                suspect,
                verdict,
                votes,
                elapsed,
            } => {
                record_outcome(verdict, self.cheaters.contains(&suspect));
                info!(
                    "{:.1}s: {} judged {} {:?} (vote {}, round took {:.1}s)",
                    now.as_secs_f64(),
                    peer & 0xFF,
                    suspect & 0xFF,
                    verdict,
                    votes,
                    elapsed.as_secs_f64()
                );
            }
            DetectionEvent::CheaterExcluded { excluded, votes } => {
                info!(
                    "{:.1}s: {} EXCLUDED {} with {} votes",
                    now.as_secs_f64(),
                    peer & 0xFF,
                    excluded & 0xFF,
                    votes
                );
            }
            _ => {}
        }
    }
}

/// One pending occurrence in the toy scheduler.
enum Pending {
    Deliver { from: PeerId, message: WireMessage },
    Timer { timer: TimerKind },
}

fn main() {
    SimpleLogger::new().init().unwrap();

    info!("starting");

    let num_peers = 5;
    let cheater_index = 3;
    let horizon = SimTime::from_secs(40_000);
    let mut seed = [0u8; 32];
    rand::thread_rng().fill(&mut seed);

    let mut rng = StdRng::from_seed(seed);

    // create the mesh
    let peers: Vec<PeerId> = (0..num_peers).map(|_| rng.next_u64()).collect();
    let cheaters: HashSet<PeerId> = [peers[cheater_index]].into();

    reset_outcome_tally();

    let mut nodes: BTreeMap<PeerId, AcPeer> = BTreeMap::new();
    for (index, peer_id) in peers.iter().enumerate() {
        let neighbors: Vec<PeerId> = peers.iter().copied().filter(|p| p != peer_id).collect();

        // small windows and fast growth keep the demo short
        let config = AcPeerConfig {
            timeout_leader: SimTime::from_secs(600),
            strategy: StrategyConfig::Increase(IncreaseConfig {
                window: 6,
                growth: 1.5,
                ..IncreaseConfig::default()
            }),
            cheater: (index == cheater_index).then(CheaterConfig::default),
            ..AcPeerConfig::default()
        };

        let sink = GradeSink {
            cheaters: cheaters.clone(),
        };
        let node = AcPeer::new_with_sink(
            *peer_id,
            &neighbors,
            config,
            StdRng::from_seed(rng.gen()),
            Box::new(sink),
        );
        nodes.insert(*peer_id, node);
    }

    // toy single-process scheduler: (due time, sequence) keeps keys unique
    let mut queue: BTreeMap<(SimTime, u64), (PeerId, Pending)> = BTreeMap::new();
    let mut sequence = 0u64;
    let mut actions: Vec<PeerAction> = Vec::new();

    for peer_id in &peers {
        let node = nodes.get_mut(peer_id).unwrap();
        node.start(SimTime::ZERO, *peer_id == peers[0], &mut actions);
        route(
            &mut queue,
            &mut sequence,
            &mut rng,
            SimTime::ZERO,
            &nodes[peer_id],
            &mut actions,
        );
    }

    // iterations
    let mut message_count = 0u64;
    let mut counters = (0u64, 0u64, 0u64, 0u64);
    while let Some(((now, _), (peer_id, pending))) = queue.pop_first() {
        if now > horizon {
            break;
        }

        let Some(node) = nodes.get_mut(&peer_id) else {
            continue;
        };
        match pending {
            Pending::Deliver { from, message } => {
                message_count += 1;
                match message {
                    WireMessage::Move { .. } => counters.0 += 1,
                    WireMessage::DelayedMove { .. } => counters.1 += 1,
                    WireMessage::Token { .. } => counters.2 += 1,
                    _ => counters.3 += 1,
                };
                if let Some(link) = node.link_for(from) {
                    node.handle_message(now, link, &message, &mut actions);
                }
            }
            Pending::Timer { timer } => node.handle_timer(now, timer, &mut actions),
        }
        route(
            &mut queue,
            &mut sequence,
            &mut rng,
            now,
            &nodes[&peer_id],
            &mut actions,
        );
    }

    let stats = nodes
        .iter()
        .map(|(_, node)| node.n_active_peers())
        .fold((usize::MIN, usize::MAX), |acc, e| {
            (usize::max(acc.0, e), usize::min(acc.1, e))
        });

    info!(
        "Active peers seen by each node ({}): max: {} min: {}",
        nodes.len(),
        stats.0,
        stats.1
    );

    info!("let seed = {:?};", seed);
    info!(
        "done. Messages {} (move/delayed/token/info {:?})",
        message_count, counters
    );

    let report = outcome_report();
    info!("{}", report);
}

/// Turn the actions one peer just produced into queue entries: sends become
/// deliveries after a random link latency, schedules become timers.
fn route(
    queue: &mut BTreeMap<(SimTime, u64), (PeerId, Pending)>,
    sequence: &mut u64,
    rng: &mut StdRng,
    now: SimTime,
    node: &AcPeer,
    actions: &mut Vec<PeerAction>,
) {
    for action in actions.drain(..) {
        match action {
            PeerAction::Send { link, message } => {
                let Some(to) = node.neighbor(link) else {
                    continue;
                };
                let latency = SimTime::from_secs_f64(rng.gen_range(0.01..0.05));
                *sequence += 1;
                queue.insert(
                    (now + latency, *sequence),
                    (
                        to,
                        Pending::Deliver {
                            from: node.id(),
                            message,
                        },
                    ),
                );
            }
            PeerAction::Schedule { delay, timer } => {
                *sequence += 1;
                queue.insert((now + delay, *sequence), (node.id(), Pending::Timer { timer }));
            }
        }
    }
}
