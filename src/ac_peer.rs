use rand::rngs::StdRng;
use rand::Rng;

use crate::ac_cheater::CheaterState;
use crate::ac_interface::{
    DetectionEvent, DetectionSink, LinkIndex, NoOpSink, PeerAction, PeerId, SimTime, TimerKind,
    TokenEvidence, Verdict, WireMessage,
};
use crate::ac_strategy::{DetectionStrategy, StrategyConfig};

// ============================================================================
// Configuration
// ============================================================================

/// Per-peer protocol configuration
#[derive(Debug, Clone)]
pub struct AcPeerConfig {
    /// How long a leader may hold the token before releasing it
    /// (default: 2000.0 s)
    pub timeout_leader: SimTime,

    /// Uniform range for the pause between an honest peer's moves, seconds
    /// (default: 0.5 .. 1.5)
    pub move_interval_s: (f64, f64),

    /// Detection strategy this peer runs while leading
    pub strategy: StrategyConfig,

    /// Run this peer as a look-ahead cheater
    pub cheater: Option<crate::ac_cheater::CheaterConfig>,
}

impl Default for AcPeerConfig {
    fn default() -> Self {
        Self {
            timeout_leader: SimTime::from_secs(2000),
            move_interval_s: (0.5, 1.5),
            strategy: StrategyConfig::default(),
            cheater: None,
        }
    }
}

// ============================================================================
// Peer State Machine
// ============================================================================

/// Role of a peer: exactly one peer in the network holds the token and
/// with it the Leader role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Leader,
}

/// One neighbor connection. Exclusion flips `active` to false, never back.
#[derive(Debug, Clone)]
struct Link {
    peer: PeerId,
    active: bool,
}

/// One node of the detection network.
///
/// The peer is driven entirely from outside: the caller delivers messages
/// and expired timers, and collects the sends and timer requests the peer
/// pushes into `actions`. It never touches a socket or a clock, so the
/// same state machine runs under any scheduler.
pub struct AcPeer {
    id: PeerId,
    links: Vec<Link>,

    /// Active links plus self; shrinks as cheaters are excluded.
    n_active_peers: usize,
    role: Role,

    /// Votes accumulated for the suspect currently pursued while Leader.
    references: u32,

    strategy: DetectionStrategy,
    cheater: Option<CheaterState>,

    /// Rotation cursor: the last link this peer probed, so a fresh pick
    /// continues round-robin from there.
    last_suspect: Option<LinkIndex>,

    /// Suspect this peer accused and forwarded evidence for; receiving a
    /// token that still carries the same accusation is relayed onward
    /// instead of counted twice.
    pending_accusation: Option<PeerId>,

    /// Leadership epoch; a term timer fires validly only in the term it
    /// was armed in.
    term: u64,
    /// Probe epoch, bumped on every suspect change; delayed probes armed
    /// in an earlier round are inert.
    probe_round: u64,
    /// When the current detection round began, for per-round elapsed time.
    round_started: SimTime,

    config: AcPeerConfig,
    rng: StdRng,
    sink: Box<dyn DetectionSink>,
}

impl AcPeer {
    /// Create a peer with the default NoOpSink (zero overhead).
    pub fn new(id: PeerId, neighbors: &[PeerId], config: AcPeerConfig, rng: StdRng) -> Self {
        Self::new_with_sink(id, neighbors, config, rng, Box::new(NoOpSink))
    }

    /// Create a peer with a custom event sink for debugging/analysis.
    pub fn new_with_sink(
        id: PeerId,
        neighbors: &[PeerId],
        config: AcPeerConfig,
        mut rng: StdRng,
        sink: Box<dyn DetectionSink>,
    ) -> Self {
        use rand::SeedableRng;

        let links: Vec<Link> = neighbors
            .iter()
            .map(|&peer| Link { peer, active: true })
            .collect();
        let strategy = config.strategy.build(StdRng::from_seed(rng.gen()));
        let cheater = config.cheater.clone().map(CheaterState::new);

        Self {
            id,
            n_active_peers: links.len() + 1,
            links,
            role: Role::Follower,
            references: 0,
            strategy,
            cheater,
            last_suspect: None,
            pending_accusation: None,
            term: 0,
            probe_round: 0,
            round_started: SimTime::ZERO,
            config,
            rng,
            sink,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_cheater(&self) -> bool {
        self.cheater.is_some()
    }

    /// Active links plus self.
    pub fn n_active_peers(&self) -> usize {
        self.n_active_peers
    }

    /// Votes carried for the current pursuit.
    pub fn references(&self) -> u32 {
        self.references
    }

    /// Link currently under investigation, if any.
    pub fn suspect_link(&self) -> Option<LinkIndex> {
        self.strategy.suspect()
    }

    pub fn neighbor(&self, link: LinkIndex) -> Option<PeerId> {
        self.links.get(link).map(|l| l.peer)
    }

    pub fn link_active(&self, link: LinkIndex) -> bool {
        self.links.get(link).map_or(false, |l| l.active)
    }

    /// Link connected to `peer`, regardless of its active flag.
    pub fn link_for(&self, peer: PeerId) -> Option<LinkIndex> {
        self.links.iter().position(|l| l.peer == peer)
    }

    fn active_links(&self) -> usize {
        self.links.iter().filter(|l| l.active).count()
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    /// Enter the network. The designated first peer starts as Leader and
    /// opens its first detection round; every peer arms its move source.
    pub fn start(&mut self, now: SimTime, as_leader: bool, actions: &mut Vec<PeerAction>) {
        if as_leader {
            self.assume_leadership(now, actions);
            let first = self.next_suspect();
            self.adopt_suspect(now, first, 0);
        }

        match &self.cheater {
            Some(state) => {
                // first move is honestly stamped; the interval timer is the
                // cheater's only move source from here on
                let interval = state.interval();
                self.broadcast_move(now, actions);
                actions.push(PeerAction::Schedule {
                    delay: interval,
                    timer: TimerKind::MoveInterval,
                });
            }
            None => {
                let delay = self.draw_move_interval();
                actions.push(PeerAction::Schedule {
                    delay,
                    timer: TimerKind::NextMove,
                });
            }
        }
    }

    // ========================================================================
    // Message Handling
    // ========================================================================

    pub fn handle_message(
        &mut self,
        now: SimTime,
        from_link: LinkIndex,
        message: &WireMessage,
        actions: &mut Vec<PeerAction>,
    ) {
        // excluded neighbors are dead to us, whatever they send
        if !self.link_active(from_link) {
            return;
        }

        match message {
            WireMessage::Move { stamp } | WireMessage::DelayedMove { stamp } => {
                if let Some(cheater) = self.cheater.as_mut() {
                    cheater.observe(*stamp);
                }
                if self.role == Role::Leader && self.strategy.suspect() == Some(from_link) {
                    self.check_latency(now, from_link, *stamp, actions);
                }
            }
            WireMessage::Token { evidence } => {
                self.handle_token(now, *evidence, actions);
            }
            WireMessage::TokenReleased => {
                // informational only
                log::debug!("peer {}: token released by {}", self.id, self.links[from_link].peer);
            }
            WireMessage::CheaterDetected { excluded } => {
                self.handle_exclusion_order(now, *excluded);
            }
        }
    }

    /// Receive the leadership token, with or without carried evidence.
    fn handle_token(
        &mut self,
        now: SimTime,
        evidence: Option<TokenEvidence>,
        actions: &mut Vec<PeerAction>,
    ) {
        if let Some(carried) = evidence {
            match self.link_for(carried.suspect) {
                Some(link) if self.links[link].active => {
                    if self.pending_accusation == Some(carried.suspect) {
                        // this evidence already contains our vote; relay the
                        // token onward rather than counting ourselves twice
                        if let Some(target) = self.random_active_link(Some(link)) {
                            actions.push(PeerAction::Send {
                                link: target,
                                message: WireMessage::Token {
                                    evidence: Some(carried),
                                },
                            });
                            self.sink.log(
                                now,
                                self.id,
                                DetectionEvent::TokenRelayed {
                                    suspect: carried.suspect,
                                    to: self.links[target].peer,
                                },
                            );
                            return;
                        }
                        // nobody left to relay to; the pursuit cannot gather
                        // more votes, so restart with a fresh pick
                        log::warn!(
                            "peer {}: no relay target for accusation of {}, dropping evidence",
                            self.id,
                            carried.suspect
                        );
                    } else {
                        self.assume_leadership(now, actions);
                        self.adopt_suspect(now, Some(link), carried.votes);
                        return;
                    }
                }
                _ => {
                    log::warn!(
                        "peer {}: token names unknown or excluded peer {}, ignoring evidence",
                        self.id,
                        carried.suspect
                    );
                }
            }
        }

        // no usable evidence: fresh round-robin pick
        self.assume_leadership(now, actions);
        let next = self.next_suspect();
        self.adopt_suspect(now, next, 0);
    }

    /// Network-wide exclusion order: cut the link to the named peer.
    fn handle_exclusion_order(&mut self, now: SimTime, excluded: PeerId) {
        let Some(link) = self.link_for(excluded) else {
            return;
        };
        if self.links[link].active {
            self.links[link].active = false;
            self.n_active_peers -= 1;
            self.sink.log(
                now,
                self.id,
                DetectionEvent::LinkDeactivated {
                    peer: excluded,
                    active_left: self.active_links(),
                },
            );
        }
        self.references = 0;
        if self.pending_accusation == Some(excluded) {
            self.pending_accusation = None;
        }

        // a leader mid-pursuit of the excluded peer starts over
        if self.role == Role::Leader && self.strategy.suspect() == Some(link) {
            log::info!(
                "peer {}: suspect {} excluded elsewhere, picking a new one",
                self.id,
                excluded
            );
            let next = self.next_suspect();
            self.adopt_suspect(now, next, 0);
        }
    }

    // ========================================================================
    // Timer Handling
    // ========================================================================

    pub fn handle_timer(&mut self, now: SimTime, timer: TimerKind, actions: &mut Vec<PeerAction>) {
        match timer {
            TimerKind::LeaderTerm { term } => {
                if term != self.term || self.role != Role::Leader {
                    return; // stale
                }
                log::debug!("peer {}: term {} expired", self.id, term);
                if !self.release_token(now, None, None, actions) {
                    // alone among the active peers: keep the token
                    log::debug!("peer {}: no active neighbor, keeping the token", self.id);
                }
            }
            TimerKind::DelayedProbe { stamp, round } => {
                if self.role != Role::Leader || round != self.probe_round {
                    return; // stale
                }
                let Some(link) = self.strategy.suspect() else {
                    return;
                };
                actions.push(PeerAction::Send {
                    link,
                    message: WireMessage::DelayedMove { stamp },
                });
            }
            TimerKind::MoveInterval => {
                let Some(cheater) = self.cheater.as_mut() else {
                    return;
                };
                let stamp = cheater.next_stamp(now);
                let interval = cheater.interval();
                self.broadcast_move(stamp, actions);
                actions.push(PeerAction::Schedule {
                    delay: interval,
                    timer: TimerKind::MoveInterval,
                });
            }
            TimerKind::NextMove => {
                if self.cheater.is_some() {
                    return; // cheaters move on their interval only
                }
                self.broadcast_move(now, actions);
                let delay = self.draw_move_interval();
                actions.push(PeerAction::Schedule {
                    delay,
                    timer: TimerKind::NextMove,
                });
            }
        }
    }

    // ========================================================================
    // Latency Check and Verdicts
    // ========================================================================

    /// One application message from the suspect: measure, feed the
    /// strategy, act on whatever verdict it settled on.
    fn check_latency(
        &mut self,
        now: SimTime,
        from_link: LinkIndex,
        stamp: SimTime,
        actions: &mut Vec<PeerAction>,
    ) {
        let latency = now.saturating_sub(stamp);
        self.sink.log(
            now,
            self.id,
            DetectionEvent::LatencySample {
                suspect: self.links[from_link].peer,
                latency,
                induced_delay: self.strategy.induced_delay(),
            },
        );

        self.strategy.register_delay(latency.as_secs_f64());

        match self.strategy.verdict() {
            Verdict::Unknown => {}
            Verdict::Cheater => self.on_cheater_verdict(now, from_link, actions),
            Verdict::NotCheater => self.on_clear_verdict(now, from_link, actions),
        }
    }

    /// This leader is convinced: vote, then either exclude on majority or
    /// hand the accusation to another leader.
    fn on_cheater_verdict(
        &mut self,
        now: SimTime,
        from_link: LinkIndex,
        actions: &mut Vec<PeerAction>,
    ) {
        let suspect = self.links[from_link].peer;
        self.references += 1;

        let elapsed = now.saturating_sub(self.round_started);
        self.sink.log(
            now,
            self.id,
            DetectionEvent::VerdictReached {
                suspect,
                verdict: Verdict::Cheater,
                votes: self.references,
                elapsed,
            },
        );
        log::info!(
            "peer {}: {} looks like a cheater ({} of {} votes)",
            self.id,
            suspect,
            self.references,
            self.majority()
        );

        if self.references >= self.majority() {
            self.exclude_suspect(now, from_link, actions);
            return;
        }

        let evidence = TokenEvidence {
            suspect,
            votes: self.references,
        };
        if self.release_token(now, Some(evidence), Some(from_link), actions) {
            self.pending_accusation = Some(suspect);
        } else {
            // no third peer to ask: a lone accuser can never reach a
            // majority, so the pursuit ends here
            log::warn!(
                "peer {}: nobody left to verify {}, abandoning pursuit",
                self.id,
                suspect
            );
            self.adopt_suspect(now, None, 0);
        }
    }

    /// The suspect held up under probing: pass the token on for a fresh
    /// pick elsewhere.
    fn on_clear_verdict(
        &mut self,
        now: SimTime,
        from_link: LinkIndex,
        actions: &mut Vec<PeerAction>,
    ) {
        let suspect = self.links[from_link].peer;
        let elapsed = now.saturating_sub(self.round_started);
        self.sink.log(
            now,
            self.id,
            DetectionEvent::VerdictReached {
                suspect,
                verdict: Verdict::NotCheater,
                votes: self.references,
                elapsed,
            },
        );
        log::info!("peer {}: {} cleared", self.id, suspect);

        // the suspect's own link is active, so a target always exists here
        self.release_token(now, None, None, actions);
    }

    /// Majority reached: cut the suspect out of the network, tell everyone,
    /// and open a fresh round without surrendering leadership.
    fn exclude_suspect(
        &mut self,
        now: SimTime,
        from_link: LinkIndex,
        actions: &mut Vec<PeerAction>,
    ) {
        let excluded = self.links[from_link].peer;
        log::info!(
            "peer {}: excluding {} ({} votes, {} active peers)",
            self.id,
            excluded,
            self.references,
            self.n_active_peers
        );

        self.links[from_link].active = false;
        self.n_active_peers -= 1;
        self.sink.log(
            now,
            self.id,
            DetectionEvent::CheaterExcluded {
                excluded,
                votes: self.references,
            },
        );
        self.sink.log(
            now,
            self.id,
            DetectionEvent::LinkDeactivated {
                peer: excluded,
                active_left: self.active_links(),
            },
        );

        // the excluded link is already dead, so the order skips it
        self.broadcast_info(WireMessage::CheaterDetected { excluded }, actions);

        let next = self.next_suspect();
        self.adopt_suspect(now, next, 0);
    }

    // ========================================================================
    // Leadership and Suspects
    // ========================================================================

    fn assume_leadership(&mut self, now: SimTime, actions: &mut Vec<PeerAction>) {
        self.role = Role::Leader;
        self.term += 1;
        log::info!("peer {}: leader for term {}", self.id, self.term);
        self.sink
            .log(now, self.id, DetectionEvent::LeaderElected { term: self.term });
        actions.push(PeerAction::Schedule {
            delay: self.config.timeout_leader,
            timer: TimerKind::LeaderTerm { term: self.term },
        });
    }

    /// Rebind the strategy to `link` (or to nothing) and open a fresh
    /// round. `votes` seeds the reference counter: carried evidence keeps
    /// its count, every other adoption starts at zero.
    fn adopt_suspect(&mut self, now: SimTime, link: Option<LinkIndex>, votes: u32) {
        self.pending_accusation = None;
        self.references = votes;
        self.probe_round += 1;
        self.round_started = now;
        self.strategy.set_new_suspect(link);

        if let Some(link) = link {
            self.last_suspect = Some(link);
            self.sink.log(
                now,
                self.id,
                DetectionEvent::SuspectChosen {
                    suspect: self.links[link].peer,
                    carried_votes: votes,
                },
            );
        }
    }

    /// Hand the token to a random active neighbor, excluding `exclude`
    /// (the accused peer must never verify itself). Returns false when no
    /// valid target exists; the caller decides what that means.
    fn release_token(
        &mut self,
        now: SimTime,
        evidence: Option<TokenEvidence>,
        exclude: Option<LinkIndex>,
        actions: &mut Vec<PeerAction>,
    ) -> bool {
        let Some(target) = self.random_active_link(exclude) else {
            return false;
        };

        actions.push(PeerAction::Send {
            link: target,
            message: WireMessage::Token { evidence },
        });

        self.role = Role::Follower;
        self.term += 1;
        self.references = 0;
        self.strategy.set_new_suspect(None);

        self.sink.log(
            now,
            self.id,
            DetectionEvent::TokenReleased {
                to: self.links[target].peer,
                with_evidence: evidence.is_some(),
            },
        );
        log::debug!(
            "peer {}: token released to {}",
            self.id,
            self.links[target].peer
        );

        self.broadcast_info(WireMessage::TokenReleased, actions);
        true
    }

    /// Next active link after the previous suspect, wrapping. None when
    /// every link is inactive: alone, there is nothing to detect.
    fn next_suspect(&mut self) -> Option<LinkIndex> {
        if !self.links.iter().any(|l| l.active) {
            return None;
        }
        let mut link = self.last_suspect.unwrap_or(self.links.len() - 1);
        loop {
            link = (link + 1) % self.links.len();
            if self.links[link].active {
                return Some(link);
            }
        }
    }

    /// Rejection-sample an active link, skipping `exclude`. The
    /// eligibility pre-check guarantees the loop terminates.
    fn random_active_link(&mut self, exclude: Option<LinkIndex>) -> Option<LinkIndex> {
        let eligible = self
            .links
            .iter()
            .enumerate()
            .any(|(link, l)| l.active && Some(link) != exclude);
        if !eligible {
            return None;
        }
        loop {
            let link = self.rng.gen_range(0..self.links.len());
            if self.links[link].active && Some(link) != exclude {
                return Some(link);
            }
        }
    }

    fn majority(&self) -> u32 {
        (self.n_active_peers / 2 + 1) as u32
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Broadcast one move. A leader in counter-attack holds the suspect's
    /// copy back for the induced delay; everyone else gets it immediately.
    fn broadcast_move(&self, stamp: SimTime, actions: &mut Vec<PeerAction>) {
        let probed = if self.role == Role::Leader && self.strategy.is_counter_attacking() {
            self.strategy.suspect()
        } else {
            None
        };

        for (link, l) in self.links.iter().enumerate() {
            if probed == Some(link) {
                actions.push(PeerAction::Schedule {
                    delay: self.strategy.induced_delay(),
                    timer: TimerKind::DelayedProbe {
                        stamp,
                        round: self.probe_round,
                    },
                });
            } else if l.active {
                actions.push(PeerAction::Send {
                    link,
                    message: WireMessage::Move { stamp },
                });
            }
        }
    }

    /// Broadcast a control message directly on every active link; control
    /// traffic is never diverted through the delayed probe.
    fn broadcast_info(&self, message: WireMessage, actions: &mut Vec<PeerAction>) {
        for (link, l) in self.links.iter().enumerate() {
            if l.active {
                actions.push(PeerAction::Send {
                    link,
                    message: message.clone(),
                });
            }
        }
    }

    fn draw_move_interval(&mut self) -> SimTime {
        let (lo, hi) = self.config.move_interval_s;
        let secs = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
        // from_secs_f64 rejects negative input
        SimTime::from_secs_f64(secs.max(0.0))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ac_cheater::CheaterConfig;
    use crate::ac_increase::IncreaseConfig;
    use rand::SeedableRng;

    fn secs(s: f64) -> SimTime {
        SimTime::from_secs_f64(s)
    }

    /// Increase strategy with a two-sample window so tests reach verdicts
    /// quickly: two flat samples for the baseline, two slow ones convict.
    fn test_config() -> AcPeerConfig {
        AcPeerConfig {
            timeout_leader: secs(100.0),
            strategy: StrategyConfig::Increase(IncreaseConfig {
                window: 2,
                ..IncreaseConfig::default()
            }),
            ..AcPeerConfig::default()
        }
    }

    fn test_peer(id: PeerId, neighbors: &[PeerId]) -> AcPeer {
        AcPeer::new(id, neighbors, test_config(), StdRng::seed_from_u64(7))
    }

    /// Drive the peer past the baseline window, then feed samples slow
    /// enough to cross the conviction threshold.
    fn drive_to_cheater_verdict(peer: &mut AcPeer, suspect: LinkIndex, actions: &mut Vec<PeerAction>) {
        let mut now = 10.0;
        for _ in 0..2 {
            peer.handle_message(secs(now), suspect, &WireMessage::Move { stamp: secs(now - 0.05) }, actions);
            now += 1.0;
        }
        for _ in 0..2 {
            peer.handle_message(secs(now), suspect, &WireMessage::Move { stamp: secs(now - 5.0) }, actions);
            now += 1.0;
        }
    }

    fn sent_tokens(actions: &[PeerAction]) -> Vec<(LinkIndex, Option<TokenEvidence>)> {
        actions
            .iter()
            .filter_map(|a| match a {
                PeerAction::Send {
                    link,
                    message: WireMessage::Token { evidence },
                } => Some((*link, *evidence)),
                _ => None,
            })
            .collect()
    }

    // ===== Bootstrap =====

    #[test]
    fn test_bootstrap_leader_probes_first_link() {
        let mut peer = test_peer(0, &[1, 2, 3, 4]);
        let mut actions = Vec::new();
        peer.start(SimTime::ZERO, true, &mut actions);

        assert_eq!(peer.role(), Role::Leader);
        assert_eq!(peer.suspect_link(), Some(0));
        assert!(actions.iter().any(|a| matches!(
            a,
            PeerAction::Schedule { timer: TimerKind::LeaderTerm { term: 1 }, .. }
        )));
        assert!(actions.iter().any(|a| matches!(
            a,
            PeerAction::Schedule { timer: TimerKind::NextMove, .. }
        )));
    }

    #[test]
    fn test_bootstrap_cheater_moves_on_its_interval() {
        let config = AcPeerConfig {
            cheater: Some(CheaterConfig::default()),
            ..test_config()
        };
        let mut peer = AcPeer::new(3, &[0, 1, 2, 4], config, StdRng::seed_from_u64(7));
        let mut actions = Vec::new();
        peer.start(secs(0.0), false, &mut actions);

        // an honestly stamped opening move to every neighbor
        let moves = actions
            .iter()
            .filter(|a| matches!(a, PeerAction::Send { message: WireMessage::Move { .. }, .. }))
            .count();
        assert_eq!(moves, 4);

        assert!(actions.iter().any(|a| matches!(
            a,
            PeerAction::Schedule { timer: TimerKind::MoveInterval, .. }
        )));
        assert!(!actions.iter().any(|a| matches!(
            a,
            PeerAction::Schedule { timer: TimerKind::NextMove, .. }
        )));
    }

    #[test]
    fn test_negative_move_interval_schedules_immediately() {
        let config = AcPeerConfig {
            move_interval_s: (-2.0, -1.0),
            ..test_config()
        };
        let mut peer = AcPeer::new(0, &[1, 2], config, StdRng::seed_from_u64(7));
        let mut actions = Vec::new();
        peer.start(SimTime::ZERO, false, &mut actions);

        // a negative pause collapses to an immediate next move
        let delay = actions.iter().find_map(|a| match a {
            PeerAction::Schedule { delay, timer: TimerKind::NextMove } => Some(*delay),
            _ => None,
        });
        assert_eq!(delay, Some(SimTime::ZERO));
    }

    // ===== Token handling =====

    #[test]
    fn test_token_without_evidence_rotates_suspects() {
        let mut peer = test_peer(0, &[10, 20, 30]);
        let mut actions = Vec::new();

        peer.handle_message(secs(1.0), 2, &WireMessage::Token { evidence: None }, &mut actions);
        assert_eq!(peer.role(), Role::Leader);
        assert_eq!(peer.suspect_link(), Some(0));
        assert_eq!(peer.references(), 0);
    }

    #[test]
    fn test_token_evidence_adopts_suspect_and_votes() {
        let mut peer = test_peer(0, &[10, 20, 30]);
        let mut actions = Vec::new();

        let evidence = Some(TokenEvidence { suspect: 30, votes: 2 });
        peer.handle_message(secs(1.0), 0, &WireMessage::Token { evidence }, &mut actions);

        assert_eq!(peer.role(), Role::Leader);
        assert_eq!(peer.suspect_link(), Some(2));
        assert_eq!(peer.references(), 2);
    }

    #[test]
    fn test_token_evidence_for_excluded_peer_is_dropped() {
        let mut peer = test_peer(0, &[10, 20, 30]);
        let mut actions = Vec::new();

        peer.handle_message(secs(0.5), 0, &WireMessage::CheaterDetected { excluded: 30 }, &mut actions);
        assert!(!peer.link_active(2));

        let evidence = Some(TokenEvidence { suspect: 30, votes: 2 });
        peer.handle_message(secs(1.0), 0, &WireMessage::Token { evidence }, &mut actions);

        // evidence ignored: fresh pick, zero votes
        assert_eq!(peer.role(), Role::Leader);
        assert_eq!(peer.suspect_link(), Some(0));
        assert_eq!(peer.references(), 0);
    }

    // ===== Verdicts and voting =====

    #[test]
    fn test_cheater_verdict_without_majority_forwards_evidence() {
        let mut peer = test_peer(0, &[10, 20, 30, 40]);
        let mut actions = Vec::new();
        peer.start(SimTime::ZERO, true, &mut actions);
        assert_eq!(peer.suspect_link(), Some(0));

        actions.clear();
        drive_to_cheater_verdict(&mut peer, 0, &mut actions);

        // 1 vote of the 3 needed among 5 active peers
        assert_eq!(peer.role(), Role::Follower);
        let tokens = sent_tokens(&actions);
        assert_eq!(tokens.len(), 1);
        let (target, evidence) = tokens[0];
        assert_ne!(target, 0, "the accused must not verify itself");
        assert_eq!(evidence, Some(TokenEvidence { suspect: 10, votes: 1 }));

        // release is announced on every active link
        let released = actions
            .iter()
            .filter(|a| matches!(a, PeerAction::Send { message: WireMessage::TokenReleased, .. }))
            .count();
        assert_eq!(released, 4);
    }

    #[test]
    fn test_majority_excludes_immediately() {
        let mut peer = test_peer(0, &[10, 20, 30, 40]);
        let mut actions = Vec::new();

        // two leaders already voted for peer 20; ours is the third of the
        // three needed among 5 active peers
        let evidence = Some(TokenEvidence { suspect: 20, votes: 2 });
        peer.handle_message(secs(1.0), 0, &WireMessage::Token { evidence }, &mut actions);
        assert_eq!(peer.suspect_link(), Some(1));

        actions.clear();
        drive_to_cheater_verdict(&mut peer, 1, &mut actions);

        assert!(!peer.link_active(1));
        assert_eq!(peer.n_active_peers(), 4);
        assert_eq!(peer.references(), 0);
        assert_eq!(peer.role(), Role::Leader, "exclusion keeps leadership");
        assert_eq!(peer.suspect_link(), Some(2), "fresh round starts at once");

        let orders: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                PeerAction::Send { link, message: WireMessage::CheaterDetected { excluded } } => {
                    Some((*link, *excluded))
                }
                _ => None,
            })
            .collect();
        assert_eq!(orders.len(), 3, "order goes to the surviving links only");
        assert!(orders.iter().all(|(link, excluded)| *link != 1 && *excluded == 20));
    }

    #[test]
    fn test_clear_verdict_forwards_token_without_evidence() {
        let mut peer = test_peer(0, &[10, 20]);
        let mut actions = Vec::new();
        peer.start(SimTime::ZERO, true, &mut actions);

        actions.clear();
        // flat latency forever: the induced delay climbs to its ceiling
        // and the suspect is cleared
        let mut now = 10.0;
        while peer.role() == Role::Leader && peer.suspect_link().is_some() {
            peer.handle_message(
                secs(now),
                0,
                &WireMessage::Move { stamp: secs(now - 0.05) },
                &mut actions,
            );
            now += 0.5;
            assert!(now < 10_000.0, "verdict never reached");
        }

        assert_eq!(peer.role(), Role::Follower);
        assert_eq!(peer.references(), 0);
        let tokens = sent_tokens(&actions);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].1, None);
    }

    #[test]
    fn test_pending_accusation_relays_instead_of_revoting() {
        let mut peer = test_peer(0, &[10, 20, 30, 40]);
        let mut actions = Vec::new();
        peer.start(SimTime::ZERO, true, &mut actions);

        actions.clear();
        drive_to_cheater_verdict(&mut peer, 0, &mut actions);
        assert_eq!(peer.role(), Role::Follower);

        // the token comes back still accusing peer 10
        actions.clear();
        let evidence = Some(TokenEvidence { suspect: 10, votes: 2 });
        peer.handle_message(secs(30.0), 2, &WireMessage::Token { evidence }, &mut actions);

        // relayed untouched, leadership declined
        assert_eq!(peer.role(), Role::Follower);
        let tokens = sent_tokens(&actions);
        assert_eq!(tokens.len(), 1);
        let (target, carried) = tokens[0];
        assert_ne!(target, 0);
        assert_eq!(carried, Some(TokenEvidence { suspect: 10, votes: 2 }));
        assert!(!actions.iter().any(|a| matches!(
            a,
            PeerAction::Schedule { timer: TimerKind::LeaderTerm { .. }, .. }
        )));
    }

    #[test]
    fn test_lone_accuser_abandons_pursuit() {
        // two-peer network: majority is 2 but only one voter exists
        let mut peer = test_peer(0, &[10]);
        let mut actions = Vec::new();
        peer.start(SimTime::ZERO, true, &mut actions);

        actions.clear();
        drive_to_cheater_verdict(&mut peer, 0, &mut actions);

        assert_eq!(peer.role(), Role::Leader, "token kept");
        assert_eq!(peer.suspect_link(), None, "pursuit abandoned");
        assert_eq!(peer.references(), 0);
        assert!(sent_tokens(&actions).is_empty());
    }

    // ===== Exclusion orders =====

    #[test]
    fn test_exclusion_order_is_monotonic() {
        let mut peer = test_peer(0, &[10, 20, 30]);
        let mut actions = Vec::new();

        peer.handle_message(secs(1.0), 1, &WireMessage::CheaterDetected { excluded: 10 }, &mut actions);
        assert!(!peer.link_active(0));
        assert_eq!(peer.n_active_peers(), 3);

        // a duplicate order must not shrink the view again
        peer.handle_message(secs(2.0), 1, &WireMessage::CheaterDetected { excluded: 10 }, &mut actions);
        assert!(!peer.link_active(0));
        assert_eq!(peer.n_active_peers(), 3);
    }

    #[test]
    fn test_leader_reselects_when_suspect_excluded_elsewhere() {
        let mut peer = test_peer(0, &[10, 20, 30]);
        let mut actions = Vec::new();
        peer.start(SimTime::ZERO, true, &mut actions);
        assert_eq!(peer.suspect_link(), Some(0));

        peer.handle_message(secs(5.0), 2, &WireMessage::CheaterDetected { excluded: 10 }, &mut actions);

        assert_eq!(peer.role(), Role::Leader);
        assert_eq!(peer.suspect_link(), Some(1));
        assert_eq!(peer.references(), 0);
    }

    #[test]
    fn test_messages_from_excluded_links_are_dropped() {
        let config = AcPeerConfig {
            cheater: Some(CheaterConfig::default()),
            ..test_config()
        };
        let mut peer = AcPeer::new(3, &[0, 1, 2], config, StdRng::seed_from_u64(7));
        let mut actions = Vec::new();
        peer.start(secs(0.0), false, &mut actions);

        peer.handle_message(secs(1.0), 2, &WireMessage::CheaterDetected { excluded: 0 }, &mut actions);

        // a move from the excluded neighbor must not feed the cheater's
        // minimum tracking
        peer.handle_message(secs(2.0), 0, &WireMessage::Move { stamp: secs(1.9) }, &mut actions);

        actions.clear();
        peer.handle_timer(secs(3.0), TimerKind::MoveInterval, &mut actions);
        let stamps: Vec<SimTime> = actions
            .iter()
            .filter_map(|a| match a {
                PeerAction::Send { message: WireMessage::Move { stamp }, .. } => Some(*stamp),
                _ => None,
            })
            .collect();
        assert!(!stamps.is_empty());
        assert!(stamps.iter().all(|s| *s == secs(3.0)), "interval saw nothing usable");
    }

    // ===== Timers =====

    #[test]
    fn test_term_timeout_releases_token() {
        let mut peer = test_peer(0, &[10, 20, 30]);
        let mut actions = Vec::new();
        peer.handle_message(secs(1.0), 0, &WireMessage::Token { evidence: None }, &mut actions);

        actions.clear();
        peer.handle_timer(secs(101.0), TimerKind::LeaderTerm { term: 1 }, &mut actions);

        assert_eq!(peer.role(), Role::Follower);
        assert_eq!(sent_tokens(&actions).len(), 1);
        assert_eq!(sent_tokens(&actions)[0].1, None, "timeout drops any evidence");

        // the stale timer from the finished term is inert
        actions.clear();
        peer.handle_message(secs(102.0), 1, &WireMessage::Token { evidence: None }, &mut actions);
        actions.clear();
        peer.handle_timer(secs(103.0), TimerKind::LeaderTerm { term: 1 }, &mut actions);
        assert!(actions.is_empty());
        assert_eq!(peer.role(), Role::Leader);
    }

    #[test]
    fn test_delayed_probe_fires_only_in_its_round() {
        let mut peer = test_peer(0, &[10, 20, 30]);
        let mut actions = Vec::new();
        peer.start(SimTime::ZERO, true, &mut actions);

        // two baseline samples switch the strategy to counter-attack
        peer.handle_message(secs(1.0), 0, &WireMessage::Move { stamp: secs(0.95) }, &mut actions);
        peer.handle_message(secs(2.0), 0, &WireMessage::Move { stamp: secs(1.95) }, &mut actions);

        actions.clear();
        peer.handle_timer(secs(2.5), TimerKind::NextMove, &mut actions);

        // the suspect's copy is held back, the others get it directly
        let direct: Vec<LinkIndex> = actions
            .iter()
            .filter_map(|a| match a {
                PeerAction::Send { link, message: WireMessage::Move { .. } } => Some(*link),
                _ => None,
            })
            .collect();
        assert_eq!(direct, vec![1, 2]);
        let probe = actions.iter().find_map(|a| match a {
            PeerAction::Schedule { timer: TimerKind::DelayedProbe { stamp, round }, delay } => {
                Some((*stamp, *round, *delay))
            }
            _ => None,
        });
        let (stamp, round, delay) = probe.expect("probe scheduled");
        assert_eq!(stamp, secs(2.5));
        assert_eq!(delay, secs(1.0), "opening induced delay");

        // in-round probe turns into the delayed copy
        actions.clear();
        peer.handle_timer(secs(3.5), TimerKind::DelayedProbe { stamp, round }, &mut actions);
        assert!(matches!(
            actions.as_slice(),
            [PeerAction::Send { link: 0, message: WireMessage::DelayedMove { .. } }]
        ));

        // suspect changes; the same probe is now inert
        peer.handle_message(secs(4.0), 1, &WireMessage::CheaterDetected { excluded: 10 }, &mut actions);
        actions.clear();
        peer.handle_timer(secs(4.5), TimerKind::DelayedProbe { stamp, round }, &mut actions);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_idle_leader_with_no_active_links() {
        let mut peer = test_peer(0, &[10, 20]);
        let mut actions = Vec::new();

        peer.handle_message(secs(1.0), 0, &WireMessage::CheaterDetected { excluded: 10 }, &mut actions);
        peer.handle_message(secs(1.5), 1, &WireMessage::CheaterDetected { excluded: 20 }, &mut actions);

        // links are already down, so the token handler ignores the dead
        // arrival link; inject leadership directly through start
        peer.start(secs(2.0), true, &mut actions);
        assert_eq!(peer.role(), Role::Leader);
        assert_eq!(peer.suspect_link(), None);

        // term expiry finds nobody to hand the token to and keeps it
        actions.clear();
        peer.handle_timer(secs(102.0), TimerKind::LeaderTerm { term: 1 }, &mut actions);
        assert_eq!(peer.role(), Role::Leader);
        assert!(sent_tokens(&actions).is_empty());
    }
}
