// all the same numeric type of some size to allow casting/interop
pub type PeerId = u64;

/// Index into a peer's link table (full mesh: one link per neighbor).
pub type LinkIndex = usize;

// Simulated time. Duration is totally ordered, so it can key the event
// queue directly; strategy math converts to seconds via as_secs_f64().
pub type SimTime = std::time::Duration;

/// Three-valued classification of a suspect.
///
/// Verdicts latch: once a strategy leaves `Unknown` it stays on that
/// answer until the suspect changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Unknown,
    Cheater,
    NotCheater,
}

/// Accusation state carried inside the leadership token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TokenEvidence {
    /// Peer under investigation.
    pub suspect: PeerId,
    /// How many leaders have independently classified it as Cheater.
    pub votes: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WireMessage {
    /// Ordinary broadcast game move.
    Move { stamp: SimTime },
    /// The leader's copy of its own move, deliberately held back before
    /// being sent to the suspect. Carries the original stamp.
    DelayedMove { stamp: SimTime },
    /// Leadership transfer, with accusation evidence when a pursuit is
    /// being handed over.
    Token { evidence: Option<TokenEvidence> },
    /// Informational broadcast: the sender gave up the token. Receivers
    /// need no state change.
    TokenReleased,
    /// Exclusion order: deactivate the link to `excluded`.
    CheaterDetected { excluded: PeerId },
}

/// Timers a peer asks its scheduler for.
///
/// The scheduler cannot cancel, so timers that can go stale carry an
/// epoch tag and are ignored when the tag no longer matches (see
/// `AcPeer::handle_timer`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// End of a leadership term. `term` is the leadership epoch the timer
    /// was armed in.
    LeaderTerm { term: u64 },
    /// Delayed-probe release toward the suspect. `round` is the probe
    /// epoch (bumped on every suspect change), `stamp` the original move
    /// timestamp to forward.
    DelayedProbe { stamp: SimTime, round: u64 },
    /// End of a cheater's timestamp-collection interval.
    MoveInterval,
    /// Next ordinary move generation.
    NextMove,
}

/// What a peer wants done after handling one event.
#[derive(Clone, Debug, PartialEq)]
pub enum PeerAction {
    /// Transmit a message on one of this peer's links.
    Send { link: LinkIndex, message: WireMessage },
    /// Arm a timer `delay` from now.
    Schedule { delay: SimTime, timer: TimerKind },
}

// ============================================================================
// Event Logging System
// ============================================================================

/// Events emitted by the detection protocol for debugging and analysis
#[derive(Debug, Clone)]
pub enum DetectionEvent {
    /// Became leader (received or kept the token)
    LeaderElected { term: u64 },
    /// Gave the token away
    TokenReleased { to: PeerId, with_evidence: bool },
    /// Relayed a token without adopting it (already voted on its suspect)
    TokenRelayed { suspect: PeerId, to: PeerId },
    /// Started probing a suspect
    SuspectChosen { suspect: PeerId, carried_votes: u32 },
    /// One measured latency sample from the suspect
    LatencySample {
        suspect: PeerId,
        latency: SimTime,
        induced_delay: SimTime,
    },
    /// The strategy reached a classification
    VerdictReached {
        suspect: PeerId,
        verdict: Verdict,
        votes: u32,
        elapsed: SimTime,
    },
    /// Majority reached, suspect excluded
    CheaterExcluded { excluded: PeerId, votes: u32 },
    /// A link was deactivated (own exclusion or received order)
    LinkDeactivated { peer: PeerId, active_left: usize },
}

/// Trait for consuming events from the detection protocol
pub trait DetectionSink {
    fn log(&mut self, now: SimTime, peer: PeerId, event: DetectionEvent);
}

/// No-op event sink for production use (zero overhead)
pub struct NoOpSink;

impl DetectionSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _now: SimTime, _peer: PeerId, _event: DetectionEvent) {
        // Intentionally empty - compiler should optimize this away
    }
}
