//! # acdcRust - Look-Ahead Cheat Detection
//!
//! A Rust implementation of a distributed cheat-detection protocol for
//! peer-to-peer real-time games. A single circulating token elects a rotating
//! Leader that probes one suspect at a time by delaying its own moves toward
//! it; peers vote on the evidence and exclude a cheater once a majority
//! agrees.
//!
//! ## Core Components
//!
//! - **AcPeer**: Peer state machine handling tokens, timers, voting and exclusion
//! - **DetectionStrategy**: Pluggable suspicion logic (latency increase, delay correlation)
//! - **CheaterState**: The adversary, back-stamping moves to gain look-ahead
//! - **Outcome Tally**: Process-wide detection quality counters
//!
//! ## Usage with Network Layer
//!
//! This library provides network-agnostic protocol components. You need to:
//! 1. Implement your transport and timer scheduling
//! 2. Create AcPeer instances for each node
//! 3. Route WireMessage values between peers via your network
//! 4. Call `peer.handle_message()` and `peer.handle_timer()` as events arrive
//!
//! ```no_run
//! use acdc_rust::{AcPeer, AcPeerConfig, SimTime};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! // Create a peer connected to three neighbors
//! let config = AcPeerConfig::default();
//! let mut peer = AcPeer::new(1, &[2, 3, 4], config, StdRng::seed_from_u64(42));
//!
//! // In your event loop:
//! let mut actions = Vec::new();
//! peer.start(SimTime::ZERO, true, &mut actions);
//! // - Deliver incoming messages with peer.handle_message(now, link, &msg, &mut actions)
//! // - Fire due timers with peer.handle_timer(now, timer, &mut actions)
//! // - Execute the Send/Schedule actions the peer pushed into `actions`
//! ```
//!
//! ## Testing and Simulation
//!
//! For exercising the protocol without a real network, see the separate
//! simulator in `simulator/`. It provides a discrete-event framework with
//! configurable topologies, link latencies and cheater placement.

// Core protocol modules
pub mod ac_cheater;
pub mod ac_correlation;
pub mod ac_increase;
pub mod ac_interface;
pub mod ac_peer;
pub mod ac_stats;
pub mod ac_strategy;

// Re-export commonly used types
pub use ac_interface::{
    DetectionEvent, DetectionSink, LinkIndex, NoOpSink, PeerAction, PeerId, SimTime, TimerKind,
    TokenEvidence, Verdict, WireMessage,
};
pub use ac_peer::{AcPeer, AcPeerConfig, Role};
// Public API for detection quality scoring (used by drivers to grade runs)
pub use ac_stats::{outcome_report, record_outcome, reset_outcome_tally, OutcomeReport};
pub use ac_strategy::{DetectionStrategy, StrategyConfig};
