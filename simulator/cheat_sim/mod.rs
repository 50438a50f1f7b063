// Cheat Detection Simulator Module

pub mod config;
pub mod stats;
pub mod runner;

// Re-export commonly used types
pub use config::{
    CheatSimConfig,
    ConfigError,
    NetworkConfig,
    OutputConfig,
    ProtocolConfig,
};

pub use stats::{
    ExclusionRecord,
    LatencyPoint,
    MessageCounts,
    RecordingSink,
    SimulationResult,
    VerdictRecord,
};

pub use runner::CheatSimRunner;
