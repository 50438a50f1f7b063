// Cheat Detection Simulator Configuration

use acdc_rust::ac_cheater::CheaterConfig;
use acdc_rust::ac_correlation::CorrelationConfig;
use acdc_rust::ac_increase::IncreaseConfig;
use acdc_rust::{AcPeerConfig, SimTime, StrategyConfig};

// ============================================================================
// Main Configuration
// ============================================================================

/// Main configuration for a cheat detection simulation
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct CheatSimConfig {
    /// Number of peers in the full mesh
    pub num_peers: usize,

    /// Which peers cheat, as indices into the mesh (creation order)
    pub cheaters: Vec<usize>,

    /// Simulated run length, seconds
    pub duration_s: f64,

    /// Random seed for reproducibility; drawn fresh when absent
    pub seed: Option<u64>,

    /// Protocol parameters shared by every peer
    pub protocol: ProtocolConfig,

    /// Network simulation parameters
    pub network: NetworkConfig,

    /// Output configuration
    pub output: OutputConfig,
}

// ============================================================================
// Protocol Configuration
// ============================================================================

/// Protocol tuning handed to every peer
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Leadership term length, seconds
    pub timeout_leader_s: f64,

    /// Uniform range for the pause between an honest peer's moves, seconds
    pub move_interval_s: (f64, f64),

    /// Cheater timestamp-collection interval, seconds
    pub cheater_interval_s: f64,

    /// How far below the observed minimum a cheater back-stamps, seconds
    pub cheater_offset_s: f64,

    /// Detection strategy every leader runs
    pub strategy: StrategyConfig,
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Network behavior simulation
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Uniform one-way link latency range, seconds; redrawn per message
    pub latency_s: (f64, f64),
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output and logging
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// CSV output file path for the latency time series
    pub csv_path: Option<String>,

    /// Verbose logging
    pub verbose: bool,
}

// ============================================================================
// Validation
// ============================================================================

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Detection needs at least a leader and a suspect
    TooFewPeers(usize),
    /// A cheater index does not name a peer
    CheaterOutOfRange { index: usize, num_peers: usize },
    /// Every peer cheats; there is nobody left to convince
    NoHonestPeers,
    /// An interval whose bounds are inverted or negative
    BadRange {
        field: &'static str,
        lo: f64,
        hi: f64,
    },
    /// A strategy parameter that cannot work
    BadStrategy(&'static str),
    /// Zero or negative run length
    ZeroDuration,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::TooFewPeers(n) => write!(f, "need at least 2 peers, got {}", n),
            ConfigError::CheaterOutOfRange { index, num_peers } => {
                write!(f, "cheater index {} out of range ({} peers)", index, num_peers)
            }
            ConfigError::NoHonestPeers => write!(f, "at least one peer must be honest"),
            ConfigError::BadRange { field, lo, hi } => {
                write!(f, "bad range for {}: {} .. {}", field, lo, hi)
            }
            ConfigError::BadStrategy(what) => write!(f, "bad strategy parameter: {}", what),
            ConfigError::ZeroDuration => write!(f, "duration_s must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl CheatSimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_peers < 2 {
            return Err(ConfigError::TooFewPeers(self.num_peers));
        }
        for &index in &self.cheaters {
            if index >= self.num_peers {
                return Err(ConfigError::CheaterOutOfRange {
                    index,
                    num_peers: self.num_peers,
                });
            }
        }
        if self.cheaters.len() >= self.num_peers {
            return Err(ConfigError::NoHonestPeers);
        }
        if self.duration_s <= 0.0 {
            return Err(ConfigError::ZeroDuration);
        }

        check_range("network.latency_s", self.network.latency_s, 0.0)?;
        check_range("protocol.move_interval_s", self.protocol.move_interval_s, f64::MIN_POSITIVE)?;
        if self.protocol.timeout_leader_s <= 0.0 {
            return Err(ConfigError::BadRange {
                field: "protocol.timeout_leader_s",
                lo: self.protocol.timeout_leader_s,
                hi: self.protocol.timeout_leader_s,
            });
        }
        if self.protocol.cheater_interval_s <= 0.0 || self.protocol.cheater_offset_s < 0.0 {
            return Err(ConfigError::BadRange {
                field: "protocol.cheater_interval_s",
                lo: self.protocol.cheater_interval_s,
                hi: self.protocol.cheater_offset_s,
            });
        }

        match &self.protocol.strategy {
            StrategyConfig::Increase(c) => {
                if c.window == 0 {
                    return Err(ConfigError::BadStrategy("increase window must be >= 1"));
                }
                if c.growth <= 1.0 {
                    return Err(ConfigError::BadStrategy("increase growth must exceed 1.0"));
                }
            }
            StrategyConfig::Correlation(c) => {
                if c.window == 0 || c.repetitions < 2 {
                    return Err(ConfigError::BadStrategy(
                        "correlation needs window >= 1 and repetitions >= 2",
                    ));
                }
                check_range("strategy.delay_range_s", c.delay_range_s, 0.0)?;
            }
        }
        Ok(())
    }

    /// Per-peer protocol config; `cheater` switches the peer to the
    /// adversarial move source.
    pub fn peer_config(&self, cheater: bool) -> AcPeerConfig {
        AcPeerConfig {
            timeout_leader: SimTime::from_secs_f64(self.protocol.timeout_leader_s),
            move_interval_s: self.protocol.move_interval_s,
            strategy: self.protocol.strategy.clone(),
            cheater: cheater.then(|| CheaterConfig {
                interval: SimTime::from_secs_f64(self.protocol.cheater_interval_s),
                offset: SimTime::from_secs_f64(self.protocol.cheater_offset_s),
            }),
        }
    }

    /// Preset tuned so the increase strategy concludes within a short run.
    pub fn quick_increase() -> Self {
        Self {
            duration_s: 20_000.0,
            protocol: ProtocolConfig {
                timeout_leader_s: 600.0,
                strategy: StrategyConfig::Increase(IncreaseConfig {
                    window: 6,
                    growth: 1.5,
                    ..IncreaseConfig::default()
                }),
                ..ProtocolConfig::default()
            },
            ..Self::default()
        }
    }

    /// Preset for the correlation strategy with a short probe schedule.
    pub fn quick_correlation() -> Self {
        Self {
            duration_s: 20_000.0,
            protocol: ProtocolConfig {
                timeout_leader_s: 600.0,
                strategy: StrategyConfig::Correlation(CorrelationConfig {
                    repetitions: 10,
                    window: 4,
                    ..CorrelationConfig::default()
                }),
                ..ProtocolConfig::default()
            },
            ..Self::default()
        }
    }
}

fn check_range(field: &'static str, (lo, hi): (f64, f64), min: f64) -> Result<(), ConfigError> {
    if lo < min || hi < lo {
        return Err(ConfigError::BadRange { field, lo, hi });
    }
    Ok(())
}

// ============================================================================
// Default Implementations
// ============================================================================

impl Default for CheatSimConfig {
    fn default() -> Self {
        Self {
            num_peers: 5,
            cheaters: vec![3],
            duration_s: 50_000.0,
            seed: None,
            protocol: ProtocolConfig::default(),
            network: NetworkConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            timeout_leader_s: 2000.0,
            move_interval_s: (0.5, 1.5),
            cheater_interval_s: 1.0,
            cheater_offset_s: 1.0,
            strategy: StrategyConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            latency_s: (0.01, 0.05),
        }
    }
}
