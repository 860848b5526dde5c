use std::path::Path;
use std::time::Duration;

use colosseum_logic::{GameType, Personality};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Longest match the engine will run
pub const MAX_ROUNDS: u32 = 50;
/// Most predictions an agent may make in one round
pub const MAX_BRANCHING: u32 = 10;

/// Engine-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Predictions each agent produces per round
    #[serde(default = "default_branching")]
    pub branching_factor: u32,
    /// Thinking phase deadline
    #[serde(default = "default_thinking_deadline")]
    pub thinking_deadline_ms: u64,
    /// Pause between a round_end and the next round_start
    #[serde(default)]
    pub round_delay_ms: u64,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_interval_ms: u64,
    /// Matches kept in the arena at once, finished ones included
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_branching() -> u32 {
    3
}

fn default_thinking_deadline() -> u64 {
    5_000
}

fn default_broadcast_capacity() -> usize {
    1024
}

fn default_heartbeat() -> u64 {
    15_000
}

fn default_max_matches() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            branching_factor: default_branching(),
            thinking_deadline_ms: default_thinking_deadline(),
            round_delay_ms: 0,
            broadcast_capacity: default_broadcast_capacity(),
            heartbeat_interval_ms: default_heartbeat(),
            max_matches: default_max_matches(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("branching_factor", default_branching())?
            .set_default("thinking_deadline_ms", default_thinking_deadline())?
            .set_default("round_delay_ms", 0)?
            .set_default("broadcast_capacity", default_broadcast_capacity() as u64)?
            .set_default("heartbeat_interval_ms", default_heartbeat())?
            .set_default("max_matches", default_max_matches() as u64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // config/<COLOSSEUM_ENV>.toml, e.g. config/production.toml
            .add_source(
                File::from(config_dir.join(
                    std::env::var("COLOSSEUM_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // COLOSSEUM_THINKING_DEADLINE_MS, COLOSSEUM_LOGGING__LEVEL, ...
            .add_source(
                Environment::with_prefix("COLOSSEUM")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.branching_factor == 0 || self.branching_factor > MAX_BRANCHING {
            return Err(EngineError::InvalidConfig(format!(
                "branching_factor must be in 1..={}, got {}",
                MAX_BRANCHING, self.branching_factor
            )));
        }
        if self.thinking_deadline_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "thinking_deadline_ms must be positive".to_string(),
            ));
        }
        if self.broadcast_capacity == 0 || self.max_matches == 0 {
            return Err(EngineError::InvalidConfig(
                "broadcast_capacity and max_matches must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn thinking_deadline(&self) -> Duration {
        Duration::from_millis(self.thinking_deadline_ms)
    }

    pub fn round_delay(&self) -> Duration {
        Duration::from_millis(self.round_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// What `startMatch` receives. Game type and personalities arrive as text
/// from the transport and are checked here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub game_type: String,
    #[serde(default = "default_red")]
    pub red_personality: String,
    #[serde(default = "default_blue")]
    pub blue_personality: String,
    /// Defaults to the game's usual length
    #[serde(default)]
    pub total_rounds: Option<i64>,
    /// Random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_red() -> String {
    "aggressive".to_string()
}

fn default_blue() -> String {
    "defensive".to_string()
}

/// A [`MatchConfig`] that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidMatchConfig {
    pub game_type: GameType,
    pub red: Personality,
    pub blue: Personality,
    pub total_rounds: u32,
    pub seed: Option<u64>,
}

impl MatchConfig {
    pub fn new(game_type: GameType, red: Personality, blue: Personality, total_rounds: u32) -> Self {
        Self {
            game_type: game_type.as_str().to_string(),
            red_personality: red.as_str().to_string(),
            blue_personality: blue.as_str().to_string(),
            total_rounds: Some(total_rounds as i64),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<ValidMatchConfig> {
        let game_type: GameType = self.game_type.parse().map_err(EngineError::InvalidConfig)?;
        let red: Personality = self
            .red_personality
            .parse()
            .map_err(EngineError::InvalidConfig)?;
        let blue: Personality = self
            .blue_personality
            .parse()
            .map_err(EngineError::InvalidConfig)?;
        let rounds = self
            .total_rounds
            .unwrap_or(game_type.default_rounds() as i64);
        if rounds <= 0 || rounds > MAX_ROUNDS as i64 {
            return Err(EngineError::InvalidConfig(format!(
                "totalRounds must be in 1..={}, got {}",
                MAX_ROUNDS, rounds
            )));
        }
        Ok(ValidMatchConfig {
            game_type,
            red,
            blue,
            total_rounds: rounds as u32,
            seed: self.seed,
        })
    }
}
