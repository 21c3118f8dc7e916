use serde::Deserialize;

use gagaball_core::room::MAX_PLAYERS;
use gagaball_sim::ai::DifficultyAssignment;
use gagaball_sim::config::MatchConfig;

/// Top-level host configuration, loaded from `gagaball.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub tick: TickConfig,
    #[serde(rename = "match")]
    pub game: MatchSettings,
    pub logging: LoggingConfig,
    pub lobby: LobbyConfig,
}

/// Fixed-interval tick loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    pub tick_rate_hz: f32,
    /// Simulated seconds per real second. Above 1 fast-forwards a match.
    pub time_scale: f32,
    /// Emit a snapshot every this many ticks; 0 turns snapshots off.
    pub snapshot_every: u32,
    /// Hard stop for a match that somehow never ends; 0 means no limit.
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            time_scale: 1.0,
            snapshot_every: 30,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Simulated seconds advanced per tick.
    pub fn dt(&self) -> f32 {
        self.time_scale / self.tick_rate_hz
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub ai_opponents: u8,
    /// Fixed seed for reproducible matches; random when unset.
    pub seed: Option<u64>,
    pub difficulty: DifficultyAssignment,
    /// Steer the local humans with the bot controller instead of standing
    /// still.
    pub autopilot: bool,
    /// Gameplay tuning file. Falls back to `MatchConfig::load()` when unset.
    pub config_path: Option<String>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            ai_opponents: 3,
            seed: None,
            difficulty: DifficultyAssignment::ByIndex,
            autopilot: true,
            config_path: None,
        }
    }
}

impl MatchSettings {
    /// Gameplay tuning for this host.
    pub fn match_config(&self) -> MatchConfig {
        let Some(path) = &self.config_path else {
            return MatchConfig::load();
        };
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<MatchConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "Loaded match tuning");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path, "Failed to parse match tuning: {e}, using defaults");
                    MatchConfig::default()
                },
            },
            Err(e) => {
                tracing::warn!(path = %path, "Failed to read match tuning: {e}, using defaults");
                MatchConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is not set.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Room settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    pub host_name: String,
    /// In-process clients that join over the memory transport. With none the
    /// host plays a single-player match.
    pub loopback_clients: usize,
    pub update_interval_ms: u64,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            host_name: "Host".to_string(),
            loopback_clients: 1,
            update_interval_ms: 50,
        }
    }
}

impl HostConfig {
    /// Check the configuration. Returns the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if !self.tick.tick_rate_hz.is_finite() || self.tick.tick_rate_hz <= 0.0 {
            return Err("tick.tick_rate_hz must be > 0".to_string());
        }
        if self.tick.tick_rate_hz > 1000.0 {
            return Err("tick.tick_rate_hz must be <= 1000".to_string());
        }
        if !self.tick.time_scale.is_finite() || self.tick.time_scale <= 0.0 {
            return Err("tick.time_scale must be > 0".to_string());
        }
        if self.lobby.update_interval_ms == 0 {
            return Err("lobby.update_interval_ms must be > 0".to_string());
        }
        if self.lobby.host_name.trim().is_empty() {
            return Err("lobby.host_name must not be empty".to_string());
        }
        let total = 1 + self.lobby.loopback_clients + usize::from(self.game.ai_opponents);
        if total > MAX_PLAYERS {
            return Err(format!(
                "host, {} loopback clients and {} AI opponents exceed {MAX_PLAYERS} players",
                self.lobby.loopback_clients, self.game.ai_opponents
            ));
        }
        if self.lobby.loopback_clients == 0 && self.game.ai_opponents == 0 {
            return Err("a match needs at least one opponent".to_string());
        }
        Ok(())
    }

    /// Load config from `gagaball.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("gagaball.toml") {
            Ok(content) => match toml::from_str::<HostConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from gagaball.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse gagaball.toml: {e}, using defaults");
                    HostConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No gagaball.toml found, using defaults");
                HostConfig::default()
            },
        };
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("GAGABALL_TICK_RATE")
            && let Ok(n) = val.parse::<f32>()
        {
            self.tick.tick_rate_hz = n;
        }
        if let Ok(val) = std::env::var("GAGABALL_AI_OPPONENTS")
            && let Ok(n) = val.parse::<u8>()
        {
            self.game.ai_opponents = n;
        }
        if let Ok(val) = std::env::var("GAGABALL_SEED")
            && let Ok(n) = val.parse::<u64>()
        {
            self.game.seed = Some(n);
        }
        if let Ok(val) = std::env::var("GAGABALL_LOOPBACK_CLIENTS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.lobby.loopback_clients = n;
        }
        if let Ok(val) = std::env::var("GAGABALL_LOG_JSON")
            && let Ok(b) = val.parse::<bool>()
        {
            self.logging.json = b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.tick.tick_rate_hz, 60.0);
        assert_eq!(cfg.game.ai_opponents, 3);
        assert!(cfg.game.seed.is_none());
        assert_eq!(cfg.lobby.loopback_clients, 1);
        assert_eq!(cfg.logging.filter, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_sections() {
        let toml_str = r#"
[tick]
tick_rate_hz = 30.0
time_scale = 4.0

[match]
ai_opponents = 5
seed = 77
difficulty = "weighted"
autopilot = false

[logging]
json = true

[lobby]
host_name = "Arena"
loopback_clients = 2
"#;
        let cfg: HostConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.tick.tick_rate_hz, 30.0);
        assert!((cfg.tick.dt() - 4.0 / 30.0).abs() < 1e-6);
        assert_eq!(cfg.game.ai_opponents, 5);
        assert_eq!(cfg.game.seed, Some(77));
        assert_eq!(cfg.game.difficulty, DifficultyAssignment::Weighted);
        assert!(!cfg.game.autopilot);
        assert!(cfg.logging.json);
        assert_eq!(cfg.lobby.host_name, "Arena");
        assert_eq!(cfg.lobby.update_interval_ms, 50, "Unset keys keep defaults");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_overfull_room() {
        let mut cfg = HostConfig::default();
        cfg.game.ai_opponents = 6;
        cfg.lobby.loopback_clients = 2;
        assert!(cfg.validate().unwrap_err().contains("exceed"));
    }

    #[test]
    fn validate_rejects_bad_tick_rate() {
        let mut cfg = HostConfig::default();
        cfg.tick.tick_rate_hz = 0.0;
        assert!(cfg.validate().is_err());
        cfg.tick.tick_rate_hz = f32::NAN;
        assert!(cfg.validate().is_err());
        cfg.tick.tick_rate_hz = 5000.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_match() {
        let mut cfg = HostConfig::default();
        cfg.game.ai_opponents = 0;
        cfg.lobby.loopback_clients = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_tuning_file_falls_back_to_defaults() {
        let settings = MatchSettings {
            config_path: Some("/nonexistent/match.toml".to_string()),
            ..MatchSettings::default()
        };
        assert_eq!(settings.match_config().arena_radius, 300.0);
    }
}
