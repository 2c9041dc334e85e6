// Config - Simulation constants and process settings
// SimConfig deserializes with defaults; AppConfig is read from the environment

use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::physics_engine::{G, MIN_DISTANCE_SQ};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8001";

/// Numerical parameters of the simulation loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub gravity_constant: f64,
    /// Gravity stability floor (squared distance)
    pub min_distance_sq: f64,
    /// Physics sub-step length in seconds
    pub fixed_step: f64,
    pub max_substeps: usize,
    /// Seconds between a merge and the merged body appearing
    pub merge_delay: f64,
    /// Fixed seed for reproducible effects
    pub rng_seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity_constant: G,
            min_distance_sq: MIN_DISTANCE_SQ,
            fixed_step: 1.0 / 60.0,
            max_substeps: 3,
            merge_delay: 0.05,
            rng_seed: None,
        }
    }
}

/// Process-level settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base: String,
    pub frame_ms: u64,
    pub sim: SimConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            frame_ms: 16,
            sim: SimConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `STARFALL_API_BASE`, `STARFALL_SEED` and `STARFALL_FRAME_MS`.
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(base) = lookup("STARFALL_API_BASE").filter(|s| !s.trim().is_empty()) {
            config.api_base = base.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup("STARFALL_SEED") {
            match raw.trim().parse::<u64>() {
                Ok(seed) => config.sim.rng_seed = Some(seed),
                Err(_) => warn!("ignoring STARFALL_SEED={:?}: not an unsigned integer", raw),
            }
        }

        if let Some(raw) = lookup("STARFALL_FRAME_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.frame_ms = ms,
                _ => warn!("ignoring STARFALL_FRAME_MS={:?}", raw),
            }
        }

        config
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_sim_config_defaults_from_empty_json() {
        let config: SimConfig = serde_json::from_str("{}").unwrap();
        assert!((config.gravity_constant - 10.0).abs() < 1e-12);
        assert!((config.min_distance_sq - 1.0).abs() < 1e-12);
        assert_eq!(config.max_substeps, 3);
        assert!((config.merge_delay - 0.05).abs() < 1e-12);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn test_app_config_lookup() {
        let vars: HashMap<&str, &str> = [
            ("STARFALL_API_BASE", "http://localhost:9000/"),
            ("STARFALL_SEED", "42"),
            ("STARFALL_FRAME_MS", "zero"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_base, "http://localhost:9000");
        assert_eq!(config.sim.rng_seed, Some(42));
        assert_eq!(config.frame_ms, 16);
    }
}
