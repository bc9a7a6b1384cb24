//! Engine limits and their environment overrides.

use serde::{Deserialize, Serialize};

/// Configuration for the flow engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling on scheduler iterations for one run.
    pub max_iterations: u32,
    /// Per-loop-node ceiling on loop-back re-entries.
    pub max_loop_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_iterations: 1000,
            max_loop_count: 10,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by the `MAX_ITERATIONS` and `MAX_LOOP_COUNT`
    /// environment variables when present and parseable.
    pub fn from_env() -> Self {
        let mut config = EngineConfig::default();
        if let Some(v) = read_env_u32("MAX_ITERATIONS") {
            config.max_iterations = v;
        }
        if let Some(v) = read_env_u32("MAX_LOOP_COUNT") {
            config.max_loop_count = v;
        }
        config
    }
}

fn read_env_u32(name: &str) -> Option<u32> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("ignoring unparseable {}={}", name, raw);
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.max_loop_count, 10);
    }

    #[test]
    fn test_engine_config_serde() {
        let config = EngineConfig {
            max_iterations: 5,
            max_loop_count: 2,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_iterations"], 5);
        let back: EngineConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.max_loop_count, 2);
    }
}
