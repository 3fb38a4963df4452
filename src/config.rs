//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable for the resolution depth bound.
pub const ENV_MAX_DEPTH: &str = "MSG_REFINE_MAX_DEPTH";
/// Environment variable for the per-fetch timeout in seconds (`0` disables it).
pub const ENV_FETCH_TIMEOUT_SECS: &str = "MSG_REFINE_FETCH_TIMEOUT_SECS";
/// Environment variable toggling refinement of forwarded node chains.
pub const ENV_FORWARD_NODES: &str = "MSG_REFINE_FORWARD_NODES";

/// Refinement engine configuration.
#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// How many times a position may be re-resolved before the pass is
    /// considered non-terminating.
    pub max_depth: u32,
    /// Upper bound on a single downloader call. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
    /// Whether chains inside downloaded forward nodes are refined too.
    pub refine_forward_nodes: bool,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            fetch_timeout: Some(Duration::from_secs(30)),
            refine_forward_nodes: true,
        }
    }
}

impl RefineConfig {
    /// Build a config from `MSG_REFINE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            let depth: u32 = raw.trim().parse().map_err(|e| invalid(ENV_MAX_DEPTH, e))?;
            if depth == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_MAX_DEPTH.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            config.max_depth = depth;
        }

        if let Some(raw) = lookup(ENV_FETCH_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| invalid(ENV_FETCH_TIMEOUT_SECS, e))?;
            config.fetch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(raw) = lookup(ENV_FORWARD_NODES) {
            config.refine_forward_nodes = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_FORWARD_NODES.to_string(),
                        message: format!("expected a boolean, got '{other}'"),
                    });
                }
            };
        }

        Ok(config)
    }
}

fn invalid(key: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: err.to_string(),
    }
}
