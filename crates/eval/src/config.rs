//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! ```toml
//! seed = 42
//! template_max_iterations = 100
//! pattern_size_limit = 10485760
//! pattern_nest_limit = 250
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot parse engine configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine configuration field '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for selection, ordering and random expressions. `None` draws
    /// from system entropy.
    pub seed: Option<u64>,
    /// Template processing restarts at most this many times before the
    /// template variables fall back to their defaults.
    pub template_max_iterations: u32,
    /// Compiled size limit handed to the pattern engine, in bytes.
    pub pattern_size_limit: usize,
    /// Nesting limit handed to the pattern engine.
    pub pattern_nest_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            seed: None,
            template_max_iterations: 100,
            pattern_size_limit: 10 * (1 << 20),
            pattern_nest_limit: 250,
        }
    }
}

impl EngineConfig {
    pub fn seeded(seed: u64) -> Self {
        EngineConfig {
            seed: Some(seed),
            ..EngineConfig::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.template_max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "template_max_iterations",
                message: "must be at least 1".to_string(),
            });
        }
        if self.pattern_size_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "pattern_size_limit",
                message: "must be positive".to_string(),
            });
        }
        if self.pattern_nest_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "pattern_nest_limit",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.template_max_iterations, 100);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = EngineConfig::from_toml_str("seed = 7\npattern_nest_limit = 10\n").unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.pattern_nest_limit, 10);
        assert_eq!(config.template_max_iterations, 100);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let err = EngineConfig::from_toml_str("template_max_iterations = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "template_max_iterations",
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("seed = ["),
            Err(ConfigError::Parse(_))
        ));
    }
}
