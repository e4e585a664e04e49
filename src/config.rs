//! Configuration for the voting engine
//!
//! Loads tunables from environment variables with validation.

use crate::alpha::ALPHABET_LEN;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Engine tunables for one voting context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteConfig {
    /// Minimum quick-ratio score for a free-text vote to resolve
    ///
    /// A free-text vote only resolves to its best-scoring option when the
    /// score strictly exceeds this threshold (default: 0.4).
    pub fuzzy_match_threshold: f64,

    /// Total cell width of the rendered tally bars (default: 20)
    pub bar_width: usize,

    /// Glyph for a filled tally bar cell
    pub bar_filled: char,

    /// Glyph for an empty tally bar cell
    pub bar_empty: char,

    /// Maximum number of options per vote (at most one per letter)
    pub max_options: usize,

    /// Minimum milliseconds between reaction-driven re-renders
    ///
    /// 0 disables debouncing: every reaction event re-renders the tally.
    pub render_min_interval_ms: u64,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            fuzzy_match_threshold: 0.4,
            bar_width: 20,
            bar_filled: '█',
            bar_empty: '░',
            max_options: ALPHABET_LEN,
            render_min_interval_ms: 0,
        }
    }
}

impl VoteConfig {
    /// Load engine tunables from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        let fuzzy_match_threshold = std::env::var("TALLY_FUZZY_MATCH_THRESHOLD")
            .map(|s| s.parse())
            .unwrap_or(Ok(defaults.fuzzy_match_threshold))
            .map_err(|_| Error::internal("Invalid TALLY_FUZZY_MATCH_THRESHOLD"))?;

        let bar_width = std::env::var("TALLY_BAR_WIDTH")
            .map(|s| s.parse())
            .unwrap_or(Ok(defaults.bar_width))
            .map_err(|_| Error::internal("Invalid TALLY_BAR_WIDTH"))?;

        let max_options = std::env::var("TALLY_MAX_OPTIONS")
            .map(|s| s.parse())
            .unwrap_or(Ok(defaults.max_options))
            .map_err(|_| Error::internal("Invalid TALLY_MAX_OPTIONS"))?;

        let render_min_interval_ms = std::env::var("TALLY_RENDER_MIN_INTERVAL_MS")
            .map(|s| s.parse())
            .unwrap_or(Ok(defaults.render_min_interval_ms))
            .map_err(|_| Error::internal("Invalid TALLY_RENDER_MIN_INTERVAL_MS"))?;

        let config = Self {
            fuzzy_match_threshold,
            bar_width,
            max_options,
            render_min_interval_ms,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        Self::default()
    }

    /// Validate tunable ranges
    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.fuzzy_match_threshold) {
            return Err(Error::internal(
                "fuzzy_match_threshold must be in [0.0, 1.0)",
            ));
        }

        if self.bar_width == 0 {
            return Err(Error::internal("bar_width must be positive"));
        }

        if self.max_options == 0 || self.max_options > ALPHABET_LEN {
            return Err(Error::internal(format!(
                "max_options must be in [1, {ALPHABET_LEN}]"
            )));
        }

        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub vote: VoteConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        let vote = VoteConfig::from_env()?;

        let logging = LoggingConfig {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        Ok(Self { vote, logging })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        Self {
            vote: VoteConfig::for_testing(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tunables() {
        let config = VoteConfig::default();

        assert_eq!(config.fuzzy_match_threshold, 0.4);
        assert_eq!(config.bar_width, 20);
        assert_eq!(config.max_options, ALPHABET_LEN);
        assert_eq!(config.render_min_interval_ms, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_ranges() {
        let mut config = VoteConfig::default();
        config.fuzzy_match_threshold = 1.0;
        assert!(config.validate().is_err());

        let mut config = VoteConfig::default();
        config.bar_width = 0;
        assert!(config.validate().is_err());

        let mut config = VoteConfig::default();
        config.max_options = ALPHABET_LEN + 1;
        assert!(config.validate().is_err());
    }
}
