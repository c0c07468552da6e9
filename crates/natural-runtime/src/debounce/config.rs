#![forbid(unsafe_code)]

//! Debounce timing configuration.

use std::fmt;
use std::time::Duration;

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(2000);

/// Settings for a [`DebounceCoalescer`](super::DebounceCoalescer).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use natural_runtime::debounce::DebounceConfig;
///
/// let config = DebounceConfig::default().with_quiet_period(Duration::from_millis(500));
/// assert_eq!(config.quiet_period, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Time without new edits after which a pending update is sent.
    ///
    /// Every `debounce` call for a pending entity restarts this period.
    pub quiet_period: Duration,
}

impl DebounceConfig {
    #[must_use]
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// Errors loading a [`DebounceConfig`].
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// The document could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "invalid debounce config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(feature = "config-file")]
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    quiet_period_ms: Option<u64>,
}

#[cfg(feature = "config-file")]
impl DebounceConfig {
    /// Parse a TOML document such as `quiet_period_ms = 1500`.
    ///
    /// Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        if let Some(ms) = raw.quiet_period_ms {
            config.quiet_period = Duration::from_millis(ms);
        }
        Ok(config)
    }
}
