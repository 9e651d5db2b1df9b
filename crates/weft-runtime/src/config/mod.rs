//! weft runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder methods
//! 2. Environment variables (runtime)
//! 3. User's config file named by `WEFT_CONFIG_RS` (compile-time)
//! 4. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env()
//!     .stack_size(256 * 1024)
//!     .park_timeout(Duration::from_millis(10));
//! ```

pub mod defaults;

use std::sync::OnceLock;
use std::time::Duration;
use weft_core::constants::{MAX_STACK_SIZE, MIN_STACK_SIZE};
use weft_core::env::{env_get, env_get_bool, env_get_bytes};
use weft_core::error::ConfigError;

/// Runtime configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for fibers built without an explicit size
    pub stack_size: usize,
    /// Inaccessible pages below each stack (unix only)
    pub guard_pages: usize,
    /// Upper bound on one executor wait before re-checking the stop flag
    pub park_timeout: Duration,
    /// Log fiber switches and executor activity at debug level
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `WEFT_STACK_SIZE` - Default fiber stack size (`512K`, `1M`, bytes)
    /// - `WEFT_GUARD_PAGES` - Guard pages below each stack
    /// - `WEFT_PARK_TIMEOUT_MS` - Executor wait bound in milliseconds
    /// - `WEFT_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        Self {
            stack_size: env_get_bytes("WEFT_STACK_SIZE", defaults::STACK_SIZE),
            guard_pages: env_get("WEFT_GUARD_PAGES", defaults::GUARD_PAGES),
            park_timeout: Duration::from_millis(env_get(
                "WEFT_PARK_TIMEOUT_MS",
                defaults::PARK_TIMEOUT_MS,
            )),
            debug_logging: env_get_bool("WEFT_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Create config with compile-time defaults only (no env override).
    pub fn new() -> Self {
        Self {
            stack_size: defaults::STACK_SIZE,
            guard_pages: defaults::GUARD_PAGES,
            park_timeout: Duration::from_millis(defaults::PARK_TIMEOUT_MS),
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn guard_pages(mut self, pages: usize) -> Self {
        self.guard_pages = pages;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.stack_size > MAX_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be <= 1GB"));
        }
        if self.guard_pages > 16 {
            return Err(ConfigError::InvalidValue("guard_pages must be <= 16"));
        }
        if self.park_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("park_timeout must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("weft configuration:");
        eprintln!("  stack_size:     {}", self.stack_size);
        eprintln!("  guard_pages:    {}", self.guard_pages);
        eprintln!("  park_timeout:   {:?}", self.park_timeout);
        eprintln!("  debug_logging:  {}", self.debug_logging);
    }
}

static GLOBAL: OnceLock<RuntimeConfig> = OnceLock::new();

/// Process-wide configuration, read from the environment on first use.
///
/// An invalid environment falls back to the compile-time defaults.
pub fn global() -> &'static RuntimeConfig {
    GLOBAL.get_or_init(|| {
        let config = RuntimeConfig::from_env();
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                weft_core::kwarn!("{}; using built-in defaults", e);
                RuntimeConfig::new()
            }
        }
    })
}

/// Install the process-wide configuration before first use.
///
/// Returns the rejected config if one is already in place.
pub fn set_global(config: RuntimeConfig) -> Result<(), RuntimeConfig> {
    GLOBAL.set(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::new();
        assert_eq!(config.stack_size, 512 * 1024);
        assert!(config.validate().is_ok());
        assert!(global().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .stack_size(64 * 1024)
            .guard_pages(2)
            .park_timeout(Duration::from_millis(5))
            .debug_logging(true);

        assert_eq!(config.stack_size, 64 * 1024);
        assert_eq!(config.guard_pages, 2);
        assert_eq!(config.park_timeout, Duration::from_millis(5));
        assert!(config.debug_logging);
    }

    #[test]
    fn test_validation() {
        assert!(RuntimeConfig::new().stack_size(4096).validate().is_err());
        assert!(RuntimeConfig::new().stack_size(2 << 30).validate().is_err());
        assert!(RuntimeConfig::new().guard_pages(64).validate().is_err());
        assert!(RuntimeConfig::new()
            .park_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
