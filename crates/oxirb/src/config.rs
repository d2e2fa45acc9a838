//! Runtime configuration.
//!
//! Defaults suit embedding; [`RuntimeConfig::from_env`] layers the
//! `OXIRB_*` environment variables on top of them.

use oxirb_log::Level;
use std::fmt;
use std::str::FromStr;

/// Environment variable selecting the [`MissingRequire`] policy.
pub const MISSING_REQUIRE_VAR: &str = "OXIRB_MISSING_REQUIRE";

/// Environment variable overriding [`RuntimeConfig::max_call_depth`].
pub const MAX_DEPTH_VAR: &str = "OXIRB_MAX_DEPTH";

/// Default limit on nested method and block activations.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

/// What `require` does when no initializer is registered for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingRequire {
    /// Raise a `LoadError`.
    #[default]
    Error,
    /// Log a warning and continue.
    Warn,
    /// Continue silently.
    Ignore,
}

impl fmt::Display for MissingRequire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingRequire::Error => "error",
            MissingRequire::Warn => "warn",
            MissingRequire::Ignore => "ignore",
        })
    }
}

impl FromStr for MissingRequire {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(MissingRequire::Error),
            "warn" | "warning" => Ok(MissingRequire::Warn),
            "ignore" => Ok(MissingRequire::Ignore),
            other => Err(format!("unknown missing-require policy '{other}'")),
        }
    }
}

/// Settings applied when a [`Runtime`](crate::Runtime) boots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Policy for `require` of unregistered paths.
    pub missing_require: MissingRequire,
    /// Maximum nesting of method and block activations.
    pub max_call_depth: usize,
    /// Directory relative requires are resolved against.
    pub current_dir: String,
    /// Log level installed at boot, if any.
    pub log_level: Option<Level>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            missing_require: MissingRequire::Error,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            current_dir: ".".to_string(),
            log_level: None,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `OXIRB_MISSING_REQUIRE`, `OXIRB_MAX_DEPTH` and
    /// `OXIRB_LOG`. Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(MISSING_REQUIRE_VAR) {
            match raw.parse() {
                Ok(policy) => config.missing_require = policy,
                Err(e) => oxirb_log::warn!("{MISSING_REQUIRE_VAR}: {e}"),
            }
        }

        if let Ok(raw) = std::env::var(MAX_DEPTH_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_call_depth = depth,
                _ => oxirb_log::warn!("{MAX_DEPTH_VAR}: invalid depth '{raw}'"),
            }
        }

        if let Ok(raw) = std::env::var(oxirb_log::ENV_VAR) {
            match raw.parse() {
                Ok(level) => config.log_level = Some(level),
                Err(e) => oxirb_log::warn!("{}: {e}", oxirb_log::ENV_VAR),
            }
        }

        config
    }

    #[must_use]
    pub fn with_missing_require(mut self, policy: MissingRequire) -> Self {
        self.missing_require = policy;
        self
    }

    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<String>) -> Self {
        self.current_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }
}
