//! Relay configuration
//!
//! Everything is sourced from the environment. The two backend settings are
//! required; the rest fall back to the defaults below.

use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BOT_NAME: &str = "Maria";
pub const DEFAULT_BOT_ROLE: &str = "Specialist Agent";
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEFAULT_HANDOFF_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_NO_TRANSITION_CATEGORIES: [&str; 2] = ["General", "AccountProfileOther"];

/// Configuration problems that keep sessions from starting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Categories that skip the hand-off announcement, plus how long an
/// announcement stays on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffPolicy {
    pub no_transition: BTreeSet<String>,
    pub delay: Duration,
}

impl HandoffPolicy {
    pub fn new<I, S>(no_transition: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            no_transition: no_transition.into_iter().map(Into::into).collect(),
            delay,
        }
    }

    /// Exact string match; anything outside the set, empty included, hands off.
    pub fn is_handoff(&self, category: &str) -> bool {
        !self.no_transition.contains(category)
    }
}

impl Default for HandoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_NO_TRANSITION_CATEGORIES, DEFAULT_HANDOFF_DELAY)
    }
}

/// Display persona shown in the welcome message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub bot_name: String,
    pub bot_role: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            bot_name: DEFAULT_BOT_NAME.to_string(),
            bot_role: DEFAULT_BOT_ROLE.to_string(),
        }
    }
}

/// Fully validated relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_secret: String,
    pub persona: Persona,
    pub backend_timeout: Duration,
    pub handoff: HandoffPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let api_url = required("BACKEND_API_URL")?;
        let api_secret = required("BACKEND_API_SECRET")?;

        let persona = Persona {
            bot_name: lookup("BOT_NAME").unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),
            bot_role: lookup("BOT_ROLE").unwrap_or_else(|| DEFAULT_BOT_ROLE.to_string()),
        };

        let backend_timeout = match lookup("BACKEND_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BACKEND_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_BACKEND_TIMEOUT,
        };

        let delay = match lookup("HANDOFF_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::Invalid {
                    name: "HANDOFF_DELAY_MS",
                    value: raw.clone(),
                })?,
            None => DEFAULT_HANDOFF_DELAY,
        };

        let handoff = match lookup("NO_TRANSITION_CATEGORIES") {
            Some(raw) => HandoffPolicy::new(
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
                delay,
            ),
            None => HandoffPolicy::new(DEFAULT_NO_TRANSITION_CATEGORIES, delay),
        };

        Ok(Self {
            api_url,
            api_secret,
            persona,
            backend_timeout,
            handoff,
        })
    }
}
