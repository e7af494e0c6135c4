use std::env;
use std::path::PathBuf;

pub const LOG_ENV: &str = "GROUPTOOLD_LOG";
pub const WORKSPACE_ENV: &str = "GROUPTOOLD_WORKSPACE";

/// Process-level settings read once at startup. Plugin settings such as the
/// default group size live in the workspace `settings` table instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_filter: String,
    pub workspace: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            workspace: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            log_filter: lookup(LOG_ENV)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.log_filter),
            workspace: lookup(WORKSPACE_ENV)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}
