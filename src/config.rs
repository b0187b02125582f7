use std::collections::HashMap;
use std::env as stdenv;

/// Environment variable holding the `tracing` filter directive.
pub const LOG_VAR: &str = "BSH_LOG";
/// Environment variable switching the reader's line history off.
pub const HISTORY_VAR: &str = "BSH_HISTORY";

const DEFAULT_LOG_FILTER: &str = "warn";

/// Session settings captured from the process environment.
///
/// - `log_filter`: directive for the diagnostic log on standard error.
/// - `history`: whether the line reader keeps an in-memory history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_filter: String,
    pub history: bool,
}

impl Config {
    /// Capture the current process environment into a new `Config`.
    pub fn from_env() -> Self {
        Self::from_vars(stdenv::vars())
    }

    /// Build a `Config` from arbitrary key/value pairs.
    ///
    /// Unknown keys are ignored; missing keys fall back to the defaults.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let log_filter = vars
            .get(LOG_VAR)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
            .to_string();
        let history = vars.get(HISTORY_VAR).is_none_or(|v| !is_off(v));

        Self {
            log_filter,
            history,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(std::iter::empty::<(String, String)>())
    }
}

fn is_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "off" | "false" | "no"
    )
}
