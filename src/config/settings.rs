//! Application settings configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// The name of the default profile to use.
    pub default_profile: Option<String>,
    /// Quiet period after the last keystroke before a user search fires.
    pub search_debounce_ms: u64,
    /// Queries shorter than this never reach the server.
    pub min_query_length: usize,
    /// Number of users requested per search.
    pub page_size: u32,
    /// Event loop tick rate.
    pub tick_rate_ms: u64,
}

impl Settings {
    /// The search debounce as a `Duration`.
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_profile: None,
            search_debounce_ms: 300,
            min_query_length: 2,
            page_size: 20,
            tick_rate_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: Settings = toml::from_str("search_debounce_ms = 50").unwrap();
        assert_eq!(settings.search_debounce(), Duration::from_millis(50));
        assert_eq!(settings.min_query_length, 2);
        assert_eq!(settings.page_size, 20);
    }
}
