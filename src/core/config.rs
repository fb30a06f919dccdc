//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings of a [`Runtime`](crate::Runtime).
//!
//! Config is read in three places:
//! 1. **ObserverManager**: which elements to observe, which styles mean
//!    "done loading" and "busy", which fragments are virtual pages.
//! 2. **Session**: login/town probes, the settings page, credential fetch.
//! 3. **Runtime**: module types, storage prefix, language table, bus size.
//!
//! Patterns are stored as strings and compiled by the helper accessors, so a
//! bad pattern surfaces as [`ConfigError::InvalidPattern`] when the runtime
//! is built.

use std::time::Duration;

use regex::Regex;

use crate::error::ConfigError;
use crate::page::{Selector, StyleMatch};
use crate::policies::RetryPolicy;

/// Global configuration for the page runtime.
///
/// ## Field groups
/// - **Waits**: default poll policy plus the fragment, login and town probes
/// - **Targets**: selectors for the login panel, loading indicator, body,
///   counter and the counter gate
/// - **Conditions**: style values meaning "loading done" and "busy"
/// - **Navigation**: virtual-page and settings-page fragment patterns
/// - **Modules**: ordered type names and the external-tool type
/// - **Collaborators**: language table, storage prefix, credential endpoint
///
/// All fields are public; prefer the helper accessors over reading patterns
/// and sentinels directly.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default policy for element waits (`250ms x 10`).
    pub poll: RetryPolicy,

    /// Wait for a non-empty location fragment before the first
    /// `ViewReloaded` (`200ms x 20`).
    pub fragment_wait: RetryPolicy,

    /// Login probe budget (`250ms x 20`).
    pub login_probe: RetryPolicy,

    /// "In town" probe budget (`250ms x 5`).
    pub town_probe: RetryPolicy,

    /// Element whose presence means the user is logged in.
    pub login_indicator: Selector,

    /// Element toggled while the main content loads.
    pub loading_indicator: Selector,

    /// Element whose attributes announce a busy page.
    pub body: Selector,

    /// Container of the counter whose mutations emit `CounterChanged`.
    pub counter: Selector,

    /// Element that must exist for the counter to be watched.
    ///
    /// `None` watches the counter unconditionally.
    pub counter_gate: Option<Selector>,

    /// Style of the loading indicator once loading is done.
    pub hidden_style: StyleMatch,

    /// Style of the body while the page is busy.
    pub busy_style: StyleMatch,

    /// Fragments that swap content without toggling the loading indicator.
    pub virtual_pages: Vec<String>,

    /// Fragment of the settings page.
    pub settings_page: String,

    /// Module types, in load order.
    pub module_types: Vec<String>,

    /// Type whose modules carry a fetched credential.
    pub external_tool_type: String,

    /// Hostname to language code.
    pub languages: Vec<(String, String)>,

    /// Prefix prepended to every storage key.
    pub storage_prefix: String,

    /// Capacity of the bus broadcast tap (min 1; clamped).
    pub bus_capacity: usize,

    /// Credential request path; `{id}` is replaced by the directory id.
    pub credential_path: String,

    /// Pattern whose first capture group is the credential.
    pub credential_pattern: String,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Language code for a hostname, if the host is known.
    ///
    /// # Example
    /// ```
    /// use pagevisor::Config;
    ///
    /// let cfg = Config::default();
    /// assert_eq!(cfg.language_for("www.hordes.fr"), Some("fr"));
    /// assert_eq!(cfg.language_for("example.org"), None);
    /// ```
    pub fn language_for(&self, hostname: &str) -> Option<&str> {
        self.languages
            .iter()
            .find(|(host, _)| host.eq_ignore_ascii_case(hostname))
            .map(|(_, lang)| lang.as_str())
    }

    /// Credential request path for a directory id.
    pub fn credential_path_for(&self, directory_id: &str) -> String {
        self.credential_path.replace("{id}", directory_id)
    }

    /// Compiled virtual-page patterns.
    pub fn virtual_page_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        self.virtual_pages.iter().map(|p| compile(p)).collect()
    }

    /// Compiled settings-page pattern.
    pub fn settings_page_pattern(&self) -> Result<Regex, ConfigError> {
        compile(&self.settings_page)
    }

    /// Compiled credential pattern.
    pub fn credential_regex(&self) -> Result<Regex, ConfigError> {
        compile(&self.credential_pattern)
    }

    /// Checks every pattern once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.virtual_page_patterns()?;
        self.settings_page_pattern()?;
        self.credential_regex()?;
        Ok(())
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl Default for Config {
    /// Default configuration, tuned for the Die2Nite family of sites:
    ///
    /// - waits: `250ms x 10`, fragment `200ms x 20`, login `250ms x 20`,
    ///   town `250ms x 5`
    /// - targets: `#tid_sidePanel_user`, `#loading_section`, `body`,
    ///   `#movesCounter`, gated by `#clock`
    /// - virtual pages: `^#news`, `^#help`
    /// - module types: `CONTAINER`, `INTERFACE_ENHANCEMENT`, `EXTERNAL_TOOL`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        let ms = Duration::from_millis;
        Self {
            poll: RetryPolicy::default(),
            fragment_wait: RetryPolicy::new(ms(200), 20),
            login_probe: RetryPolicy::new(ms(250), 20),
            town_probe: RetryPolicy::new(ms(250), 5),
            login_indicator: Selector::id("tid_sidePanel_user"),
            loading_indicator: Selector::id("loading_section"),
            body: Selector::tag("body"),
            counter: Selector::id("movesCounter"),
            counter_gate: Some(Selector::id("clock")),
            hidden_style: StyleMatch::new("display", "none"),
            busy_style: StyleMatch::new("cursor", "progress"),
            virtual_pages: vec![String::from("^#news"), String::from("^#help")],
            settings_page: String::from(
                r"^#(?:city/enter|ghost/city|ghost)\?go=ghost/options;sk=[a-z0-9]{5}$",
            ),
            module_types: ["CONTAINER", "INTERFACE_ENHANCEMENT", "EXTERNAL_TOOL"]
                .into_iter()
                .map(String::from)
                .collect(),
            external_tool_type: String::from("EXTERNAL_TOOL"),
            languages: [
                ("www.die2nite.com", "en"),
                ("www.hordes.fr", "fr"),
                ("www.zombinoia.com", "es"),
                ("www.dieverdammten.de", "de"),
            ]
            .into_iter()
            .map(|(host, lang)| (host.to_string(), lang.to_string()))
            .collect(),
            storage_prefix: String::from("extensions.pagevisor."),
            bus_capacity: 1024,
            credential_path: String::from("/disclaimer?id={id}"),
            credential_pattern: String::from(
                r#"<input type="hidden" name="key" value="([a-f0-9]{38})""#,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_compile() {
        Config::default().validate().expect("defaults are valid");
    }

    #[test]
    fn settings_page_matches_every_entry_point() {
        let re = Config::default().settings_page_pattern().unwrap();
        assert!(re.is_match("#ghost?go=ghost/options;sk=ab12c"));
        assert!(re.is_match("#city/enter?go=ghost/options;sk=ab12c"));
        assert!(re.is_match("#ghost/city?go=ghost/options;sk=ab12c"));
        assert!(!re.is_match("#ghost?go=ghost/user;sk=ab12c"));
        assert!(!re.is_match("#ghost?go=ghost/options;sk=AB12C"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let cfg = Config {
            virtual_pages: vec![String::from("^#(news")],
            ..Config::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_pattern");
    }

    #[test]
    fn credential_path_substitutes_directory() {
        let cfg = Config::default();
        assert_eq!(cfg.credential_path_for("12"), "/disclaimer?id=12");
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
