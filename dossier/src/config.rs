use serde::Deserialize;
use std::env;

use crate::manager::DEFAULT_CONNECTION_SERVICE;

/// Registry-wide settings applied by [`Manager::from_config`](crate::Manager::from_config).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Container service every entity type resolves its connection from, unless overridden.
    pub connection_service: String,
    /// Prepended to every derived or configured collection name.
    pub source_prefix: String,
    /// `false` suppresses all non-mandatory lifecycle events.
    pub events: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `DOSSIER_CONNECTION_SERVICE`, `DOSSIER_SOURCE_PREFIX` and `DOSSIER_EVENTS`,
    /// keeping defaults for unset variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(service) = lookup("DOSSIER_CONNECTION_SERVICE") {
            config.connection_service = service;
        }

        if let Some(prefix) = lookup("DOSSIER_SOURCE_PREFIX") {
            config.source_prefix = prefix;
        }

        if let Some(events) = lookup("DOSSIER_EVENTS") {
            config.events = !matches!(
                events.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }

        config
    }

    pub fn with_connection_service(mut self, service: impl Into<String>) -> Self {
        self.connection_service = service.into();
        self
    }

    pub fn with_source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = prefix.into();
        self
    }

    pub fn with_events(mut self, events: bool) -> Self {
        self.events = events;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_service: DEFAULT_CONNECTION_SERVICE.to_owned(),
            source_prefix: String::new(),
            events: true,
        }
    }
}
