//! Search engine configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Which search engine implementation to talk to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    /// A Meilisearch server at `host`
    Meilisearch,
    /// Process-local engine, contents are lost on exit
    Memory,
}

impl std::fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchBackend::Meilisearch => write!(f, "meilisearch"),
            SearchBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for SearchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meilisearch" => Ok(SearchBackend::Meilisearch),
            "memory" => Ok(SearchBackend::Memory),
            other => Err(format!("unknown search backend '{}'", other)),
        }
    }
}

/// Settings for the document search engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Engine implementation
    pub backend: SearchBackend,

    /// Base URL of the Meilisearch server
    pub host: String,

    /// API key sent as a bearer token
    pub api_key: Option<String>,

    /// Name of the primary index readers query
    pub index: String,

    /// Suffix appended to `index` to name the staging index
    pub staging_suffix: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::Meilisearch,
            host: "http://127.0.0.1:7700".to_string(),
            api_key: None,
            index: "library".to_string(),
            staging_suffix: "-bak".to_string(),
        }
    }
}

impl SearchConfig {
    /// Name of the index served to readers
    pub fn primary_index(&self) -> &str {
        &self.index
    }

    /// Name of the index rebuilt during a reindex run
    pub fn staging_index(&self) -> String {
        format!("{}{}", self.index, self.staging_suffix)
    }
}

impl ConfigSection for SearchConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::index_name(&self.index, "search.index"),
            Validator::index_name(&self.staging_index(), "search.staging_suffix"),
            Validator::not_empty(&self.staging_suffix, "search.staging_suffix"),
        ];
        if self.backend == SearchBackend::Meilisearch {
            results.push(Validator::http_url(&self.host, "search.host"));
        }
        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.backend = other.backend;
        self.host = other.host;
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        self.index = other.index;
        self.staging_suffix = other.staging_suffix;
    }

    fn section_name(&self) -> &'static str {
        "search"
    }
}
