//! Metadata source configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where book metadata is read from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The Calibre content server over HTTP
    ContentServer,
    /// A Calibre `metadata.db` read directly
    LibraryDb,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::ContentServer => write!(f, "content_server"),
            SourceKind::LibraryDb => write!(f, "library_db"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content_server" | "content-server" => Ok(SourceKind::ContentServer),
            "library_db" | "library-db" => Ok(SourceKind::LibraryDb),
            other => Err(format!("unknown source kind '{}'", other)),
        }
    }
}

/// Settings for the authoritative metadata source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Which adapter to use
    pub kind: SourceKind,

    /// Base URL of the content server; also serves covers and files
    pub server: String,

    /// Library id on the content server
    pub library: String,

    /// Path of `metadata.db` for the `library_db` kind
    pub library_db_path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::ContentServer,
            server: "http://127.0.0.1:8083".to_string(),
            library: "library".to_string(),
            library_db_path: PathBuf::from("metadata.db"),
        }
    }
}

impl ConfigSection for SourceConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::http_url(&self.server, "source.server"),
            Validator::not_empty(&self.library, "source.library"),
        ];
        if self.kind == SourceKind::LibraryDb {
            results.push(Validator::file_path(
                &self.library_db_path,
                "source.library_db_path",
            ));
        }
        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.kind = other.kind;
        self.server = other.server;
        self.library = other.library;
        self.library_db_path = other.library_db_path;
    }

    fn section_name(&self) -> &'static str {
        "source"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SourceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("library-db".parse::<SourceKind>(), Ok(SourceKind::LibraryDb));
        assert_eq!(SourceKind::ContentServer.to_string(), "content_server");
        assert!("ftp".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_bad_server_url() {
        let config = SourceConfig {
            server: "calibre:8083".to_string(),
            ..SourceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
