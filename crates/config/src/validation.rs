//! Validation system for configuration values
//!
//! Each config section implements [`ConfigSection`], which includes validation.

pub use crate::error::ValidationError;
use std::path::Path;

/// Trait for configuration sections that can validate themselves
pub trait ConfigSection: Default {
    /// Validates the configuration section
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Merges another config section into this one, preferring `other`
    fn merge(&mut self, other: Self);

    /// Returns the section name for error reporting
    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a numeric value is within a range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is an absolute http(s) URL
    pub fn http_url(value: &str, field: &str) -> Result<(), ValidationError> {
        let rest = value
            .strip_prefix("http://")
            .or_else(|| value.strip_prefix("https://"));
        match rest {
            Some(host) if !host.trim_matches('/').is_empty() => Ok(()),
            _ => Err(ValidationError::with_value(
                field,
                "must be an http:// or https:// URL",
                value,
            )),
        }
    }

    /// Validates that a listen address has the form `host:port`
    pub fn socket_address(value: &str, field: &str) -> Result<(), ValidationError> {
        let valid = value
            .rsplit_once(':')
            .map(|(_, port)| port.parse::<u16>().is_ok())
            .unwrap_or(false);
        if valid {
            Ok(())
        } else {
            Err(ValidationError::with_value(
                field,
                "must have the form host:port",
                value,
            ))
        }
    }

    /// Validates that an index name only uses characters the engine accepts
    pub fn index_name(value: &str, field: &str) -> Result<(), ValidationError> {
        Self::not_empty(value, field)?;
        let valid = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(ValidationError::with_value(
                field,
                "may only contain ASCII letters, digits, '-' and '_'",
                value,
            ))
        }
    }

    /// Validates that a path has a file name component
    pub fn file_path(path: &Path, field: &str) -> Result<(), ValidationError> {
        if path.file_name().is_none() {
            Err(ValidationError::with_value(
                field,
                "must point to a file",
                path.display(),
            ))
        } else {
            Ok(())
        }
    }

    /// Collects multiple validation results into a single result
    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
