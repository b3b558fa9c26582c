//! Runtime configuration
//!
//! Every field has a default, so an empty TOML document yields
//! [`RuntimeOptions::default`].
//!
//! ```toml
//! initial_selector_capacity = 1024
//! type_mismatch = "ignore"
//! category_conflicts = "first-applied"
//! send_initialize = true
//! initializer_selector = "initialize"
//! ```

use crate::selector::MAX_SELECTOR_UID;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading runtime options
#[derive(Debug, Error)]
pub enum OptionsError {
    /// Failed to parse TOML
    #[error("Failed to parse runtime options: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid runtime options: {0}")]
    ValidationError(String),
}

/// What to do when a selector is re-declared with a different type encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeMismatchPolicy {
    /// Log a warning and keep the first encoding
    #[default]
    Warn,
    /// Keep the first encoding silently
    Ignore,
}

/// Which category wins when two categories on one class define the same selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryConflictPolicy {
    /// The most recently applied category wins
    #[default]
    LastApplied,
    /// The first applied category keeps the selector
    FirstApplied,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeOptions {
    /// Initial bucket count of the selector table
    pub initial_selector_capacity: usize,

    /// Handling of conflicting selector type encodings
    pub type_mismatch: TypeMismatchPolicy,

    /// Ordering of conflicting category methods
    pub category_conflicts: CategoryConflictPolicy,

    /// Send the initializer selector to classes once they link
    pub send_initialize: bool,

    /// Selector sent to newly linked classes (default: "initialize")
    pub initializer_selector: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            initial_selector_capacity: 64,
            type_mismatch: TypeMismatchPolicy::Warn,
            category_conflicts: CategoryConflictPolicy::LastApplied,
            send_initialize: true,
            initializer_selector: "initialize".to_string(),
        }
    }
}

impl RuntimeOptions {
    /// Parse and validate options from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        let options: RuntimeOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate option values
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.initializer_selector.is_empty() {
            return Err(OptionsError::ValidationError(
                "initializer_selector cannot be empty".to_string(),
            ));
        }
        if self.initial_selector_capacity > MAX_SELECTOR_UID as usize + 1 {
            return Err(OptionsError::ValidationError(format!(
                "initial_selector_capacity {} exceeds the selector space ({})",
                self.initial_selector_capacity,
                MAX_SELECTOR_UID as usize + 1
            )));
        }
        Ok(())
    }
}
