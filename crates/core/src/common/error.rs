//! Error taxonomy for the simulation kernel.
//!
//! Every fallible surface in this crate — the YAML loader, the configuration
//! accessors, the graph builder, the trace reader — reports through
//! [`SimError`]. The variants mirror the error kinds named in the simulator's
//! design: config parsing, config semantics, trace I/O, and component
//! build failures. Buffer overflow is deliberately *not* a variant here: it
//! is a non-fatal, per-occurrence condition and is reported through
//! `tracing::warn!` plus a counter, never propagated as an `Err`.

use std::fmt;

/// A source location within a configuration file, used to make diagnostics
/// point at the exact place a mistake was made.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Location {
    /// Path of the file the offending node came from.
    pub file: String,
    /// One-based line number.
    pub line: u32,
    /// One-based column number.
    pub column: u32,
}

impl Location {
    /// Builds a location from its three components.
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// A placeholder location for values that were never parsed from a file
    /// (e.g. synthesized during builder materialization).
    #[must_use]
    pub fn synthetic() -> Self {
        Self {
            file: "<synthesized>".to_string(),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The unified error type returned by every public, fallible entry point in
/// this crate.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The YAML text could not be parsed at all: bad indentation, unterminated
    /// flow collections, an unterminated alias, etc.
    #[error("{location}: {message}")]
    ConfigParse {
        /// Where in the offending file the scanner gave up.
        location: Location,
        /// Scanner-reported reason.
        message: String,
    },

    /// The YAML parsed fine but a parameter was missing, had the wrong shape,
    /// named a dangling reference, or redefined something already defined.
    #[error("{location}: {parameter}: {reason}")]
    ConfigSemantic {
        /// Location of the mapping the parameter was read from.
        location: Location,
        /// The parameter name (or definition/alias name for builder errors).
        parameter: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// The trace reader hit an I/O failure, a corrupt record, or a truncated
    /// file.
    #[error("trace: {reader}: {reason}")]
    Trace {
        /// Name of the trace-reader implementation that failed.
        reader: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A component's `finish_setup` reported failure during the builder's
    /// finalize pass.
    #[error("build: {component}: {reason}")]
    Build {
        /// Alias or synthesized name of the offending instance.
        component: String,
        /// Reason the component gave for refusing to finish setup.
        reason: String,
    },
}

impl SimError {
    /// Convenience constructor for [`SimError::ConfigSemantic`].
    pub fn semantic(location: Location, parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigSemantic {
            location,
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`SimError::Trace`].
    pub fn trace(reader: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Trace {
            reader: reader.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`SimError::Build`].
    pub fn build(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Build {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_semantic_formats_as_file_line_col_parameter_reason() {
        let err = SimError::semantic(Location::new("cfg.yaml", 12, 5), "policy", "unknown replacement policy \"MRU\"");
        assert_eq!(err.to_string(), "cfg.yaml:12:5: policy: unknown replacement policy \"MRU\"");
    }

    #[test]
    fn trace_error_names_the_reader() {
        let err = SimError::trace("sinuca", "truncated static file");
        assert_eq!(err.to_string(), "trace: sinuca: truncated static file");
    }

    #[test]
    fn build_error_names_the_component() {
        let err = SimError::build("core1", "finish_setup failed");
        assert_eq!(err.to_string(), "build: core1: finish_setup failed");
    }

    #[test]
    fn synthetic_location_is_distinguishable_from_a_real_one() {
        assert_ne!(Location::synthetic(), Location::new("a.yaml", 1, 1));
    }
}
