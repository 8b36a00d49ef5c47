use serde::{Deserialize, Serialize};

/// The seven error categories every component classifies its failures into.
///
/// Diagnostics rows and process exit codes both derive from this, rather than
/// from ad-hoc string matching on error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ConfigError,
    TransientIo,
    PermanentIo,
    ParseError,
    DimensionMismatch,
    UniqueViolation,
    LeaseExpired,
}

impl ErrorClass {
    /// Process exit code this class maps to when it escapes all the way to `main`.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorClass::ConfigError => 2,
            _ => 1,
        }
    }

    /// Whether a per-item error of this class should stop the enclosing batch loop.
    /// Only `ConfigError` does; everything else is recovered from locally.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorClass::ConfigError)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorClass::ConfigError => "config_error",
            ErrorClass::TransientIo => "transient_io",
            ErrorClass::PermanentIo => "permanent_io",
            ErrorClass::ParseError => "parse_error",
            ErrorClass::DimensionMismatch => "dimension_mismatch",
            ErrorClass::UniqueViolation => "unique_violation",
            ErrorClass::LeaseExpired => "lease_expired",
        };
        write!(f, "{s}")
    }
}

/// Implemented by each crate's own error enum so the taxonomy is a property of
/// the type, not something callers re-derive from a message string.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_exits_with_2_and_is_fatal() {
        assert_eq!(ErrorClass::ConfigError.exit_code(), 2);
        assert!(ErrorClass::ConfigError.is_fatal());
    }

    #[test]
    fn transient_io_exits_with_1_and_is_not_fatal() {
        assert_eq!(ErrorClass::TransientIo.exit_code(), 1);
        assert!(!ErrorClass::TransientIo.is_fatal());
    }

    #[test]
    fn display_matches_diagnostics_kind_strings() {
        assert_eq!(ErrorClass::DimensionMismatch.to_string(), "dimension_mismatch");
        assert_eq!(ErrorClass::UniqueViolation.to_string(), "unique_violation");
    }
}
