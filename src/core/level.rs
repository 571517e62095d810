//! Severity level definitions
//!
//! Runtime code orders levels least-severe-first (`Trace = 0`). Persisted
//! config files use an older, inverted numbering (1 = most severe) kept for
//! continuity with existing deployments; translation happens only at the
//! config load/save boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{Result, TelemetryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    #[default]
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

/// Legacy config codes, most severe first. `0` was `Panic` in the original
/// scheme and is not produced here.
const FATAL_CONFIG: u32 = 1;
const ERROR_CONFIG: u32 = 2;
const WARN_CONFIG: u32 = 3;
const INFO_CONFIG: u32 = 4;
const DEBUG_CONFIG: u32 = 5;

impl Level {
    pub fn to_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// Translate a runtime level to the legacy persisted numbering.
    ///
    /// Trace has no legacy representation and is stored as Debug.
    pub fn to_config_value(self) -> u32 {
        match self {
            Level::Trace | Level::Debug => DEBUG_CONFIG,
            Level::Info => INFO_CONFIG,
            Level::Warn => WARN_CONFIG,
            Level::Error => ERROR_CONFIG,
            Level::Fatal => FATAL_CONFIG,
        }
    }

    /// Translate a legacy persisted code to a runtime level.
    pub fn from_config_value(value: u32) -> Result<Level> {
        match value {
            FATAL_CONFIG => Ok(Level::Fatal),
            ERROR_CONFIG => Ok(Level::Error),
            WARN_CONFIG => Ok(Level::Warn),
            INFO_CONFIG => Ok(Level::Info),
            DEBUG_CONFIG => Ok(Level::Debug),
            _ => Err(TelemetryError::UnknownConfigLevel { value }),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            _ => Err(format!("Invalid level: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_config_value_round_trip() {
        for level in [
            Level::Debug,
            Level::Info,
            Level::Warn,
            Level::Error,
            Level::Fatal,
        ] {
            let code = level.to_config_value();
            assert_eq!(Level::from_config_value(code).unwrap(), level);
        }
    }

    #[test]
    fn test_config_numbering_is_inverted() {
        // Legacy scale: smaller code = more severe
        assert!(Level::Fatal.to_config_value() < Level::Debug.to_config_value());
        assert_eq!(Level::Fatal.to_config_value(), 1);
        assert_eq!(Level::Debug.to_config_value(), 5);
    }

    #[test]
    fn test_trace_maps_to_debug_in_config() {
        assert_eq!(
            Level::Trace.to_config_value(),
            Level::Debug.to_config_value()
        );
    }

    #[test]
    fn test_unknown_config_value() {
        let err = Level::from_config_value(42).unwrap_err();
        assert!(matches!(err, TelemetryError::UnknownConfigLevel { value: 42 }));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("WARNING".parse::<Level>().unwrap(), Level::Warn);
        assert!("bogus".parse::<Level>().is_err());
    }
}
