use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity marker of a single log line.
///
/// `Unknown` means the line carried no recognizable record-start marker and can
/// only be interpreted as a continuation of an earlier record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Unknown,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Log,
    Fatal,
    Panic,
    Detail,
    Hint,
    Context,
    Statement,
    Query,
}

impl LogLevel {
    /// Parse the level label as it appears after the log line prefix.
    ///
    /// Returns None for anything that is not a known label, so callers can treat
    /// the line as a continuation.
    pub fn from_label(label: &str) -> Option<Self> {
        let level = match label {
            "DEBUG" | "DEBUG1" | "DEBUG2" | "DEBUG3" | "DEBUG4" | "DEBUG5" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "NOTICE" => LogLevel::Notice,
            "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "LOG" => LogLevel::Log,
            "FATAL" => LogLevel::Fatal,
            "PANIC" => LogLevel::Panic,
            "DETAIL" => LogLevel::Detail,
            "HINT" => LogLevel::Hint,
            "CONTEXT" => LogLevel::Context,
            "STATEMENT" => LogLevel::Statement,
            "QUERY" => LogLevel::Query,
            _ => return None,
        };
        Some(level)
    }

    /// True for every level except `Unknown`.
    pub fn is_known(self) -> bool {
        self != LogLevel::Unknown
    }

    /// Levels that open a new logical message.
    pub fn is_main_class(self) -> bool {
        matches!(
            self,
            LogLevel::Debug
                | LogLevel::Info
                | LogLevel::Notice
                | LogLevel::Warning
                | LogLevel::Error
                | LogLevel::Log
                | LogLevel::Fatal
                | LogLevel::Panic
        )
    }

    /// Levels that are sub-records of the preceding main-class message.
    pub fn is_continuation_class(self) -> bool {
        matches!(
            self,
            LogLevel::Detail
                | LogLevel::Hint
                | LogLevel::Context
                | LogLevel::Statement
                | LogLevel::Query
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Unknown => "UNKNOWN",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Notice => "NOTICE",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Log => "LOG",
            LogLevel::Fatal => "FATAL",
            LogLevel::Panic => "PANIC",
            LogLevel::Detail => "DETAIL",
            LogLevel::Hint => "HINT",
            LogLevel::Context => "CONTEXT",
            LogLevel::Statement => "STATEMENT",
            LogLevel::Query => "QUERY",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
