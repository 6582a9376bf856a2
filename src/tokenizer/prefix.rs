use crate::record::{LogLevel, LogRecord};
use crate::tokenizer::timestamp::parse_log_timestamp;
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use thiserror::Error;

pub const PREFIX_SIMPLE: &str = "%m [%p] ";
pub const PREFIX_USER_DB_APP: &str = "%m [%p] %q[user=%u,db=%d,app=%a] ";
pub const PREFIX_LINE_NUMBER: &str = "%t [%p]: [%l-1] user=%u,db=%d ";
pub const PREFIX_AMAZON_RDS: &str = "%t:%r:%u@%d:[%p]:";

/// Prefixes in auto-detection order. More specific formats go first.
pub const SUPPORTED_PREFIXES: [&str; 4] = [
    PREFIX_AMAZON_RDS,
    PREFIX_LINE_NUMBER,
    PREFIX_USER_DB_APP,
    PREFIX_SIMPLE,
];

const TIME: &str =
    r"(?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)? (?:[+\-]\d{2}(?::?\d{2})?|[A-Za-z]+))";
const LEVEL_AND_CONTENT: &str = r"(?P<level>[A-Z0-9]+):\s+(?P<content>.*\n?)$";

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("prefix pattern failed to compile: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("unsupported log_line_prefix {0:?}")]
    UnsupportedPrefix(String),
}

pub fn is_supported_prefix(prefix: &str) -> bool {
    SUPPORTED_PREFIXES.contains(&prefix)
}

fn pattern_for(prefix: &str) -> Option<String> {
    let head = match prefix {
        PREFIX_SIMPLE => format!(r"{TIME} \[(?P<pid>\d+)\] "),
        PREFIX_USER_DB_APP => format!(
            r"{TIME} \[(?P<pid>\d+)\] \[user=(?P<user>\S*),db=(?P<db>\S*),app=(?P<app>\[unknown\]|[^,\]]*)\] "
        ),
        PREFIX_LINE_NUMBER => format!(
            r"{TIME} \[(?P<pid>\d+)\]: \[(?P<line>\d+)-(?P<chunk>\d+)\] user=(?P<user>\S*),db=(?P<db>\S*) "
        ),
        PREFIX_AMAZON_RDS => format!(
            r"{TIME}:(?P<host>[^:]*(?:\(\d+\))?):(?P<user>\S*)@(?P<db>\S*):\[(?P<pid>\d+)\]:"
        ),
        _ => return None,
    };
    Some(format!("(?s)^{head}{LEVEL_AND_CONTENT}"))
}

#[derive(Debug)]
struct PrefixPattern {
    prefix: &'static str,
    regex: Regex,
}

/// Splits raw log lines into [`LogRecord`]s according to `log_line_prefix`.
#[derive(Debug)]
pub struct PrefixTokenizer {
    patterns: Vec<PrefixPattern>,
}

impl PrefixTokenizer {
    /// Build a tokenizer for one known prefix, or for every supported prefix
    /// (first match wins) when `known_prefix` is `None`.
    pub fn new(known_prefix: Option<&str>) -> Result<Self, TokenizerError> {
        let prefixes: Vec<&'static str> = match known_prefix {
            Some(prefix) => {
                let found = SUPPORTED_PREFIXES
                    .iter()
                    .copied()
                    .find(|p| *p == prefix)
                    .ok_or_else(|| TokenizerError::UnsupportedPrefix(prefix.to_string()))?;
                vec![found]
            }
            None => SUPPORTED_PREFIXES.to_vec(),
        };

        let mut patterns = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            let source = pattern_for(prefix)
                .ok_or_else(|| TokenizerError::UnsupportedPrefix(prefix.to_string()))?;
            patterns.push(PrefixPattern {
                prefix,
                regex: Regex::new(&source)?,
            });
        }

        Ok(Self { patterns })
    }

    /// The prefix that matched `line`, if any.
    pub fn detect(&self, line: &str) -> Option<&'static str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(line))
            .map(|p| p.prefix)
    }

    /// Parse a line that starts a record. Returns `None` when no prefix
    /// matches, the level is not recognised, or the timestamp is invalid.
    pub fn parse_line(&self, line: &str, collected_at: DateTime<Utc>) -> Option<LogRecord> {
        let caps = self
            .patterns
            .iter()
            .find_map(|p| p.regex.captures(line))?;
        record_from_captures(&caps, collected_at)
    }

    /// Like [`parse_line`](Self::parse_line), but lines that do not start a
    /// record become continuation candidates carrying the raw text.
    pub fn tokenize(&self, line: &str, collected_at: DateTime<Utc>) -> LogRecord {
        self.parse_line(line, collected_at)
            .unwrap_or_else(|| LogRecord::continuation(line, collected_at))
    }

    /// Tokenize a block of text line by line. Blank lines are skipped and a
    /// missing final newline is restored.
    pub fn tokenize_text(&self, text: &str, collected_at: DateTime<Utc>) -> Vec<LogRecord> {
        text.split_inclusive('\n')
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                if line.ends_with('\n') {
                    self.tokenize(line, collected_at)
                } else {
                    self.tokenize(&format!("{line}\n"), collected_at)
                }
            })
            .collect()
    }
}

fn record_from_captures(caps: &Captures<'_>, collected_at: DateTime<Utc>) -> Option<LogRecord> {
    let level = LogLevel::from_label(caps.name("level")?.as_str())?;
    let content = caps.name("content").map_or("", |m| m.as_str());
    let mut record = LogRecord::new(level, content, collected_at);

    if let Some(ts) = caps.name("ts") {
        record.occurred_at = Some(parse_log_timestamp(ts.as_str()).ok()?);
    }
    if let Some(pid) = caps.name("pid") {
        record.backend_pid = pid.as_str().parse().ok()?;
    }
    if let Some(line) = caps.name("line") {
        record.log_line_number = line.as_str().parse().ok()?;
    }
    if let Some(chunk) = caps.name("chunk") {
        record.log_line_number_chunk = chunk.as_str().parse().ok()?;
    }
    record.username = session_field(caps, "user");
    record.database = session_field(caps, "db");
    record.application = session_field(caps, "app");

    Some(record)
}

fn session_field(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str())
        .filter(|v| !v.is_empty() && *v != "[unknown]")
        .map(str::to_string)
}
