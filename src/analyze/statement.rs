use crate::analyze::BackendAnalyzer;
use crate::record::{LogClassification, LogLevel, LogRecord, QuerySample};
use regex::Regex;

/// Marker a test run writes into the database log to confirm the stream works.
pub const IDENTIFY_MARKER: &str = "logstitch-identify:";

/// Default analyzer: statement durations, statement logging, errors with their
/// triggering statement, and the identify marker.
#[derive(Debug, Clone)]
pub struct StatementAnalyzer {
    duration: Regex,
    statement: Regex,
    identify: Regex,
}

impl StatementAnalyzer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            duration: Regex::new(
                r"(?s)duration: (?P<ms>\d+(?:\.\d+)?) ms\s+(?:statement|execute [^:]*): (?P<query>.*)",
            )?,
            statement: Regex::new(r"(?s)^statement: (?P<query>.*)")?,
            identify: Regex::new(&format!(r"{} (?P<server>\S+)", regex::escape(IDENTIFY_MARKER)))?,
        })
    }

    fn classify(&self, record: &mut LogRecord) -> Option<QuerySample> {
        if let Some(caps) = self.identify.captures(&record.content) {
            record.classification = LogClassification::CollectorIdentify;
            record
                .details
                .insert("server".to_string(), caps["server"].to_string().into());
            return None;
        }

        if record.level != LogLevel::Log {
            return None;
        }

        if let Some(caps) = self.duration.captures(&record.content) {
            // Unparsable numbers leave the record unclassified
            let runtime_ms: f64 = caps["ms"].parse().ok()?;
            let query = caps["query"].trim_end().to_string();

            record.classification = LogClassification::StatementDuration;
            record.query = Some(query.clone());
            record
                .details
                .insert("duration_ms".to_string(), runtime_ms.into());

            return Some(QuerySample {
                occurred_at: record.occurred_at,
                backend_pid: record.backend_pid,
                username: record.username.clone(),
                database: record.database.clone(),
                query,
                runtime_ms,
            });
        }

        if let Some(caps) = self.statement.captures(&record.content) {
            record.classification = LogClassification::StatementLog;
            record.query = Some(caps["query"].trim_end().to_string());
        }

        None
    }
}

impl BackendAnalyzer for StatementAnalyzer {
    fn analyze(
        &self,
        _backend_pid: i32,
        mut records: Vec<LogRecord>,
    ) -> (Vec<LogRecord>, Vec<QuerySample>) {
        let mut samples = Vec::new();

        for idx in 0..records.len() {
            if let Some(sample) = self.classify(&mut records[idx]) {
                samples.push(sample);
            }

            // An ERROR's failing statement arrives as the next STATEMENT record
            if records[idx].level == LogLevel::Error {
                let statement = records
                    .get(idx + 1)
                    .filter(|next| next.level == LogLevel::Statement)
                    .map(|next| next.content.trim_end().to_string());
                if let Some(query) = statement {
                    records[idx].classification = LogClassification::StatementError;
                    records[idx].query = Some(query);
                }
            }
        }

        (records, samples)
    }
}
