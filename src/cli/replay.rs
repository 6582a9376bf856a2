use crate::analyze::{NoFilter, StatementAnalyzer};
use crate::assembly::{Assembly, StreamAssembler, DEFAULT_READY_THRESHOLD};
use crate::record::MemoryAllocator;
use crate::tokenizer::PrefixTokenizer;
use chrono::Utc;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// Assemble a whole log text in one pass, as if every line had arrived well
/// past the readiness threshold.
pub fn replay_text(
    text: &str,
    tokenizer: &PrefixTokenizer,
) -> Result<Assembly, Box<dyn std::error::Error>> {
    let collected_at = Utc::now();
    let records = tokenizer.tokenize_text(text, collected_at);

    let assembler = StreamAssembler::new(
        Arc::new(MemoryAllocator),
        Arc::new(NoFilter),
        Arc::new(StatementAnalyzer::new()?),
    );
    let now = collected_at
        + chrono::Duration::from_std(DEFAULT_READY_THRESHOLD)?
        + chrono::Duration::seconds(1);

    Ok(assembler.analyze_stream_in_groups(records, now)?)
}

/// Human-readable listing of an assembly: one line per record with its byte
/// range, then the query samples.
pub fn format_assembly(assembly: &Assembly) -> String {
    let mut out = String::new();

    for record in &assembly.log_file.records {
        let first_line = record.content.lines().next().unwrap_or("");
        let _ = writeln!(
            out,
            "{:>8}..{:<8} {:<9} [{}] {:?} {}",
            record.byte_start,
            record.byte_end,
            record.level.as_str(),
            record.backend_pid,
            record.classification,
            first_line
        );
        if let Some(query) = &record.query {
            let _ = writeln!(out, "{:>19} query: {}", "", query.replace('\n', " "));
        }
    }

    if !assembly.state.query_samples.is_empty() {
        let _ = writeln!(out, "\nquery samples:");
        for sample in &assembly.state.query_samples {
            let _ = writeln!(
                out,
                "  [{}] {:.3} ms  {}",
                sample.backend_pid,
                sample.runtime_ms,
                sample.query.replace('\n', " ")
            );
        }
    }

    let _ = writeln!(
        out,
        "\n{} records, {} bytes, {} discarded, {} left deferred",
        assembly.log_file.records.len(),
        assembly.log_file.byte_size,
        assembly.stats.discarded,
        assembly.deferred.len()
    );
    out
}

/// The log_line_prefix of the first line that starts a record.
pub fn detect_prefix(text: &str, tokenizer: &PrefixTokenizer) -> Option<&'static str> {
    text.lines().find_map(|line| tokenizer.detect(line))
}

pub fn replay(path: &Path, prefix: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
    let text = String::from_utf8_lossy(&bytes);
    let tokenizer = PrefixTokenizer::new(prefix)?;

    if prefix.is_none() {
        match detect_prefix(&text, &tokenizer) {
            Some(detected) => println!("detected log_line_prefix: '{}'\n", detected),
            None => println!("no supported log_line_prefix found\n"),
        }
    }

    let assembly = replay_text(&text, &tokenizer)?;
    print!("{}", format_assembly(&assembly));
    Ok(())
}
