use crate::record::LogRecord;

/// Merge every run of continuation records onto the main record before it.
///
/// Content is concatenated as-is. A run with no preceding main record cannot
/// be attributed and is dropped.
pub fn stitch(records: Vec<LogRecord>) -> Vec<LogRecord> {
    let mut analyzable: Vec<LogRecord> = Vec::with_capacity(records.len());

    for record in records {
        if record.is_main() {
            analyzable.push(record);
            continue;
        }
        if let Some(owner) = analyzable.last_mut() {
            owner.content.push_str(&record.content);
        }
    }

    analyzable
}
