use crate::analyze::{BackendAnalyzer, LineFilter};
use crate::record::{LogRecord, QuerySample};
use std::collections::HashMap;

/// Records of one backend process, in the order they were finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendGroup {
    pub backend_pid: i32,
    pub records: Vec<LogRecord>,
}

/// Drop records the filter marks as noise. Returns the kept records and the
/// number suppressed.
pub fn suppress(records: Vec<LogRecord>, filter: &dyn LineFilter) -> (Vec<LogRecord>, usize) {
    let before = records.len();
    let kept: Vec<LogRecord> = records
        .into_iter()
        .filter(|r| !filter.should_ignore(&r.content))
        .collect();
    let suppressed = before - kept.len();
    (kept, suppressed)
}

/// Partition by backend pid. Groups come out in order of first appearance and
/// keep their records' relative order.
pub fn group_by_backend(records: Vec<LogRecord>) -> Vec<BackendGroup> {
    let mut groups: Vec<BackendGroup> = Vec::new();
    let mut index: HashMap<i32, usize> = HashMap::new();

    for record in records {
        let slot = *index.entry(record.backend_pid).or_insert_with(|| {
            groups.push(BackendGroup {
                backend_pid: record.backend_pid,
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record);
    }

    groups
}

/// Run the analyzer over every group and concatenate the results in group
/// order.
pub fn analyze_groups(
    groups: Vec<BackendGroup>,
    analyzer: &dyn BackendAnalyzer,
) -> (Vec<LogRecord>, Vec<QuerySample>) {
    let mut records = Vec::new();
    let mut samples = Vec::new();

    for group in groups {
        let (processed, found) = analyzer.analyze(group.backend_pid, group.records);
        records.extend(processed);
        samples.extend(found);
    }

    (records, samples)
}
