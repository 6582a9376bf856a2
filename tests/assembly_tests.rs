use chrono::{DateTime, Duration as ChronoDuration, Utc};
use logstitch::analyze::{BackendAnalyzer, IgnorePatterns, NoFilter, StatementAnalyzer};
use logstitch::assembly::{AssemblyError, StreamAssembler};
use logstitch::record::{
    ArtifactAllocator, ArtifactStorage, LogLevel, LogRecord, MemoryAllocator, QuerySample,
    TempFileAllocator,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;

struct PassThrough;

impl BackendAnalyzer for PassThrough {
    fn analyze(&self, _backend_pid: i32, records: Vec<LogRecord>) -> (Vec<LogRecord>, Vec<QuerySample>) {
        (records, Vec::new())
    }
}

struct FullDisk;

impl ArtifactAllocator for FullDisk {
    fn allocate(&self) -> io::Result<ArtifactStorage> {
        Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
    }
}

fn assembler() -> StreamAssembler {
    StreamAssembler::new(Arc::new(MemoryAllocator), Arc::new(NoFilter), Arc::new(PassThrough))
}

fn ago(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    now - ChronoDuration::seconds(secs)
}

fn byte_ranges(records: &[LogRecord]) -> Vec<(u64, u64)> {
    records.iter().map(|r| (r.byte_start, r.byte_end)).collect()
}

#[test]
fn test_single_stale_record_is_finalized() {
    let now = Utc::now();
    let records = vec![LogRecord::new(LogLevel::Log, "dummy\n", ago(now, 5))];

    let assembly = assembler().analyze_stream_in_groups(records, now).unwrap();

    assert_eq!(assembly.log_file.records.len(), 1);
    assert_eq!(assembly.log_file.records[0].byte_end, 6);
    assert_eq!(assembly.log_file.content().unwrap(), "dummy\n");
    assert!(assembly.deferred.is_empty());
    assert_eq!(assembly.state.collected_at, Some(now));
}

#[test]
fn test_single_fresh_record_is_deferred() {
    let now = Utc::now();
    let record = LogRecord::new(LogLevel::Log, "dummy\n", now);
    let id = record.id;

    let assembly = assembler().analyze_stream_in_groups(vec![record], now).unwrap();

    assert!(assembly.log_file.is_empty());
    assert!(assembly.log_file.storage().is_none());
    assert_eq!(assembly.deferred.len(), 1);
    assert_eq!(assembly.deferred[0].id, id);
}

#[test]
fn test_detail_keeps_its_own_record() {
    let now = Utc::now();
    let records = vec![
        LogRecord::new(LogLevel::Log, "first\n", ago(now, 5)),
        LogRecord::new(LogLevel::Detail, "second\n", ago(now, 5)),
    ];

    let assembly = assembler().analyze_stream_in_groups(records, now).unwrap();

    assert_eq!(byte_ranges(&assembly.log_file.records), vec![(0, 6), (6, 13)]);
    assert_eq!(assembly.log_file.content().unwrap(), "first\nsecond\n");
    assert!(assembly.deferred.is_empty());
}

#[test]
fn test_out_of_order_lines_are_sorted_then_stitched() {
    let now = Utc::now();
    let records = vec![
        LogRecord::continuation("second\n", now)
            .with_pid(42)
            .with_line_number(2),
        LogRecord::new(LogLevel::Log, "first\n", ago(now, 5))
            .with_pid(42)
            .with_line_number(1),
    ];

    let assembly = assembler().analyze_stream_in_groups(records, now).unwrap();

    let finalized = &assembly.log_file.records;
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0].content, "first\nsecond\n");
    assert_eq!(finalized[0].byte_end, 13);
    assert_eq!(finalized[0].log_line_number, 1);
    assert!(assembly.deferred.is_empty());
}

#[test]
fn test_stale_orphan_is_discarded() {
    let now = Utc::now();
    let records = vec![LogRecord::continuation("lost\n", ago(now, 10))];

    let assembly = assembler().analyze_stream_in_groups(records, now).unwrap();

    assert!(assembly.log_file.is_empty());
    assert!(assembly.deferred.is_empty());
    assert_eq!(assembly.stats.discarded, 1);
}

#[test]
fn test_unprefixed_continuation_follows_previous_line() {
    let now = Utc::now();
    let records = vec![
        LogRecord::new(LogLevel::Log, "zero\n", ago(now, 10))
            .with_pid(80)
            .with_occurred_at(ago(now, 10)),
        LogRecord::new(LogLevel::Log, "first\n", ago(now, 5))
            .with_pid(42)
            .with_occurred_at(ago(now, 5)),
        LogRecord::continuation("second\n", ago(now, 5)),
        LogRecord::new(LogLevel::Error, "third\n", ago(now, 4))
            .with_pid(77)
            .with_occurred_at(ago(now, 4)),
    ];

    let assembly = assembler().analyze_stream_in_groups(records, now).unwrap();

    let finalized = &assembly.log_file.records;
    assert_eq!(
        finalized.iter().map(|r| r.backend_pid).collect::<Vec<_>>(),
        vec![80, 42, 77]
    );
    assert_eq!(byte_ranges(finalized), vec![(0, 5), (5, 18), (18, 24)]);
    assert_eq!(
        assembly.log_file.content().unwrap(),
        "zero\nfirst\nsecond\nthird\n"
    );
    assert!(assembly.deferred.is_empty());
}

#[test]
fn test_every_record_is_accounted_for() {
    let now = Utc::now();
    let records = vec![
        LogRecord::continuation("orphan\n", ago(now, 10)),
        LogRecord::new(LogLevel::Log, "a\n", ago(now, 5)).with_pid(1),
        LogRecord::continuation("a cont\n", now).with_pid(1),
        LogRecord::new(LogLevel::Log, "b\n", now).with_pid(2),
        LogRecord::continuation("b cont\n", now).with_pid(2),
        LogRecord::new(LogLevel::Detail, "c\n", now).with_pid(3),
    ];
    let input = records.len();

    let assembly = assembler().analyze_stream_in_groups(records, now).unwrap();

    let stats = assembly.stats;
    assert_eq!(stats.input, input);
    assert_eq!(stats.ready + stats.deferred + stats.discarded, input);
    assert_eq!(stats.deferred, assembly.deferred.len());
    assert_eq!(stats.discarded, 1);
    assert_eq!(assembly.log_file.records.len(), 1);
    assert_eq!(assembly.log_file.records[0].content, "a\na cont\n");
}

#[test]
fn test_deferred_records_become_ready_later() {
    let now = Utc::now();
    let first = vec![
        LogRecord::new(LogLevel::Log, "statement: SELECT 1\n", now).with_pid(9),
        LogRecord::continuation("  FROM t\n", now).with_pid(9),
    ];

    let assembly = assembler().analyze_stream_in_groups(first, now).unwrap();
    assert!(assembly.log_file.is_empty());
    assert_eq!(assembly.deferred.len(), 2);

    let later = now + ChronoDuration::seconds(4);
    let assembly = assembler()
        .analyze_stream_in_groups(assembly.deferred, later)
        .unwrap();

    assert!(assembly.deferred.is_empty());
    assert_eq!(assembly.log_file.records.len(), 1);
    assert_eq!(assembly.log_file.content().unwrap(), "statement: SELECT 1\n  FROM t\n");
}

#[test]
fn test_partitioning_is_repeatable() {
    let now = Utc::now();
    let records = vec![
        LogRecord::new(LogLevel::Log, "a\n", ago(now, 5)).with_pid(1),
        LogRecord::new(LogLevel::Log, "b\n", now).with_pid(2),
        LogRecord::continuation("c\n", ago(now, 6)),
    ];

    let first = assembler().analyze_stream_in_groups(records.clone(), now).unwrap();
    let second = assembler().analyze_stream_in_groups(records, now).unwrap();

    assert_eq!(first.stats, second.stats);
    assert_eq!(
        first.deferred.iter().map(|r| r.id).collect::<Vec<_>>(),
        second.deferred.iter().map(|r| r.id).collect::<Vec<_>>()
    );
}

#[test]
fn test_allocation_failure_returns_whole_batch() {
    let now = Utc::now();
    let records = vec![
        LogRecord::new(LogLevel::Log, "b\n", ago(now, 5)).with_pid(2),
        LogRecord::new(LogLevel::Log, "a\n", ago(now, 5)).with_pid(1),
        LogRecord::new(LogLevel::Log, "fresh\n", now).with_pid(3),
    ];
    let ids: Vec<_> = records.iter().map(|r| r.id).collect();

    let assembler = StreamAssembler::new(Arc::new(FullDisk), Arc::new(NoFilter), Arc::new(PassThrough));
    let failure = assembler.analyze_stream_in_groups(records, now).unwrap_err();

    assert!(matches!(failure.error, AssemblyError::Allocate(_)));
    assert_eq!(failure.records.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
}

#[test]
fn test_temp_file_artifact_with_statement_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();
    let records = vec![
        LogRecord::new(LogLevel::Log, "duration: 12.5 ms  statement: SELECT 1\n", ago(now, 5))
            .with_pid(5),
        LogRecord::new(LogLevel::Log, "connection received: host=[local]\n", ago(now, 5))
            .with_pid(6),
    ];

    let assembler = StreamAssembler::new(
        Arc::new(TempFileAllocator::new(Some(dir.path().to_path_buf()))),
        Arc::new(IgnorePatterns::new(["^connection received: "]).unwrap()),
        Arc::new(StatementAnalyzer::new().unwrap()),
    )
    .with_threshold(Duration::from_secs(1));
    let assembly = assembler.analyze_stream_in_groups(records, now).unwrap();

    assert_eq!(assembly.stats.suppressed, 1);
    assert_eq!(assembly.log_file.records.len(), 1);
    assert_eq!(assembly.state.query_samples.len(), 1);
    assert_eq!(assembly.state.query_samples[0].runtime_ms, 12.5);

    let path = assembly.log_file.storage().and_then(|s| s.path()).unwrap();
    assert!(path.starts_with(dir.path()));
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "duration: 12.5 ms  statement: SELECT 1\n"
    );
}
