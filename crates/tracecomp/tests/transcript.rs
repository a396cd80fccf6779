//! Parsing captured transcripts from disk.

use std::fs::File;
use std::io::Write;

use tempfile::TempDir;
use tracecomp::{Direction, ParseConfig, RecordStream, TraceError, parse_file};

/// A short boot sequence as Spike prints it under `-d`, with a skipped
/// machine-mode setup region and a load access fault.
const TRANSCRIPT: &str = "\
(spike) reg 0 a0
0x0000000000000000
core   0: 3 0x0000000000001000 (0x00000297) x5 0x0000000000001000
core   0: 3 0x0000000000001004 (0x02028593) x11 0x0000000000001020
core   0: 3 0x0000000080000000 (0x30101073) c301_misa 0x8000000000141101
core   0: 3 0x0000000080000004 (0x00000297) x5 0x0000000080000004
core   0: 3 0x0000000080000008 (0x30529073) c773_mtvec 0x0000000080000010
core   0: 3 0x000000008000000c (0x00000073)
core   0: 3 0x0000000080000010 (0x0182b283) x5 0x0000000000000000 mem 0x0000000080002000
core   0: exception trap_load_access_fault, epc 0x0000000080000014
core   0:           tval 0x0000000000000000
core   0: 3 0x0000000080000018 (0x0062a023) mem 0x0000000080002000 0x0000000000000001
";

fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    File::create(&path)
        .unwrap()
        .write_all(text.as_bytes())
        .unwrap();
    path
}

#[test]
fn test_parse_plain_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "spike.log", TRANSCRIPT);

    let trace = parse_file(&ParseConfig::default(), &path).unwrap();
    let pcs: Vec<u64> = trace.stream.iter().map(|r| r.pc).collect();
    assert_eq!(
        pcs,
        vec![0x1000, 0x1004, 0x8000_0004, 0x8000_0008, 0x8000_0010, 0, 0x8000_0018]
    );

    let records = trace.stream.as_slice();
    assert!(records[2].synthesized && records[3].synthesized);
    assert_eq!(
        records[4].memory_access().map(|m| m.direction),
        Some(Direction::Load)
    );
    assert_eq!(
        records[6].memory_access().map(|m| m.direction),
        Some(Direction::Store)
    );

    let diag = &trace.diagnostics;
    assert_eq!(diag.total_lines, 12);
    assert_eq!(diag.noise_lines, 3);
    assert_eq!(diag.retained_lines, 5);
    assert_eq!(diag.suppressed_in_region, 2);
    assert_eq!(diag.value_traps, 1);
    assert_eq!(diag.emitted_records, 7);
}

#[test]
fn test_parse_zstd_file() {
    let dir = TempDir::new().unwrap();
    let plain = write(&dir, "spike.log", TRANSCRIPT);

    let compressed = zstd::encode_all(TRANSCRIPT.as_bytes(), 3).unwrap();
    let path = dir.path().join("spike.log.zst");
    std::fs::write(&path, compressed).unwrap();

    let config = ParseConfig::default();
    assert_eq!(
        parse_file(&config, &path).unwrap(),
        parse_file(&config, &plain).unwrap()
    );
}

#[test]
fn test_ndjson_reloads() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "spike.log", TRANSCRIPT);
    let trace = parse_file(&ParseConfig::default(), &path).unwrap();

    let mut out = Vec::new();
    trace.stream.write_jsonl(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), trace.stream.len());

    let reloaded = RecordStream::read_jsonl(&text).unwrap();
    assert_eq!(reloaded, trace.stream);
}

#[test]
fn test_config_file_changes_markers() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "spike.log", TRANSCRIPT);
    let config_path = write(
        &dir,
        "markers.toml",
        "placeholder_encoding = 0\n[markers]\nregion_start = \"c773_mtvec\"\n",
    );

    let config = ParseConfig::load(&config_path).unwrap();
    let trace = parse_file(&config, &path).unwrap();

    // c301_misa is now an ordinary CSR write; the region opens one line later.
    let records = trace.stream.as_slice();
    assert!(!records[2].synthesized);
    assert!(!records[3].synthesized);
    assert_eq!(trace.diagnostics.regions[0].start_line, 6);
    assert_eq!(trace.diagnostics.suppressed_in_region, 0);
}

#[test]
fn test_malformed_file_reports_line() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "spike.log", "core   0: 3 0x1000 (0x00000013)\nbbl loader\n");

    match parse_file(&ParseConfig::default(), &path) {
        Err(TraceError::MalformedLine { index, text, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(text, "bbl loader");
        }
        other => panic!("expected malformed line, got {other:?}"),
    }
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = parse_file(&ParseConfig::default(), &dir.path().join("absent.log")).unwrap_err();
    assert!(matches!(err, TraceError::Io(_)));
}
