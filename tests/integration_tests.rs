use clap::Parser;
/// Integration tests for tvsort
///
/// These tests run whole batches over temporary trees with the stock
/// collaborators and check what ends up where.
///
/// Test categories:
/// 1. Live runs and destination rules
/// 2. Dry-run mode verification
/// 3. Stopping a run
/// 4. Directory cleanup
/// 5. Error isolation and record numbering
/// 6. Settings and the command line
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tvsort::cli::{Cli, Outcome, run_cli};
use tvsort::matcher::{Classification, MatchError};
use tvsort::progress::SinkError;
use tvsort::{
    BatchEngine, CancellationToken, CollectingSink, FileRecord, Mode, ProgressSink, RecordStatus,
    RunConfig, RunResult, Settings,
};
use walkdir::WalkDir;

const RUNNING_MAN: &str = "런닝맨.E650.230416.720p-NEXT.mp4";
const MUSIC_BANK: &str = "Music.Bank.E1170.230505.1080p.WEB-DL.AAC.H264-F1RST.mkv";

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary source, target and error tree.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let fixture = TestFixture { temp_dir };
        fs::create_dir(fixture.source()).expect("Failed to create source directory");
        fixture
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn source(&self) -> PathBuf {
        self.path().join("incoming")
    }

    fn target(&self) -> PathBuf {
        self.path().join("tv")
    }

    fn error(&self) -> PathBuf {
        self.path().join("tv_error")
    }

    fn config(&self, mode: Mode) -> RunConfig {
        RunConfig::new(self.source(), self.target(), self.error(), mode)
    }

    /// Create a file under the source root, with parent directories.
    fn create_file(&self, rel_path: &str, content: &str) {
        let path = self.source().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file content");
    }

    fn assert_file_exists(&self, path: &Path) {
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_not_exists(&self, path: &Path) {
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }

    /// Every path under the fixture root with file contents, sorted.
    fn snapshot(&self) -> Vec<(PathBuf, Option<Vec<u8>>)> {
        WalkDir::new(self.path())
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.expect("Failed to walk fixture"))
            .map(|entry| {
                let content = entry
                    .file_type()
                    .is_file()
                    .then(|| fs::read(entry.path()).expect("Failed to read file"));
                (entry.path().to_path_buf(), content)
            })
            .collect()
    }

    /// Runs the stock engine and returns the outcome with all records.
    fn run(&self, mode: Mode) -> (RunResult, Vec<FileRecord>) {
        let engine =
            BatchEngine::from_settings(&Settings::default()).expect("Failed to build engine");
        self.run_with(engine, mode)
    }

    fn run_with(&self, engine: BatchEngine, mode: Mode) -> (RunResult, Vec<FileRecord>) {
        let mut sink = CollectingSink::new();
        let result = engine
            .run(&self.config(mode), &CancellationToken::new(), &mut sink)
            .expect("Run should start");
        (result, sink.records())
    }
}

fn record_for<'a>(records: &'a [FileRecord], filename: &str) -> &'a FileRecord {
    records
        .iter()
        .find(|r| r.filename == filename)
        .unwrap_or_else(|| panic!("no record for {filename}"))
}

// ============================================================================
// Live Runs
// ============================================================================

#[test]
fn test_live_run_sorts_matched_and_unmatched() {
    let fixture = TestFixture::new();
    fixture.create_file(RUNNING_MAN, "a");
    fixture.create_file(MUSIC_BANK, "b");
    fixture.create_file("holiday.mp4", "c");

    let (result, records) = fixture.run(Mode::Live);

    assert_eq!(result, RunResult::Completed);
    assert_eq!(records.len(), 3);
    fixture.assert_file_exists(&fixture.target().join("런닝맨").join(RUNNING_MAN));
    fixture.assert_file_exists(&fixture.target().join("Music Bank").join(MUSIC_BANK));
    fixture.assert_file_exists(&fixture.error().join("holiday.mp4"));
    fixture.assert_not_exists(&fixture.source().join(RUNNING_MAN));

    let unmatched = record_for(&records, "holiday.mp4");
    assert_eq!(unmatched.status, RecordStatus::Relocated);
    assert_eq!(unmatched.result_folder.as_deref(), Some(fixture.error().as_path()));
    assert_eq!(unmatched.result_filename.as_deref(), Some("holiday.mp4"));
}

#[test]
fn test_every_processed_record_has_a_destination() {
    let fixture = TestFixture::new();
    fixture.create_file(RUNNING_MAN, "a");
    fixture.create_file("sub/unknown.mkv", "b");
    fixture.create_file("notes.txt", "c");

    let (_, records) = fixture.run(Mode::Live);

    for record in &records {
        if record.status == RecordStatus::Skipped {
            assert!(record.result_folder.is_none());
            continue;
        }
        assert!(record.classification.is_some());
        assert!(record.result_folder.is_some(), "{} has no folder", record.filename);
        assert!(record.result_filename.is_some());
    }
    assert_eq!(record_for(&records, "notes.txt").status, RecordStatus::Skipped);
}

#[test]
fn test_name_collision_gets_suffix() {
    let fixture = TestFixture::new();
    let show_dir = fixture.target().join("런닝맨");
    fs::create_dir_all(&show_dir).expect("Failed to create show directory");
    fs::write(show_dir.join(RUNNING_MAN), "old").expect("Failed to write existing episode");
    fixture.create_file(RUNNING_MAN, "new");

    let (_, records) = fixture.run(Mode::Live);

    let moved = show_dir.join("런닝맨.E650.230416.720p-NEXT (1).mp4");
    fixture.assert_file_exists(&moved);
    assert_eq!(fs::read_to_string(show_dir.join(RUNNING_MAN)).unwrap(), "old");
    assert_eq!(fs::read_to_string(&moved).unwrap(), "new");
    assert_eq!(records[0].moved_to.as_deref(), Some(moved.as_path()));
}

// ============================================================================
// Dry Run Tests
// ============================================================================

#[test]
fn test_dry_run_leaves_tree_untouched() {
    let fixture = TestFixture::new();
    fixture.create_file(RUNNING_MAN, "a");
    fixture.create_file("deep/er/holiday.mp4", "b");
    fs::create_dir_all(fixture.source().join("empty")).expect("Failed to create dir");

    let before = fixture.snapshot();
    let (result, records) = fixture.run(Mode::Dry);
    let after = fixture.snapshot();

    assert_eq!(result, RunResult::Completed);
    assert_eq!(before, after);
    assert!(records.iter().all(|r| r.status == RecordStatus::Planned));
    assert!(records.iter().all(|r| r.moved_to.is_none()));

    let planned = record_for(&records, RUNNING_MAN);
    assert_eq!(
        planned.destination_path(),
        Some(fixture.target().join("런닝맨").join(RUNNING_MAN))
    );
}

// ============================================================================
// Stopping A Run
// ============================================================================

#[test]
fn test_stop_after_n_files_yields_n_records() {
    let fixture = TestFixture::new();
    for n in 1..=5 {
        fixture.create_file(&format!("Show.E{n:02}.230101.720p-NEXT.mp4"), "x");
    }

    let engine = BatchEngine::from_settings(&Settings::default()).expect("engine");
    let token = CancellationToken::new();
    let collected = CollectingSink::new();
    let mut inner = collected.clone();
    let stopper = token.clone();
    let mut sink = move |record: FileRecord| -> Result<(), SinkError> {
        inner.deliver(record)?;
        if inner.len() == 2 {
            stopper.cancel();
        }
        Ok(())
    };

    let result = engine
        .run(&fixture.config(Mode::Live), &token, &mut sink)
        .expect("Run should start");

    assert_eq!(result, RunResult::StoppedByUser);
    assert_eq!(collected.len(), 2);
    fixture.assert_file_exists(&fixture.source().join("Show.E03.230101.720p-NEXT.mp4"));
    fixture.assert_file_exists(&fixture.target().join("Show").join("Show.E01.230101.720p-NEXT.mp4"));
}

#[test]
fn test_stopped_run_skips_final_sweep() {
    let fixture = TestFixture::new();
    fixture.create_file("P/Q/Show.E01.230101.720p-NEXT.mp4", "x");
    fixture.create_file("Z/Show.E02.230101.720p-NEXT.mp4", "x");

    let engine = BatchEngine::from_settings(&Settings::default()).expect("engine");
    let token = CancellationToken::new();
    let stopper = token.clone();
    let mut sink = move |_record: FileRecord| -> Result<(), SinkError> {
        stopper.cancel();
        Ok(())
    };

    let result = engine
        .run(&fixture.config(Mode::Live), &token, &mut sink)
        .expect("Run should start");

    assert_eq!(result, RunResult::StoppedByUser);
    // Q is pruned with its last file; P only goes away in the final sweep
    fixture.assert_not_exists(&fixture.source().join("P").join("Q"));
    assert!(fixture.source().join("P").is_dir());
    fixture.assert_file_exists(&fixture.source().join("Z").join("Show.E02.230101.720p-NEXT.mp4"));
}

// ============================================================================
// Directory Cleanup
// ============================================================================

#[test]
fn test_cleanup_removes_emptied_chain_but_not_root() {
    let fixture = TestFixture::new();
    fixture.create_file("A/B/Show.E01.230101.720p-NEXT.mp4", "x");

    let (result, _) = fixture.run(Mode::Live);

    assert_eq!(result, RunResult::Completed);
    fixture.assert_not_exists(&fixture.source().join("A").join("B"));
    fixture.assert_not_exists(&fixture.source().join("A"));
    assert!(fixture.source().is_dir());
}

#[test]
fn test_cleanup_keeps_directories_with_skipped_files() {
    let fixture = TestFixture::new();
    fixture.create_file("A/Show.E01.230101.720p-NEXT.mp4", "x");
    fixture.create_file("A/readme.txt", "keep me");

    fixture.run(Mode::Live);

    fixture.assert_file_exists(&fixture.source().join("A").join("readme.txt"));
}

#[test]
fn test_pre_existing_empty_directories_are_removed() {
    let fixture = TestFixture::new();
    fs::create_dir_all(fixture.source().join("x/y/z")).expect("Failed to create dirs");

    fixture.run(Mode::Live);

    fixture.assert_not_exists(&fixture.source().join("x"));
}

// ============================================================================
// Error Isolation And Numbering
// ============================================================================

#[test]
fn test_failing_matcher_does_not_end_run() {
    let fixture = TestFixture::new();
    fixture.create_file("a.mp4", "x");
    fixture.create_file("boom.mp4", "x");
    fixture.create_file("c.mp4", "x");

    let matcher = |filename: &str, _: &Path| -> Result<Classification, MatchError> {
        if filename.starts_with("boom") {
            return Err(MatchError::Lookup {
                filename: filename.to_string(),
                reason: "lookup service down".to_string(),
            });
        }
        Ok(Classification::unmatched())
    };
    let engine = BatchEngine::from_settings(&Settings::default())
        .expect("engine")
        .with_matcher(matcher);

    let (result, records) = fixture.run_with(engine, Mode::Live);

    assert_eq!(result, RunResult::Completed);
    assert_eq!(records.len(), 3);
    let failed = record_for(&records, "boom.mp4");
    assert!(failed.log.iter().any(|l| l.contains("lookup service down")));
    fixture.assert_file_exists(&fixture.error().join("boom.mp4"));
    fixture.assert_file_exists(&fixture.error().join("c.mp4"));
}

#[test]
fn test_indices_are_gap_free_with_skipped_files() {
    let fixture = TestFixture::new();
    fixture.create_file("1.txt", "x");
    fixture.create_file(RUNNING_MAN, "x");
    fixture.create_file("sub/2.nfo", "x");
    fixture.create_file("sub/holiday.mp4", "x");

    let (_, records) = fixture.run(Mode::Dry);

    let indices: Vec<usize> = records.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..records.len()).collect::<Vec<_>>());
    assert_eq!(records.len(), 4);
}

#[test]
fn test_missing_source_is_an_error() {
    let fixture = TestFixture::new();
    let engine = BatchEngine::from_settings(&Settings::default()).expect("engine");
    let mut config = fixture.config(Mode::Dry);
    config.source = fixture.path().join("nowhere");

    let mut sink = CollectingSink::new();
    assert!(
        engine
            .run(&config, &CancellationToken::new(), &mut sink)
            .is_err()
    );
    assert!(sink.is_empty());
}

// ============================================================================
// Settings And Command Line
// ============================================================================

fn write_settings(fixture: &TestFixture, extra: &str) -> PathBuf {
    let path = fixture.path().join("tvsort.toml");
    let doc = format!(
        "[paths]\nsource = '{}'\ntarget = '{}'\nerror = '{}'\n{extra}",
        fixture.source().display(),
        fixture.target().display(),
        fixture.error().display(),
    );
    fs::write(&path, doc).expect("Failed to write settings");
    path
}

#[test]
fn test_init_config_never_overwrites() {
    let fixture = TestFixture::new();
    let path = fixture.path().join("conf").join("tvsort.toml");

    let cli = Cli::parse_from(["tvsort", "init-config", path.to_str().unwrap()]);
    let first = run_cli(&cli).expect("init should succeed");
    assert!(matches!(first, Outcome::ConfigInitialized { created: true, .. }));

    fs::write(&path, "# mine").expect("Failed to overwrite settings");
    let second = run_cli(&cli).expect("init should succeed");
    assert!(matches!(second, Outcome::ConfigInitialized { created: false, .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), "# mine");
}

#[test]
fn test_settings_aliases_reach_the_destination() {
    let fixture = TestFixture::new();
    let config = write_settings(&fixture, "[matcher.aliases]\n\"Music Bank\" = \"뮤직뱅크\"\n");
    fixture.create_file(MUSIC_BANK, "x");

    let settings = Settings::load(Some(&config)).expect("Failed to load settings");
    let engine = BatchEngine::from_settings(&settings).expect("engine");
    let (_, records) = fixture.run_with(engine, Mode::Live);

    assert_eq!(
        records[0].result_folder.as_deref(),
        Some(fixture.target().join("뮤직뱅크").as_path())
    );
}

#[test]
fn test_cli_dry_run_writes_report() {
    let fixture = TestFixture::new();
    let config = write_settings(&fixture, "");
    fixture.create_file(RUNNING_MAN, "x");
    fixture.create_file("notes.txt", "x");
    let report = fixture.path().join("report.json");

    let cli = Cli::parse_from([
        "tvsort",
        "run",
        "--dry-run",
        "--config",
        config.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
    ]);
    let outcome = run_cli(&cli).expect("run should succeed");

    match outcome {
        Outcome::Run { result, summary } => {
            assert_eq!(result, RunResult::Completed);
            assert_eq!(summary.total, 2);
            assert_eq!(summary.matched, 1);
            assert_eq!(summary.count(RecordStatus::Skipped), 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    fixture.assert_file_exists(&fixture.source().join(RUNNING_MAN));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["result"], "completed");
    assert_eq!(json["records"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_cli_live_run_moves_files() {
    let fixture = TestFixture::new();
    let config = write_settings(&fixture, "");
    fixture.create_file("season/Show.E01.230101.720p-NEXT.mp4", "x");

    let cli = Cli::parse_from(["tvsort", "run", "--config", config.to_str().unwrap()]);
    let outcome = run_cli(&cli).expect("run should succeed");

    assert!(matches!(
        outcome,
        Outcome::Run {
            result: RunResult::Completed,
            ..
        }
    ));
    fixture.assert_file_exists(&fixture.target().join("Show").join("Show.E01.230101.720p-NEXT.mp4"));
    fixture.assert_not_exists(&fixture.source().join("season"));
}
