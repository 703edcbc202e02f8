//! Temporary artifacts are removed on every exit path unless retained.

mod common;

use std::path::{Path, PathBuf};

use camcut_director::{DirectorResult, EngineReport, SelectionEngine, TempArtifacts};
use camcut_models::RunId;
use common::{settings, FileSink, StubSource, TableScorer};
use tempfile::TempDir;

fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

/// Run the engine into file-backed artifacts, propagating errors with `?`
/// so that nothing calls `release` on the failure path.
async fn run_into_files(
    dir: &Path,
    scorer: &TableScorer,
    windows: usize,
    retain: bool,
) -> DirectorResult<(EngineReport, Vec<PathBuf>)> {
    let mut artifacts = TempArtifacts::create(dir, RunId::new(), retain)?;
    let mut sink = FileSink::create(&mut artifacts, 2)?;
    let mut sources = vec![StubSource::new(0, windows), StubSource::new(1, windows)];

    let engine = SelectionEngine::new(artifacts.run_id().clone(), scorer, settings(6.0));
    let report = engine.run(&mut sources[..], &mut sink).await?;

    let paths = artifacts.artifacts().iter().map(|a| a.path.clone()).collect();
    let released = artifacts.release();
    assert_eq!(released.retained, retain);
    Ok((report, paths))
}

#[tokio::test]
async fn test_artifacts_removed_after_success() {
    let dir = TempDir::new().unwrap();
    let scorer = TableScorer::from_rows(&[&[1, 2], &[2, 1], &[1, 2]]);

    let (report, paths) = run_into_files(dir.path(), &scorer, 3, false).await.unwrap();

    assert_eq!(report.decisions.len(), 3);
    assert_eq!(paths.len(), 3);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_artifacts_removed_after_drain() {
    let dir = TempDir::new().unwrap();
    let scorer = TableScorer::default();

    let (report, _) = run_into_files(dir.path(), &scorer, 1, false).await.unwrap();

    assert!(report.outcome.is_early_stop());
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_artifacts_removed_when_scorer_fails() {
    let dir = TempDir::new().unwrap();
    let scorer = TableScorer::from_rows(&[&[1, 2], &[1, 2], &[1, 2]]).failing_at(2);

    let err = run_into_files(dir.path(), &scorer, 3, false).await.unwrap_err();

    assert!(err.to_string().contains("scorer"));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_artifacts_retained_on_request() {
    let dir = TempDir::new().unwrap();
    let scorer = TableScorer::default();

    let (_, paths) = run_into_files(dir.path(), &scorer, 3, true).await.unwrap();

    let mut remaining = files_in(dir.path());
    remaining.sort();
    let mut expected = paths;
    expected.sort();
    assert_eq!(remaining, expected);

    // Video frames were written raw
    let video = expected.iter().find(|p| p.to_string_lossy().contains("merged")).unwrap();
    assert!(std::fs::metadata(video).unwrap().len() > 0);
}

#[tokio::test]
async fn test_release_happens_once() {
    let dir = TempDir::new().unwrap();
    let mut artifacts = TempArtifacts::create(dir.path(), RunId::new(), false).unwrap();
    let _sink = FileSink::create(&mut artifacts, 1).unwrap();

    let first = artifacts.release();
    assert_eq!(first.removed, 2);
    assert!(artifacts.is_released());

    let second = artifacts.release();
    assert_eq!(second.removed, 0);
    assert!(files_in(dir.path()).is_empty());
}
