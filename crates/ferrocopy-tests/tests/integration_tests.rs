//! Integration tests for ferrocopy
//!
//! These tests drive the engine end to end against real directory trees.

use std::fs;
use std::path::Path;
use std::time::Duration;

use ferrocopy_compression::FrameReader;
use ferrocopy_config::{Config, MoveFallback, OperationPolicy};
use ferrocopy_engine::{CopyEngine, CopyRequest, EngineEvent, EventReceiver, Verifier};
use ferrocopy_tests::{
    generate_test_data, list_files, standard_tree, trees_equal, write_file, TestDataPattern,
    TreeBuilder, Workspace,
};
use ferrocopy_types::{ChecksumAlgorithm, CopyMode, ErrorCode, OperationPhase, ProgressEvent};
use rstest::rstest;
use tokio::time::timeout;

const LARGE: usize = 64 * 1024 * 1024;

fn engine() -> CopyEngine {
    CopyEngine::new(Config::default()).unwrap()
}

/// Drain a receiver until the completion event, returning the progress
/// events seen and the number of error events.
async fn drain(mut events: EventReceiver) -> (Vec<ProgressEvent>, usize, bool) {
    let mut progress = Vec::new();
    let mut errors = 0;
    let mut completed = false;
    while let Some(event) = timeout(Duration::from_secs(60), events.recv()).await.unwrap() {
        match event {
            EngineEvent::Progress(p) => progress.push(p),
            EngineEvent::Error(_) => errors += 1,
            EngineEvent::Completed(_) => {
                completed = true;
                break;
            }
        }
    }
    (progress, errors, completed)
}

/// No `.ferrocopy-*.tmp` file may survive an operation.
fn assert_no_temp_files(root: &Path) {
    if !root.exists() {
        return;
    }
    for file in list_files(root).unwrap() {
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!name.ends_with(".tmp"), "leftover temp file {}", file.display());
    }
}

#[tokio::test]
async fn test_tree_copy_with_verification() {
    let workspace = Workspace::new().unwrap();
    standard_tree().build(&workspace.source()).unwrap();

    let request = CopyRequest::new(workspace.source(), workspace.destination()).verify_copy(true);
    let report = engine().execute(request).await.unwrap();

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.error_code(), ErrorCode::Success);
    assert_eq!(report.stats.files_copied, 3);
    assert_eq!(report.stats.directories_created, 1);
    assert_eq!(report.stats.errors, 0);
    assert_eq!(report.stats.bytes_copied, 1024 + 10 * 1024 * 1024);
    assert!(report.source_device.is_some());
    assert!(report.destination_device.is_some());
    assert!(trees_equal(&workspace.source(), &workspace.destination()).unwrap());
    assert_no_temp_files(&workspace.destination());
}

#[tokio::test]
async fn test_single_file_into_new_path() {
    let workspace = Workspace::new().unwrap();
    let source = write_file(&workspace.root().join("a.txt"), 4096, TestDataPattern::Text).unwrap();
    let destination = workspace.root().join("out/deeper/a.txt");

    let report = engine()
        .execute(CopyRequest::new(&source, &destination))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.stats.files_copied, 1);
    assert_eq!(fs::read(&source).unwrap(), fs::read(&destination).unwrap());
}

#[rstest]
#[case(0, 0)]
#[case(1, 4096)]
#[case(4, 64 * 1024)]
#[case(16, 0)]
#[tokio::test]
async fn test_hints_do_not_change_contents(#[case] threads: u32, #[case] buffer_size: u64) {
    let workspace = Workspace::new().unwrap();
    TreeBuilder::new()
        .file("a.bin", 300_000, TestDataPattern::Random)
        .file("b/c.bin", 70_000, TestDataPattern::Random)
        .file("b/d/e.txt", 5, TestDataPattern::Text)
        .build(&workspace.source())
        .unwrap();

    let request = CopyRequest::new(workspace.source(), workspace.destination())
        .with_threads(threads)
        .with_buffer_size(buffer_size);
    let report = engine().execute(request).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.stats.files_copied, 3);
    assert!(trees_equal(&workspace.source(), &workspace.destination()).unwrap());
}

#[tokio::test]
async fn test_empty_source_creates_no_operation() {
    let workspace = Workspace::new().unwrap();
    let engine = engine();

    let error = engine
        .submit(CopyRequest::new("", workspace.destination()))
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidPath);

    let error = engine
        .submit(CopyRequest::new(workspace.root().join("missing"), workspace.destination()))
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidPath);

    assert!(engine.list_operations().is_empty());
}

#[tokio::test]
async fn test_sync_skips_identical_and_removes_extraneous() {
    let workspace = Workspace::new().unwrap();
    TreeBuilder::new()
        .file("keep.txt", 2048, TestDataPattern::Text)
        .file("nested/also.bin", 4096, TestDataPattern::Random)
        .build(&workspace.source())
        .unwrap();
    let engine = engine();

    let first = engine
        .execute(CopyRequest::new(workspace.source(), workspace.destination()).with_mode(CopyMode::Sync))
        .await
        .unwrap();
    assert!(first.is_success());
    assert_eq!(first.stats.files_copied, 2);

    write_file(&workspace.destination().join("extra.txt"), 10, TestDataPattern::Text).unwrap();

    let second = engine
        .execute(CopyRequest::new(workspace.source(), workspace.destination()).with_mode(CopyMode::Sync))
        .await
        .unwrap();
    assert!(second.is_success());
    assert_eq!(second.stats.files_copied, 0);
    assert_eq!(second.stats.files_skipped, 2);
    assert!(!workspace.destination().join("extra.txt").exists());
    assert!(trees_equal(&workspace.source(), &workspace.destination()).unwrap());
}

#[tokio::test]
async fn test_sync_without_delete_keeps_extraneous() {
    let workspace = Workspace::new().unwrap();
    TreeBuilder::new()
        .file("a.txt", 100, TestDataPattern::Text)
        .build(&workspace.source())
        .unwrap();
    write_file(&workspace.destination().join("extra.txt"), 10, TestDataPattern::Text).unwrap();

    let policy = OperationPolicy {
        delete_extraneous: false,
        ..OperationPolicy::default()
    };
    let report = engine()
        .execute(
            CopyRequest::new(workspace.source(), workspace.destination())
                .with_mode(CopyMode::Sync)
                .with_policy(policy),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(workspace.destination().join("extra.txt").exists());
    assert!(workspace.destination().join("a.txt").exists());
}

#[tokio::test]
async fn test_sync_recopies_changed_file() {
    let workspace = Workspace::new().unwrap();
    let source = workspace.source();
    TreeBuilder::new()
        .file("a.txt", 100, TestDataPattern::Text)
        .build(&source)
        .unwrap();
    let engine = engine();
    let request = || CopyRequest::new(workspace.source(), workspace.destination()).with_mode(CopyMode::Sync);

    engine.execute(request()).await.unwrap();
    fs::write(source.join("a.txt"), b"a different and longer body").unwrap();

    let report = engine.execute(request()).await.unwrap();
    assert_eq!(report.stats.files_copied, 1);
    assert_eq!(
        fs::read(workspace.destination().join("a.txt")).unwrap(),
        b"a different and longer body"
    );
}

#[tokio::test]
async fn test_sync_replaces_directory_with_file() {
    let workspace = Workspace::new().unwrap();
    TreeBuilder::new()
        .file("x", 512, TestDataPattern::Text)
        .build(&workspace.source())
        .unwrap();
    TreeBuilder::new()
        .file("x/child.txt", 64, TestDataPattern::Random)
        .file("x/deeper/more.txt", 64, TestDataPattern::Random)
        .build(&workspace.destination())
        .unwrap();

    let report = engine()
        .execute(CopyRequest::new(workspace.source(), workspace.destination()).with_mode(CopyMode::Sync))
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.stats.errors, 0);
    assert_eq!(report.stats.files_copied, 1);
    assert!(workspace.destination().join("x").is_file());
    assert!(trees_equal(&workspace.source(), &workspace.destination()).unwrap());
}

#[tokio::test]
async fn test_move_deletes_sources() {
    let workspace = Workspace::new().unwrap();
    standard_tree().build(&workspace.source()).unwrap();
    let expected = list_files(&workspace.source()).unwrap();

    let report = engine()
        .execute(CopyRequest::new(workspace.source(), workspace.destination()).with_mode(CopyMode::Move))
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.error);
    assert!(!workspace.source().exists() || list_files(&workspace.source()).unwrap().is_empty());
    assert_eq!(list_files(&workspace.destination()).unwrap(), expected);
    assert_eq!(
        fs::read(workspace.destination().join("sub/large.bin")).unwrap(),
        generate_test_data(10 * 1024 * 1024, TestDataPattern::Random)
    );
}

#[tokio::test]
async fn test_move_by_rename_creates_destination_parents() {
    let workspace = Workspace::new().unwrap();
    standard_tree().build(&workspace.source()).unwrap();
    let expected = list_files(&workspace.source()).unwrap();
    let destination = workspace.root().join("nested/deeper/dst");

    // rename is the only way this move may succeed
    let policy = OperationPolicy {
        move_fallback: MoveFallback::Fail,
        ..OperationPolicy::default()
    };
    let report = engine()
        .execute(
            CopyRequest::new(workspace.source(), &destination)
                .with_mode(CopyMode::Move)
                .with_policy(policy),
        )
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.error);
    assert!(!workspace.source().exists());
    assert_eq!(list_files(&destination).unwrap(), expected);
}

#[tokio::test]
async fn test_move_without_fallback_fails_when_rename_fails() {
    let workspace = Workspace::new().unwrap();
    standard_tree().build(&workspace.source()).unwrap();
    // a file where the destination's parent directory should be
    write_file(&workspace.root().join("blocker"), 1, TestDataPattern::Zeros).unwrap();
    let destination = workspace.root().join("blocker/dst");

    let policy = OperationPolicy {
        move_fallback: MoveFallback::Fail,
        ..OperationPolicy::default()
    };
    let report = engine()
        .execute(
            CopyRequest::new(workspace.source(), &destination)
                .with_mode(CopyMode::Move)
                .with_policy(policy),
        )
        .await
        .unwrap();

    assert_eq!(report.phase, OperationPhase::Failed);
    let error = report.error.unwrap();
    assert!(error.to_string().contains("cannot rename"), "{}", error);
    // nothing was copied and the source is intact
    assert_eq!(report.stats.files_copied, 0);
    assert_eq!(list_files(&workspace.source()).unwrap().len(), 3);
    assert!(workspace.root().join("blocker").is_file());
}

#[tokio::test]
async fn test_compressed_move_copies_then_deletes() {
    let workspace = Workspace::new().unwrap();
    let source = write_file(&workspace.root().join("a.txt"), 100_000, TestDataPattern::Text).unwrap();
    let destination = workspace.root().join("a.txt.fcz");

    let policy = OperationPolicy {
        move_fallback: MoveFallback::CopyThenDelete,
        ..OperationPolicy::default()
    };
    let report = engine()
        .execute(
            CopyRequest::new(&source, &destination)
                .with_mode(CopyMode::Move)
                .compress(true)
                .with_policy(policy),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(!source.exists());
    assert!(destination.exists());
}

#[tokio::test]
async fn test_compressed_copy_round_trips_with_verification() {
    let workspace = Workspace::new().unwrap();
    let source = write_file(&workspace.root().join("doc.txt"), 512 * 1024, TestDataPattern::Text).unwrap();
    let destination = workspace.root().join("doc.txt.fcz");

    let report = engine()
        .execute(
            CopyRequest::new(&source, &destination)
                .compress(true)
                .verify_copy(true),
        )
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.stats.errors, 0);
    assert!(fs::metadata(&destination).unwrap().len() < fs::metadata(&source).unwrap().len());

    let file = tokio::fs::File::open(&destination).await.unwrap();
    let mut reader = FrameReader::open(file).await.unwrap();
    assert_eq!(reader.read_to_end().await.unwrap(), fs::read(&source).unwrap());

    let verifier = Verifier::new(ChecksumAlgorithm::Blake3);
    assert!(verifier.verify_framed(&source, &destination).await.unwrap());
}

#[tokio::test]
async fn test_progress_events_are_bounded_and_ordered() {
    let workspace = Workspace::new().unwrap();
    standard_tree().build(&workspace.source()).unwrap();
    let engine = engine();

    let (id, events) = engine
        .submit_with_events(CopyRequest::new(workspace.source(), workspace.destination()))
        .unwrap();
    let (progress, errors, completed) = drain(events).await;
    let report = engine.wait(id).await.unwrap();

    assert!(report.is_success());
    assert!(completed);
    assert_eq!(errors, 0);
    assert!(!progress.is_empty());
    let mut last = 0;
    for event in &progress {
        assert!(event.bytes_copied <= event.total_bytes);
        assert!(event.bytes_copied >= last);
        assert!((0.0..=100.0).contains(&event.percent));
        last = event.bytes_copied;
    }
    let final_event = progress.last().unwrap();
    assert_eq!(final_event.bytes_copied, final_event.total_bytes);
}

#[tokio::test]
async fn test_efficiency_is_clamped() {
    let workspace = Workspace::new().unwrap();
    write_file(&workspace.source().join("a.bin"), 1024 * 1024, TestDataPattern::Zeros).unwrap();

    let report = engine()
        .execute(CopyRequest::new(workspace.source(), workspace.destination()))
        .await
        .unwrap();

    let stats = report.stats;
    assert!((0.0..=100.0).contains(&stats.efficiency_percent));
    assert!(stats.transfer_rate >= 0.0);
    assert!(stats.duration > Duration::ZERO);
}

#[tokio::test]
async fn test_cancel_mid_transfer_leaves_no_partial_file() {
    let workspace = Workspace::new().unwrap();
    let source = write_file(&workspace.root().join("big.bin"), LARGE, TestDataPattern::Zeros).unwrap();
    let destination = workspace.root().join("out.bin");
    let engine = engine();

    let (id, mut events) = engine
        .submit_with_events(
            CopyRequest::new(&source, &destination)
                .with_threads(1)
                .with_buffer_size(4096),
        )
        .unwrap();

    // cancel as soon as bytes start moving
    while let Some(event) = timeout(Duration::from_secs(60), events.recv()).await.unwrap() {
        if matches!(event, EngineEvent::Progress(_) | EngineEvent::Completed(_)) {
            break;
        }
    }
    engine.cancel(id).unwrap();
    let report = engine.wait(id).await.unwrap();

    match report.phase {
        OperationPhase::Cancelled => {
            assert_eq!(report.error_code(), ErrorCode::Cancelled);
            assert!(!destination.exists());
        }
        // the copy may finish before the cancel lands
        OperationPhase::Completed => {
            assert_eq!(fs::metadata(&destination).unwrap().len(), LARGE as u64);
        }
        other => panic!("unexpected phase {:?}", other),
    }
    assert_no_temp_files(workspace.root());
    assert!(source.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_keeps_completed_files() {
    let workspace = Workspace::new().unwrap();
    let mut tree = TreeBuilder::new();
    for i in 0..8 {
        tree = tree.file(format!("f{:02}.bin", i), 8 * 1024 * 1024, TestDataPattern::Random);
    }
    tree.build(&workspace.source()).unwrap();
    let engine = engine();

    let id = engine
        .submit(
            CopyRequest::new(workspace.source(), workspace.destination())
                .with_threads(1)
                .with_buffer_size(4096),
        )
        .unwrap();
    // cancel once the first file is committed
    timeout(Duration::from_secs(60), async {
        loop {
            let status = engine.status(id).unwrap();
            if status.files_copied >= 1 || status.phase.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    engine.cancel(id).unwrap();
    let report = engine.wait(id).await.unwrap();

    assert!(
        matches!(report.phase, OperationPhase::Cancelled | OperationPhase::Completed),
        "{:?}",
        report.phase
    );
    let copied = list_files(&workspace.destination()).unwrap();
    assert!(!copied.is_empty());
    assert_eq!(copied.len() as u64, report.stats.files_copied);
    for relative in &copied {
        assert_eq!(
            fs::read(workspace.destination().join(relative)).unwrap(),
            fs::read(workspace.source().join(relative)).unwrap(),
            "{} differs from its source",
            relative.display()
        );
    }
    assert_no_temp_files(&workspace.destination());
}

#[tokio::test]
async fn test_timeout_cancels_operation() {
    let workspace = Workspace::new().unwrap();
    let source = write_file(&workspace.root().join("big.bin"), LARGE, TestDataPattern::Zeros).unwrap();
    let destination = workspace.root().join("out.bin");

    let report = engine()
        .execute(
            CopyRequest::new(&source, &destination)
                .with_threads(1)
                .with_buffer_size(4096)
                .with_timeout(Duration::from_millis(1)),
        )
        .await
        .unwrap();

    assert_eq!(report.phase, OperationPhase::Cancelled);
    assert_eq!(report.error_code(), ErrorCode::Timeout);
    assert!(!destination.exists());
    assert_no_temp_files(workspace.root());
}

#[tokio::test]
async fn test_concurrent_operations_share_one_engine() {
    let workspace = Workspace::new().unwrap();
    let engine = engine();

    let mut ids = Vec::new();
    for i in 0..6 {
        let source = write_file(
            &workspace.root().join(format!("in/{}.bin", i)),
            100_000 + i * 1000,
            TestDataPattern::Random,
        )
        .unwrap();
        let destination = workspace.root().join(format!("out/{}.bin", i));
        ids.push(engine.submit(CopyRequest::new(source, destination)).unwrap());
    }
    assert_eq!(engine.list_operations().len(), 6);

    for id in ids {
        let report = engine.wait(id).await.unwrap();
        assert!(report.is_success());
        // released handles go stale
        assert_eq!(engine.status(id).unwrap_err().code(), ErrorCode::InvalidArgument);
        assert_eq!(engine.wait(id).await.unwrap_err().code(), ErrorCode::InvalidArgument);
    }
    assert!(trees_equal(&workspace.root().join("in"), &workspace.root().join("out")).unwrap());
}

#[tokio::test]
async fn test_shutdown_stops_outstanding_work() {
    let workspace = Workspace::new().unwrap();
    let source = write_file(&workspace.root().join("big.bin"), LARGE, TestDataPattern::Zeros).unwrap();
    let engine = engine();

    let id = engine
        .submit(CopyRequest::new(&source, workspace.root().join("out.bin")).with_buffer_size(4096))
        .unwrap();
    engine.shutdown().await;

    assert!(engine.is_shut_down());
    assert!(engine.status(id).is_err());
    let error = engine
        .submit(CopyRequest::new(&source, workspace.root().join("again.bin")))
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidArgument);
    assert_no_temp_files(workspace.root());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_waits_for_awaited_operations() {
    let workspace = Workspace::new().unwrap();
    let source = write_file(&workspace.root().join("big.bin"), LARGE, TestDataPattern::Zeros).unwrap();
    let destination = workspace.root().join("out.bin");
    let engine = engine();

    let id = engine
        .submit(
            CopyRequest::new(&source, &destination)
                .with_threads(1)
                .with_buffer_size(4096),
        )
        .unwrap();
    // another task owns the join handle before shutdown starts
    let waiter = tokio::spawn({
        let engine = engine.clone();
        async move { engine.wait(id).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    engine.shutdown().await;
    // nothing may still be writing once shutdown returns
    assert_no_temp_files(workspace.root());
    let settled = fs::metadata(&destination).ok().map(|m| m.len());

    let report = waiter.await.unwrap().unwrap();
    match report.phase {
        OperationPhase::Cancelled => assert_eq!(settled, None),
        OperationPhase::Completed => assert_eq!(settled, Some(LARGE as u64)),
        other => panic!("unexpected phase {:?}", other),
    }
    assert_no_temp_files(workspace.root());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinks_are_skipped_with_error_record() {
    let workspace = Workspace::new().unwrap();
    TreeBuilder::new()
        .file("real.txt", 10, TestDataPattern::Text)
        .build(&workspace.source())
        .unwrap();
    std::os::unix::fs::symlink(
        workspace.source().join("real.txt"),
        workspace.source().join("link.txt"),
    )
    .unwrap();

    let engine = engine();
    let (id, events) = engine
        .submit_with_events(CopyRequest::new(workspace.source(), workspace.destination()))
        .unwrap();
    let (_, errors, _) = drain(events).await;
    let report = engine.wait(id).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.stats.files_copied, 1);
    assert_eq!(report.stats.files_skipped, 1);
    assert_eq!(report.stats.errors, 1);
    assert_eq!(errors, 1);
    assert!(!workspace.destination().join("link.txt").exists());
}

#[test]
fn test_engine_requires_runtime() {
    let error = CopyEngine::new(Config::default()).unwrap_err();
    assert_eq!(error.code(), ErrorCode::Generic);
}
