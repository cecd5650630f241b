mod common;

use std::sync::Arc;
use std::time::Duration;

use codescope_core::domain::analysis::{AnalysisStatus, CodebaseStatus};
use codescope_orchestrator::{AnalysisDispatcher, NoOpProgressSink};

use common::{Harness, MockAcquirer, MockRepo, PathReviewer, ts_file};

fn harness() -> Harness {
    Harness::new(
        MockAcquirer::new()
            .with_repo("alpha", MockRepo::Files(vec![ts_file("a/auth.ts")]))
            .with_repo("beta", MockRepo::Files(vec![ts_file("b/util.ts")])),
        Arc::new(PathReviewer::new()),
    )
}

fn dispatcher(harness: &Harness, concurrency: usize) -> AnalysisDispatcher {
    AnalysisDispatcher::new(
        harness.orchestrator.clone(),
        harness.analyses.clone(),
        Arc::new(NoOpProgressSink),
        concurrency,
    )
}

async fn wait_idle(dispatcher: &AnalysisDispatcher) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while dispatcher.in_flight().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("dispatcher did not go idle");
}

#[tokio::test]
async fn test_dispatch_runs_analysis_once() {
    let harness = harness();
    let codebase = harness.codebase("platform").await;
    harness.repository(&codebase, "alpha").await;
    let analysis = harness.analysis(&codebase).await;
    let dispatcher = dispatcher(&harness, 1);

    let handle = dispatcher.dispatch(analysis.id).await.unwrap();
    assert!(dispatcher.dispatch(analysis.id).await.is_none());
    handle.await.unwrap();

    assert_eq!(
        harness.reload_analysis(&analysis).await.status,
        AnalysisStatus::Completed
    );
    assert_eq!(dispatcher.in_flight().await, 0);
}

#[tokio::test]
async fn test_poll_once_picks_up_queued_analyses() {
    let harness = harness();
    let first = harness.codebase("platform").await;
    harness.repository(&first, "alpha").await;
    let second = harness.codebase("payments").await;
    harness.repository(&second, "beta").await;
    let a = harness.analysis(&first).await;
    let b = harness.analysis(&second).await;
    let dispatcher = dispatcher(&harness, 2);

    dispatcher.poll_once().await;
    wait_idle(&dispatcher).await;

    for analysis in [&a, &b] {
        assert_eq!(
            harness.reload_analysis(analysis).await.status,
            AnalysisStatus::Completed
        );
    }

    // Nothing is queued any more.
    dispatcher.poll_once().await;
    assert_eq!(dispatcher.in_flight().await, 0);
}

#[tokio::test]
async fn test_queue_poller_stops_on_shutdown() {
    let harness = harness();
    let codebase = harness.codebase("platform").await;
    harness.repository(&codebase, "alpha").await;
    let analysis = harness.analysis(&codebase).await;
    let dispatcher = dispatcher(&harness, 1);
    let shutdown = tokio_util::sync::CancellationToken::new();

    let poller = dispatcher.spawn_queue_poller(Duration::from_millis(10), shutdown.clone());
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if harness.reload_analysis(&analysis).await.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown.cancel();
    poller.await.unwrap();
    wait_idle(&dispatcher).await;
    dispatcher.drain().await;

    assert_eq!(
        harness.reload_analysis(&analysis).await.status,
        AnalysisStatus::Completed
    );
}

#[tokio::test]
async fn test_startup_recovery_settles_interrupted_runs() {
    let harness = harness();
    let codebase = harness.codebase("platform").await;
    harness.repository(&codebase, "alpha").await;
    let stranded = harness.stranded(&codebase).await;
    let queued = harness.analysis(&codebase).await;
    let dispatcher = dispatcher(&harness, 1);

    dispatcher.recover_interrupted().await;

    let stranded = harness.reload_analysis(&stranded).await;
    assert_eq!(stranded.status, AnalysisStatus::Failed);
    assert!(stranded.error_message.unwrap().contains("interrupted"));
    assert_eq!(
        harness.reload_codebase(&codebase).await.status,
        CodebaseStatus::Ready
    );
    assert_eq!(
        harness.reload_analysis(&queued).await.status,
        AnalysisStatus::Queued
    );

    dispatcher.poll_once().await;
    wait_idle(&dispatcher).await;
    assert_eq!(
        harness.reload_analysis(&queued).await.status,
        AnalysisStatus::Completed
    );
}
