use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use sampler_core::{
    Branch, BucketPredicate, PredicateError, SampleFilter, SearchError, SearchPhase, SearchSlot,
    SearchStatus, TokenDeriver,
};
use sampler_test_utils::{
    accept_all, global_v2_filter, init_tracing, reject_all, reject_containing, searcher,
    three_branches, CountingPredicate, FailingPredicate, HashBucketPredicate, PendingPredicate,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn full_range(total: i64) -> Option<SampleFilter> {
    Some(SampleFilter::bucket(["normandy.userId"], 0, total, total))
}

#[derive(Default)]
struct RangeRecorder {
    ranges: Mutex<Vec<(u64, u64, u64)>>,
}

#[async_trait]
impl BucketPredicate for RangeRecorder {
    async fn is_in_bucket(
        &self,
        _inputs: &[String],
        start: u64,
        count: u64,
        total: u64,
    ) -> Result<bool, PredicateError> {
        self.ranges.lock().unwrap().push((start, count, total));
        Ok(true)
    }
}

#[tokio::test]
async fn unresolvable_branch_does_not_block_later_branches() {
    init_tracing();
    let counting = Arc::new(CountingPredicate::new(reject_containing("-beta")));
    let stream = searcher(counting.clone()).stream_branch_identifiers(full_range(30), three_branches());

    let snapshots: Vec<_> = stream.collect().await;
    assert_eq!(snapshots.len(), 3);

    assert_eq!(snapshots[0].status, SearchStatus::Searching);
    assert_eq!(snapshots[0].resolved_count(), 0);

    assert_eq!(snapshots[1].identifier("alpha"), Some("test-userId-0-alpha"));
    assert_eq!(snapshots[1].identifier("gamma"), None);

    let last = &snapshots[2];
    assert_eq!(
        last.status,
        SearchStatus::Failed(SearchError::NoMatchingIdentifier { trials: 30 })
    );
    assert_eq!(last.identifier("alpha"), Some("test-userId-0-alpha"));
    assert_eq!(last.identifier("beta"), None);
    assert_eq!(last.identifier("gamma"), Some("test-userId-0-gamma"));

    // base + alpha + 30 beta trials + gamma
    assert_eq!(counting.calls(), 33);
}

#[tokio::test]
async fn snapshots_keep_branch_order() {
    let stream = searcher(Arc::new(accept_all())).stream_branch_identifiers(
        full_range(10),
        vec![Branch::new("zeta", 1.0), Branch::new("alpha", 1.0)],
    );

    let last = stream.last().await.unwrap();
    let slugs: Vec<&str> = last.branches.keys().map(String::as_str).collect();
    assert_eq!(slugs, vec!["zeta", "alpha"]);
    assert_eq!(last.status.phase(), SearchPhase::Resolved);
}

#[tokio::test]
async fn branches_search_their_own_sub_ranges() {
    let recorder = Arc::new(RangeRecorder::default());
    let filter = SampleFilter::bucket(["normandy.userId"], 100, 90, 1000);

    let last = searcher(recorder.clone())
        .stream_branch_identifiers(Some(filter), three_branches())
        .last()
        .await
        .unwrap();
    assert_eq!(last.status, SearchStatus::Resolved);

    let ranges = recorder.ranges.lock().unwrap().clone();
    assert_eq!(
        ranges,
        vec![(100, 90, 1000), (100, 30, 1000), (130, 30, 1000), (160, 30, 1000)]
    );
}

#[tokio::test]
async fn branch_mapping_is_deterministic_and_distinct() {
    let run = || async {
        searcher(Arc::new(HashBucketPredicate))
            .stream_branch_identifiers(Some(global_v2_filter()), three_branches())
            .last()
            .await
            .unwrap()
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first, second);

    let resolved: Vec<&String> = first.branches.values().flatten().collect();
    let distinct: HashSet<&String> = resolved.iter().copied().collect();
    assert_eq!(resolved.len(), distinct.len());
}

#[tokio::test]
async fn custom_deriver_roots_branch_tokens() {
    let deriver: Arc<dyn TokenDeriver> = Arc::new(|base: &str| format!("{base}-exp"));
    let last = searcher(Arc::new(accept_all()))
        .stream_with_deriver(full_range(10), vec![Branch::new("control", 1.0)], deriver)
        .last()
        .await
        .unwrap();

    assert_eq!(last.identifier("control"), Some("test-userId-0-exp-control"));
}

#[tokio::test]
async fn cancel_between_branches_stops_search() {
    let counting = Arc::new(CountingPredicate::new(accept_all()));
    let mut stream =
        searcher(counting.clone()).stream_branch_identifiers(full_range(30), three_branches());

    let initial = stream.next().await.unwrap();
    assert_eq!(initial.resolved_count(), 0);
    let after_alpha = stream.next().await.unwrap();
    assert_eq!(after_alpha.resolved_count(), 1);
    let calls = counting.calls();
    assert_eq!(calls, 2);

    stream.cancel();
    assert!(stream.next().await.is_none());
    assert!(stream.next().await.is_none());
    assert_eq!(counting.calls(), calls);
}

#[tokio::test]
async fn cancel_during_predicate_call_emits_nothing_further() {
    let counting = Arc::new(CountingPredicate::new(reject_all()));
    let stream = searcher(counting.clone()).stream_branch_identifiers(
        Some(SampleFilter::bucket(["normandy.userId"], 0, 1, 100)),
        three_branches(),
    );
    counting.cancel_on_call(5, stream.cancel_handle());

    let snapshots: Vec<_> = stream.collect().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].status, SearchStatus::Searching);
    assert_eq!(counting.calls(), 5);
}

#[tokio::test]
async fn cancel_interrupts_pending_predicate() {
    let stream = searcher(Arc::new(PendingPredicate))
        .stream_branch_identifiers(Some(global_v2_filter()), three_branches());
    let handle = stream.cancel_handle();

    let task = tokio::spawn(stream.collect::<Vec<_>>());
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    let snapshots = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("cancelled stream should finish")
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].status, SearchStatus::Searching);
}

#[tokio::test]
async fn predicate_error_terminates_stream() {
    let last = searcher(Arc::new(FailingPredicate::new("boom")))
        .stream_branch_identifiers(Some(global_v2_filter()), three_branches())
        .last()
        .await
        .unwrap();

    assert_eq!(
        last.status,
        SearchStatus::Failed(SearchError::Predicate(PredicateError::new("boom")))
    );
    assert_eq!(last.resolved_count(), 0);
}

#[tokio::test]
async fn invalid_filter_fails_without_trials() {
    let counting = Arc::new(CountingPredicate::new(accept_all()));
    let snapshots: Vec<_> = searcher(counting.clone())
        .stream_branch_identifiers(
            Some(SampleFilter::bucket(["foo"], 0, 1, 10)),
            three_branches(),
        )
        .collect()
        .await;

    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].status.error().is_some_and(SearchError::is_validation));
    assert_eq!(counting.calls(), 0);
}

#[tokio::test]
async fn slot_supersedes_previous_search() {
    let counting = Arc::new(CountingPredicate::new(reject_all()));
    let mut slot = SearchSlot::new(searcher(counting.clone()));

    let mut first = slot.start(full_range(10), three_branches());
    let initial = first.next().await.unwrap();
    assert_eq!(initial.generation, 1);
    assert_eq!(counting.calls(), 0);

    let second = slot.start(full_range(10), three_branches());
    assert!(first.next().await.is_none());
    assert_eq!(counting.calls(), 0);

    let snapshots: Vec<_> = second.collect().await;
    assert!(snapshots.iter().all(|s| s.generation == 2));
    assert_eq!(
        snapshots.last().unwrap().status,
        SearchStatus::Failed(SearchError::NoMatchingIdentifier { trials: 10 })
    );
    assert_eq!(counting.calls(), 10);
}
