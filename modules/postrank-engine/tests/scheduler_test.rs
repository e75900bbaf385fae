//! Scoring job tests against in-memory mocks.
//!
//! Covers selection windows, caps, batching, and how a failing signal read,
//! write or evaluation is contained to the post it belongs to.
//!
//! Run with: cargo test -p postrank-engine --test scheduler_test

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use postrank_common::{Post, PostRankError, ScoringConfig, ViewRecord};
use postrank_engine::testing::{post_fixture, profile_fixture, MockPostStore, MockSignalSource};
use postrank_engine::{evaluate, Aggregator, Scorecard, ScoringJob, ScoringRunStats};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn post_aged(as_of: DateTime<Utc>, days: i64) -> Post {
    let mut post = post_fixture(Uuid::new_v4(), as_of - Duration::days(days));
    post.content = "<h2>One</h2><p>body</p><h3>Two</h3><ul><li>a</li></ul><table></table>".into();
    post.word_count = 350;
    post.has_featured_image = true;
    post
}

fn job(store: &Arc<MockPostStore>, source: MockSignalSource, config: ScoringConfig) -> ScoringJob {
    ScoringJob::new(store.clone(), store.clone(), Arc::new(source), config).unwrap()
}

fn view(viewer: Uuid, secs: u32) -> ViewRecord {
    ViewRecord {
        viewer_id: Some(viewer),
        read_duration: secs,
        read_percentage: 55.0,
        is_premium_viewer: false,
        ip_address: None,
    }
}

fn written_ids(store: &MockPostStore) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = store.writes().iter().map(|w| w.post_id).collect();
    ids.sort();
    ids
}

fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}

/// A recent post with twenty unique readers, each with an established profile.
fn read_post(as_of: DateTime<Utc>) -> (Post, MockSignalSource) {
    let mut post = post_aged(as_of, 1);
    post.counters.unique_view_count = 20;
    let viewers: Vec<Uuid> = (0..20).map(|_| Uuid::new_v4()).collect();
    let source = MockSignalSource::new()
        .on_views(post.id, viewers.iter().map(|v| view(*v, 90)).collect())
        .with_profiles(
            viewers
                .iter()
                .map(|v| profile_fixture(*v, 50.0, as_of - Duration::days(400))),
        );
    (post, source)
}

async fn scorecard(post: &Post, source: MockSignalSource, as_of: DateTime<Utc>) -> Scorecard {
    let aggregator = Aggregator::new(Arc::new(source), ScoringConfig::default());
    let signals = aggregator.gather(post, as_of).await;
    evaluate(post, &signals, as_of).unwrap()
}

fn minutes_old_posts(as_of: DateTime<Utc>, count: i64) -> Vec<Post> {
    (0..count)
        .map(|n| {
            let mut p = post_fixture(Uuid::new_v4(), as_of - Duration::minutes(n));
            p.word_count = 200;
            p
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn selects_recent_posts_and_unscored_backfill_only() {
    let as_of = Utc::now();

    let mut recent_scored = post_aged(as_of, 2);
    recent_scored.quality_score = 40.0;
    let backfill = post_aged(as_of, 10);
    let mut backfill_scored = post_aged(as_of, 10);
    backfill_scored.quality_score = 33.0;
    let too_old = post_aged(as_of, 40);
    let mut draft = post_aged(as_of, 1);
    draft.status = postrank_common::PostStatus::Draft;

    let store = Arc::new(MockPostStore::new(vec![
        recent_scored.clone(),
        backfill.clone(),
        backfill_scored.clone(),
        too_old.clone(),
        draft.clone(),
    ]));

    let stats = job(&store, MockSignalSource::new(), ScoringConfig::default())
        .run(as_of)
        .await
        .unwrap();

    assert_eq!(stats.selected_recent, 1);
    assert_eq!(stats.selected_backfill, 1);
    assert_eq!(stats.evaluated, 2);
    assert_eq!(stats.written, 2);
    assert_eq!(written_ids(&store), sorted(vec![recent_scored.id, backfill.id]));

    // Untouched rows keep their previous scores.
    assert_eq!(store.post(backfill_scored.id).unwrap().quality_score, 33.0);
    assert_eq!(store.post(too_old.id).unwrap().quality_score, 0.0);
    assert_eq!(store.post(draft.id).unwrap().quality_score, 0.0);
}

#[tokio::test]
async fn recent_posts_are_rescored_even_when_already_scored() {
    let as_of = Utc::now();
    let mut post = post_aged(as_of, 1);
    post.quality_score = 99.0;
    post.spam_score = 99.0;
    let store = Arc::new(MockPostStore::new(vec![post.clone()]));

    job(&store, MockSignalSource::new(), ScoringConfig::default())
        .run(as_of)
        .await
        .unwrap();

    let rescored = store.post(post.id).unwrap();
    assert!(rescored.quality_score < 99.0);
    assert_eq!(rescored.spam_score, 0.0);
}

#[tokio::test]
async fn backfill_only_fills_headroom_left_by_recent_posts() {
    let as_of = Utc::now();
    let mut posts: Vec<Post> = (0..5).map(|d| post_aged(as_of, d)).collect();
    posts.extend((10..13).map(|d| post_aged(as_of, d)));
    let store = Arc::new(MockPostStore::new(posts));

    let config = ScoringConfig {
        recent_cap: 3,
        total_cap: 4,
        ..ScoringConfig::default()
    };
    let stats = job(&store, MockSignalSource::new(), config)
        .run(as_of)
        .await
        .unwrap();

    assert_eq!(stats.selected_recent, 3);
    assert_eq!(stats.selected_backfill, 1);
    assert_eq!(stats.written, 4);
}

#[tokio::test]
async fn no_backfill_when_recent_fills_the_total_cap() {
    let as_of = Utc::now();
    let mut posts: Vec<Post> = (0..4).map(|d| post_aged(as_of, d)).collect();
    posts.push(post_aged(as_of, 15));
    let store = Arc::new(MockPostStore::new(posts));

    let config = ScoringConfig {
        recent_cap: 4,
        total_cap: 4,
        ..ScoringConfig::default()
    };
    let stats = job(&store, MockSignalSource::new(), config)
        .run(as_of)
        .await
        .unwrap();

    assert_eq!(stats.selected_recent, 4);
    assert_eq!(stats.selected_backfill, 0);
}

#[tokio::test]
async fn selection_failure_aborts_the_run() {
    let as_of = Utc::now();
    let broken = MockPostStore::new(vec![post_aged(as_of, 1)]).failing_selection();
    let store = Arc::new(broken);

    let result = job(&store, MockSignalSource::new(), ScoringConfig::default())
        .run(as_of)
        .await;

    assert!(result.is_err());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn hung_selection_times_out_and_aborts_the_run() {
    let as_of = Utc::now();
    let stalled = MockPostStore::new(vec![post_aged(as_of, 1)]);
    let store = Arc::new(stalled.slow_selection(StdDuration::from_secs(60)));
    let config = ScoringConfig {
        select_timeout: StdDuration::from_millis(50),
        ..ScoringConfig::default()
    };

    let job = job(&store, MockSignalSource::new(), config);
    let run = job.run(as_of);
    let result = tokio::time::timeout(StdDuration::from_secs(2), run)
        .await
        .expect("run should give up on selection");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn empty_selection_is_a_clean_no_op() {
    let store = Arc::new(MockPostStore::new(vec![]));
    let stats = job(&store, MockSignalSource::new(), ScoringConfig::default())
        .run(Utc::now())
        .await
        .unwrap();
    assert_eq!(stats, ScoringRunStats::default());
}

// ---------------------------------------------------------------------------
// Signal gathering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_signal_reads_degrade_to_empty_values() {
    let as_of = Utc::now();
    let (post, source) = read_post(as_of);
    let store = Arc::new(MockPostStore::new(vec![post.clone()]));

    let source = source.failing("views").failing("profiles");
    let stats = job(&store, source, ScoringConfig::default())
        .run(as_of)
        .await
        .unwrap();

    assert_eq!(stats.evaluated, 1);
    assert_eq!(stats.evaluation_failed, 0);
    assert_eq!(stats.written, 1);
}

#[tokio::test]
async fn failed_view_read_zeroes_read_quality() {
    let as_of = Utc::now();

    let (post, source) = read_post(as_of);
    let healthy = scorecard(&post, source, as_of).await;
    assert!(healthy.quality.read_quality > 0.0);

    let (post, source) = read_post(as_of);
    let card = scorecard(&post, source.failing("views"), as_of).await;

    assert_eq!(card.inputs.avg_read_duration, 0.0);
    assert_eq!(card.inputs.avg_read_percentage, 0.0);
    assert_eq!(card.inputs.qualified_read_count, 0);
    assert_eq!(card.quality.read_quality, 0.0);
}

#[tokio::test]
async fn failed_profile_batch_zeroes_visitor_aggregates() {
    let as_of = Utc::now();

    let (post, source) = read_post(as_of);
    let healthy = scorecard(&post, source, as_of).await;
    assert_eq!(healthy.inputs.visitor_avg_profile_score, 50.0);
    assert!(healthy.inputs.visitor_avg_account_age_days > 0.0);

    let (post, source) = read_post(as_of);
    let card = scorecard(&post, source.failing("profiles"), as_of).await;

    assert_eq!(card.inputs.visitor_avg_profile_score, 0.0);
    assert_eq!(card.inputs.visitor_avg_account_age_days, 0.0);
    assert_eq!(card.inputs.visitor_active_ratio, 0.0);
    assert_eq!(card.inputs.visitor_new_account_ratio, 0.0);
    assert_eq!(card.quality.visitor_quality, 0.0);
    // Reads are unaffected.
    assert!(card.quality.read_quality > 0.0);
}

#[tokio::test]
async fn slow_signal_reads_time_out_without_stalling_the_run() {
    let as_of = Utc::now();
    let post = post_aged(as_of, 1);
    let store = Arc::new(MockPostStore::new(vec![post.clone()]));

    let source = MockSignalSource::new()
        .on_likers(post.id, vec![Uuid::new_v4(); 3])
        .slow("likers", StdDuration::from_secs(5));
    let config = ScoringConfig {
        read_timeout: StdDuration::from_millis(50),
        ..ScoringConfig::default()
    };

    let started = std::time::Instant::now();
    let stats = job(&store, source, config).run(as_of).await.unwrap();

    assert!(started.elapsed() < StdDuration::from_secs(2));
    assert_eq!(stats.written, 1);
}

#[tokio::test]
async fn viewer_profiles_are_fetched_in_one_batch_per_post() {
    let as_of = Utc::now();
    let post = post_aged(as_of, 1);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let store = Arc::new(MockPostStore::new(vec![post.clone()]));

    let source = Arc::new(
        MockSignalSource::new()
            .on_views(
                post.id,
                vec![view(a, 40), view(b, 40), view(a, 90), view(post.author_id, 300)],
            )
            .with_profiles([
                profile_fixture(a, 60.0, as_of - Duration::days(500)),
                profile_fixture(b, 40.0, as_of - Duration::days(200)),
            ]),
    );

    ScoringJob::new(store.clone(), store.clone(), source.clone(), ScoringConfig::default())
        .unwrap()
        .run(as_of)
        .await
        .unwrap();

    assert_eq!(source.profile_batches(), vec![2]);
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn a_failed_write_does_not_block_the_rest_of_the_batch() {
    let as_of = Utc::now();
    let posts: Vec<Post> = (0..3).map(|d| post_aged(as_of, d)).collect();
    let bad = posts[1].id;
    let store = Arc::new(MockPostStore::new(posts.clone()).failing_write(bad));

    let stats = job(&store, MockSignalSource::new(), ScoringConfig::default())
        .run(as_of)
        .await
        .unwrap();

    assert_eq!(stats.evaluated, 3);
    assert_eq!(stats.written, 2);
    assert_eq!(stats.write_failed, 1);
    assert_eq!(
        written_ids(&store),
        sorted(vec![posts[0].id, posts[2].id])
    );
}

#[tokio::test]
async fn a_hung_write_times_out_and_the_run_completes() {
    let as_of = Utc::now();
    let posts: Vec<Post> = (0..3).map(|d| post_aged(as_of, d)).collect();
    let stuck = posts[1].id;
    let store = Arc::new(MockPostStore::new(posts.clone()).hanging_write(stuck));
    let config = ScoringConfig {
        write_timeout: StdDuration::from_millis(50),
        ..ScoringConfig::default()
    };

    let job = job(&store, MockSignalSource::new(), config);
    let run = job.run(as_of);
    let stats = tokio::time::timeout(StdDuration::from_secs(2), run)
        .await
        .expect("run should not wait on a hung write")
        .unwrap();

    assert_eq!(stats.evaluated, 3);
    assert_eq!(stats.written, 2);
    assert_eq!(stats.write_failed, 1);
    assert_eq!(written_ids(&store), sorted(vec![posts[0].id, posts[2].id]));
}

#[tokio::test]
async fn a_panicking_post_is_skipped_and_the_batch_completes() {
    let as_of = Utc::now();
    let posts: Vec<Post> = (0..3).map(|d| post_aged(as_of, d)).collect();
    let bad = posts[0].id;
    let store = Arc::new(MockPostStore::new(posts.clone()));

    let stats = job(
        &store,
        MockSignalSource::new().panicking_on(bad),
        ScoringConfig::default(),
    )
    .run(as_of)
    .await
    .unwrap();

    assert_eq!(stats.evaluated, 2);
    assert_eq!(stats.evaluation_failed, 1);
    assert_eq!(written_ids(&store), sorted(vec![posts[1].id, posts[2].id]));
}

// ---------------------------------------------------------------------------
// Batching and re-runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn evaluation_never_has_more_than_one_batch_in_flight() {
    let as_of = Utc::now();
    let store = Arc::new(MockPostStore::new(minutes_old_posts(as_of, 120)));
    let tag_delay = StdDuration::from_millis(20);
    let source = Arc::new(MockSignalSource::new().slow("tag_count", tag_delay));

    let config = ScoringConfig {
        scoring_batch_size: 50,
        ..ScoringConfig::default()
    };
    let stats = ScoringJob::new(store.clone(), store.clone(), source.clone(), config)
        .unwrap()
        .run(as_of)
        .await
        .unwrap();

    assert_eq!(stats.selected_recent, 120);
    assert_eq!(stats.evaluated, 120);
    assert_eq!(stats.written, 120);
    // Every post reads its tag count once, so concurrent tag reads are
    // concurrent posts. A full batch runs at once and never overlaps the next.
    assert_eq!(source.peak_concurrency("tag_count"), 50);
}

#[tokio::test]
async fn writes_are_issued_one_batch_at_a_time() {
    let as_of = Utc::now();
    let posts = MockPostStore::new(minutes_old_posts(as_of, 120));
    let store = Arc::new(posts.slow_writes(StdDuration::from_millis(10)));

    let config = ScoringConfig {
        write_batch_size: 40,
        ..ScoringConfig::default()
    };
    let stats = job(&store, MockSignalSource::new(), config)
        .run(as_of)
        .await
        .unwrap();

    assert_eq!(stats.written, 120);
    assert_eq!(store.writes().len(), 120);
    assert_eq!(store.peak_concurrent_writes(), 40);
}

#[test]
fn invalid_config_is_rejected_when_building_the_job() {
    let store = Arc::new(MockPostStore::new(vec![]));
    let config = ScoringConfig {
        scoring_batch_size: 0,
        ..ScoringConfig::default()
    };

    let result = ScoringJob::new(
        store.clone(),
        store,
        Arc::new(MockSignalSource::new()),
        config,
    );

    assert!(matches!(result, Err(PostRankError::Config(_))));
}

#[tokio::test]
async fn rerunning_with_the_same_snapshot_writes_the_same_scores() {
    let as_of = Utc::now();
    let posts: Vec<Post> = (0..4).map(|d| post_aged(as_of, d)).collect();
    let store = Arc::new(MockPostStore::new(posts));
    let job = job(&store, MockSignalSource::new(), ScoringConfig::default());

    let first = job.run(as_of).await.unwrap();
    let mut first_writes = store.writes();
    let second = job.run(as_of).await.unwrap();
    let mut second_writes = store.writes().split_off(first_writes.len());

    first_writes.sort_by_key(|w| w.post_id);
    second_writes.sort_by_key(|w| w.post_id);

    assert_eq!(first, second);
    assert_eq!(first_writes, second_writes);
}

#[test]
fn run_stats_display_on_one_line() {
    let stats = ScoringRunStats {
        selected_recent: 3,
        written: 2,
        write_failed: 1,
        ..ScoringRunStats::default()
    };
    let line = stats.to_string();
    assert!(!line.contains('\n'));
    assert!(line.contains("selected_recent=3"));
    assert!(line.contains("write_failed=1"));

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["written"], 2);
}
