//! Integration tests for PgScoringStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.
//!
//! Tests share one database and may run concurrently, so each test works on
//! its own post ids and, for selection, its own time window.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use postrank_common::{ScoreResult, ScoringConfig};
use postrank_engine::{PostStore, ScoreWriter, ScoringJob, SignalSource};
use postrank_store::{PgScoringStore, SCHEMA};

/// Get a test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    sqlx::raw_sql(SCHEMA).execute(&pool).await.ok()?;
    Some(pool)
}

/// A fixed instant per test so selection windows never overlap.
fn anchor(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 6, 1, 12, 0, 0).unwrap()
}

async fn clear_window(pool: &PgPool, as_of: DateTime<Utc>) {
    sqlx::query("DELETE FROM posts WHERE published_at BETWEEN $1 AND $2")
        .bind(as_of - Duration::days(60))
        .bind(as_of)
        .execute(pool)
        .await
        .unwrap();
}

async fn insert_post(
    pool: &PgPool,
    author_id: Uuid,
    status: &str,
    published_at: DateTime<Utc>,
    quality_score: f64,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO posts (id, author_id, content, word_count, status, featured_image,
                           source_links, like_count, unique_view_count, published_at, quality_score)
        VALUES ($1, $2, '<h2>a</h2><h2>b</h2><ul><li>x</li></ul>', 320, $3, 'cover.png',
                ARRAY['https://source.example'], 6, 40, $4, $5)
        "#,
    )
    .bind(id)
    .bind(author_id)
    .bind(status)
    .bind(published_at)
    .bind(quality_score)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn insert_profile(pool: &PgPool, user_id: Uuid, score: f64, created_at: DateTime<Utc>) {
    sqlx::query(
        r#"
        INSERT INTO profiles (
            user_id, profile_score, trust_level, is_verified, spam_score,
            created_at, last_active_at
        )
        VALUES ($1, $2, 3, TRUE, 0, $3, $3)
        "#,
    )
    .bind(user_id)
    .bind(score)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
}

// =========================================================================
// Selection
// =========================================================================

#[tokio::test]
async fn published_between_is_inclusive_and_newest_first() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let as_of = anchor(2011);
    clear_window(&pool, as_of).await;
    let store = PgScoringStore::new(pool.clone());
    let author = Uuid::new_v4();

    let edge = insert_post(&pool, author, "published", as_of - Duration::days(7), 10.0).await;
    let newest = insert_post(&pool, author, "published", as_of, 0.0).await;
    let middle = insert_post(&pool, author, "published", as_of - Duration::days(3), 0.0).await;
    insert_post(&pool, author, "draft", as_of - Duration::days(1), 0.0).await;
    insert_post(&pool, author, "published", as_of - Duration::days(8), 0.0).await;

    let posts = store
        .published_between(as_of - Duration::days(7), as_of, 10)
        .await
        .unwrap();
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![newest, middle, edge]);

    let limited = store
        .published_between(as_of - Duration::days(7), as_of, 2)
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn unscored_between_excludes_scored_posts_and_the_upper_bound() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let as_of = anchor(2012);
    clear_window(&pool, as_of).await;
    let store = PgScoringStore::new(pool.clone());
    let author = Uuid::new_v4();
    let recent_from = as_of - Duration::days(7);

    let unscored = insert_post(&pool, author, "published", as_of - Duration::days(12), 0.0).await;
    insert_post(&pool, author, "published", as_of - Duration::days(12), 41.5).await;
    insert_post(&pool, author, "published", recent_from, 0.0).await;
    insert_post(&pool, author, "published", as_of - Duration::days(31), 0.0).await;

    let posts = store
        .unscored_between(as_of - Duration::days(30), recent_from, 10)
        .await
        .unwrap();
    assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![unscored]);

    let post = &posts[0];
    assert!(post.has_featured_image);
    assert_eq!(post.word_count, 320);
    assert_eq!(post.counters.unique_view_count, 40);
    assert_eq!(post.source_links, vec!["https://source.example".to_string()]);
}

// =========================================================================
// Signals
// =========================================================================

#[tokio::test]
async fn signal_reads_are_post_scoped_and_bounded() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgScoringStore::new(pool.clone());
    let author = Uuid::new_v4();
    let post = insert_post(&pool, author, "published", Utc::now(), 0.0).await;
    let other = insert_post(&pool, author, "published", Utc::now(), 0.0).await;
    let viewer = Uuid::new_v4();

    for _ in 0..3 {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2)")
            .bind(post)
            .bind(Uuid::new_v4())
            .execute(&pool)
            .await
            .unwrap();
    }
    for secs in [5, 45, 90] {
        sqlx::query(
            "INSERT INTO post_views \
             (post_id, viewer_id, read_duration, read_percentage, ip_address) \
             VALUES ($1, $2, $3, 60, '10.0.0.1')",
        )
        .bind(post)
        .bind(viewer)
        .bind(secs)
        .execute(&pool)
        .await
        .unwrap();
    }
    sqlx::query("INSERT INTO post_views (post_id, read_duration) VALUES ($1, 30)")
        .bind(other)
        .execute(&pool)
        .await
        .unwrap();
    for status in ["approved", "pending"] {
        sqlx::query(
            "INSERT INTO comments (post_id, author_id, content, status) \
             VALUES ($1, $2, 'nice read', $3)",
        )
        .bind(post)
        .bind(viewer)
        .bind(status)
        .execute(&pool)
        .await
        .unwrap();
    }
    sqlx::query(
        "INSERT INTO reports (content_type, content_id) VALUES ('post', $1), ('comment', $1)",
    )
    .bind(post)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO gifts (post_id, sender_id) VALUES ($1, $2), ($1, $2)")
        .bind(post)
        .bind(viewer)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2)")
        .bind(post)
        .bind(viewer)
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(store.tag_count(post).await.unwrap(), 3);
    assert_eq!(store.views(post, 500).await.unwrap().len(), 3);
    assert_eq!(store.views(post, 2).await.unwrap().len(), 2);
    assert_eq!(store.approved_comments(post, 500).await.unwrap().len(), 1);
    assert_eq!(store.report_count(post).await.unwrap(), 1);
    assert_eq!(store.gifts(post).await.unwrap().len(), 2);
    assert_eq!(store.likers(post, 500).await.unwrap(), vec![viewer]);
    assert!(store.savers(post, 500).await.unwrap().is_empty());
    assert!(store.moderation_log(post, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn profiles_load_singly_and_in_batches() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgScoringStore::new(pool.clone());
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let created = Utc::now() - Duration::days(400);
    insert_profile(&pool, a, 72.0, created).await;
    insert_profile(&pool, b, 18.0, created).await;

    let single = store.profile(a).await.unwrap().unwrap();
    assert_eq!(single.profile_score, 72.0);
    assert_eq!(single.trust_level, 3);
    assert!(single.is_verified);

    assert!(store.profile(Uuid::new_v4()).await.unwrap().is_none());

    let batch = store.profiles(&[a, b, Uuid::new_v4()]).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(store.profiles(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn author_history_keeps_prior_scored_posts_only() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgScoringStore::new(pool.clone());
    let author = Uuid::new_v4();
    let now = Utc::now();

    let current = insert_post(&pool, author, "published", now, 0.0).await;
    let older = insert_post(&pool, author, "published", now - Duration::days(20), 55.0).await;
    let newer = insert_post(&pool, author, "published", now - Duration::days(2), 35.0).await;
    insert_post(&pool, author, "published", now - Duration::days(3), 0.0).await;
    insert_post(&pool, author, "archived", now - Duration::days(4), 80.0).await;

    let history = store.author_history(author, current, now, 20).await.unwrap();
    let ids: Vec<Uuid> = history.iter().map(|h| h.id).collect();
    assert_eq!(ids, vec![newer, older]);

    let capped = store.author_history(author, current, now, 1).await.unwrap();
    assert_eq!(capped.len(), 1);
}

// =========================================================================
// Write-back
// =========================================================================

#[tokio::test]
async fn write_score_overwrites_both_fields() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgScoringStore::new(pool.clone());
    let post = insert_post(&pool, Uuid::new_v4(), "published", Utc::now(), 12.0).await;

    let result = ScoreResult {
        post_id: post,
        quality_score: 64.25,
        spam_score: 7.5,
    };
    store.write_score(&result).await.unwrap();

    let (quality, spam): (f64, f64) =
        sqlx::query_as("SELECT quality_score, spam_score FROM posts WHERE id = $1")
            .bind(post)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(quality, 64.25);
    assert_eq!(spam, 7.5);
}

#[tokio::test]
async fn write_score_for_missing_post_fails() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgScoringStore::new(pool);
    let orphan = ScoreResult {
        post_id: Uuid::new_v4(),
        quality_score: 1.0,
        spam_score: 1.0,
    };
    assert!(store.write_score(&orphan).await.is_err());
}

// =========================================================================
// Full pass
// =========================================================================

#[tokio::test]
async fn scoring_job_runs_end_to_end_against_postgres() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let as_of = anchor(2013);
    clear_window(&pool, as_of).await;
    let store = std::sync::Arc::new(PgScoringStore::new(pool.clone()));
    let author = Uuid::new_v4();
    insert_profile(&pool, author, 82.0, as_of - Duration::days(900)).await;

    let recent = insert_post(&pool, author, "published", as_of - Duration::days(1), 0.0).await;
    let backfill = insert_post(&pool, author, "published", as_of - Duration::days(14), 0.0).await;

    let job = ScoringJob::new(store.clone(), store.clone(), store, ScoringConfig::default())
        .unwrap();
    let stats = job.run(as_of).await.unwrap();

    assert_eq!(stats.selected_recent, 1);
    assert_eq!(stats.selected_backfill, 1);
    assert_eq!(stats.written, 2);

    for id in [recent, backfill] {
        let quality: f64 = sqlx::query_scalar("SELECT quality_score FROM posts WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(quality > 0.0, "post {id} was not scored");
    }
}
