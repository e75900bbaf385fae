//! PgScoringStore: the scoring job's view of Postgres.
//!
//! One pool serves post selection, every bounded signal read and the
//! per-post score write. All reads are scoped to a single post or user and
//! carry a LIMIT; the only write touches two columns of one row.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use postrank_common::{
    AuthorPostSummary, CommentRecord, GiftRecord, ModerationEntry, Post, PostStatus, Profile,
    ScoreResult, ViewRecord,
};
use postrank_engine::{PostStore, ScoreWriter, SignalSource};

use crate::rows::{CommentRow, HistoryRow, ModerationRow, PostRow, ProfileRow, ViewRow};

const POST_COLUMNS: &str = "id, author_id, content, word_count, status, is_nsfw, for_kids, \
     featured_image, source_links, like_count, comment_count, save_count, share_count, \
     view_count, unique_view_count, premium_view_count, coins_earned, allow_comments, \
     published_at, quality_score, spam_score";

const PROFILE_COLUMNS: &str =
    "user_id, profile_score, trust_level, is_verified, spam_score, created_at, last_active_at";

#[derive(Clone)]
pub struct PgScoringStore {
    pool: PgPool,
}

impl PgScoringStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_posts(
        &self,
        sql: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(sql)
            .bind(PostStatus::Published.as_str())
            .bind(from)
            .bind(to)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Post::try_from).collect()
    }

    async fn user_ids(&self, sql: &str, post_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(sql)
            .bind(post_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

fn to_count(n: i64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[async_trait]
impl PostStore for PgScoringStore {
    async fn published_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE status = $1
              AND published_at >= $2
              AND published_at <= $3
            ORDER BY published_at DESC
            LIMIT $4
            "#
        );
        let posts = self.fetch_posts(&sql, from, to, limit).await?;
        debug!(count = posts.len(), "Selected recent posts");
        Ok(posts)
    }

    async fn unscored_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE status = $1
              AND quality_score = 0
              AND published_at >= $2
              AND published_at < $3
            ORDER BY published_at DESC
            LIMIT $4
            "#
        );
        let posts = self.fetch_posts(&sql, from, to, limit).await?;
        debug!(count = posts.len(), "Selected unscored backfill posts");
        Ok(posts)
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[async_trait]
impl SignalSource for PgScoringStore {
    async fn tag_count(&self, post_id: Uuid) -> Result<u32> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(to_count(n))
    }

    async fn views(&self, post_id: Uuid, limit: usize) -> Result<Vec<ViewRecord>> {
        let rows = sqlx::query_as::<_, ViewRow>(
            r#"
            SELECT viewer_id, read_duration, read_percentage, is_premium_viewer, ip_address
            FROM post_views
            WHERE post_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(post_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ViewRecord::from).collect())
    }

    async fn approved_comments(&self, post_id: Uuid, limit: usize) -> Result<Vec<CommentRecord>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT author_id, parent_id, content
            FROM comments
            WHERE post_id = $1 AND status = 'approved'
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(post_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn gifts(&self, post_id: Uuid) -> Result<Vec<GiftRecord>> {
        let sql = "SELECT sender_id FROM gifts WHERE post_id = $1";
        let senders = sqlx::query_scalar::<_, Uuid>(sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(senders
            .into_iter()
            .map(|sender_id| GiftRecord { sender_id })
            .collect())
    }

    async fn report_count(&self, post_id: Uuid) -> Result<u32> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reports WHERE content_type = 'post' AND content_id = $1",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(to_count(n))
    }

    async fn moderation_log(&self, post_id: Uuid, limit: usize) -> Result<Vec<ModerationEntry>> {
        let rows = sqlx::query_as::<_, ModerationRow>(
            r#"
            SELECT action, created_at
            FROM moderation_logs
            WHERE post_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(post_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ModerationEntry::from).collect())
    }

    async fn likers(&self, post_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        self.user_ids(
            "SELECT user_id FROM post_likes WHERE post_id = $1 ORDER BY created_at DESC LIMIT $2",
            post_id,
            limit,
        )
        .await
    }

    async fn savers(&self, post_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        self.user_ids(
            "SELECT user_id FROM post_bookmarks WHERE post_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
            post_id,
            limit,
        )
        .await
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Profile::from))
    }

    async fn author_history(
        &self,
        author_id: Uuid,
        exclude_post: Uuid,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AuthorPostSummary>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, quality_score, published_at
            FROM posts
            WHERE author_id = $1
              AND id <> $2
              AND status = $3
              AND published_at < $4
              AND quality_score > 0
            ORDER BY published_at DESC
            LIMIT $5
            "#,
        )
        .bind(author_id)
        .bind(exclude_post)
        .bind(PostStatus::Published.as_str())
        .bind(before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuthorPostSummary::from).collect())
    }

    async fn profiles(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ANY($1)");
        let rows = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Write-back
// ---------------------------------------------------------------------------

#[async_trait]
impl ScoreWriter for PgScoringStore {
    async fn write_score(&self, result: &ScoreResult) -> Result<()> {
        let done = sqlx::query("UPDATE posts SET quality_score = $2, spam_score = $3 WHERE id = $1")
            .bind(result.post_id)
            .bind(result.quality_score)
            .bind(result.spam_score)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            bail!("post {} no longer exists", result.post_id);
        }
        Ok(())
    }
}
