// Trait seams for the scoring job.
//
// SignalSource: every bounded, read-only signal read for one post.
// PostStore: selection of the posts a run evaluates.
// ScoreWriter: the single write the engine performs.
//
// The Aggregator is the only caller of SignalSource, so error containment for
// reads is enforced in one place. testing.rs provides in-memory doubles.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use postrank_common::{
    AuthorPostSummary, CommentRecord, GiftRecord, ModerationEntry, Post, Profile, ScoreResult,
    ViewRecord,
};

#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn tag_count(&self, post_id: Uuid) -> Result<u32>;

    async fn views(&self, post_id: Uuid, limit: usize) -> Result<Vec<ViewRecord>>;

    /// Approved comments only.
    async fn approved_comments(&self, post_id: Uuid, limit: usize) -> Result<Vec<CommentRecord>>;

    async fn gifts(&self, post_id: Uuid) -> Result<Vec<GiftRecord>>;

    async fn report_count(&self, post_id: Uuid) -> Result<u32>;

    async fn moderation_log(&self, post_id: Uuid, limit: usize) -> Result<Vec<ModerationEntry>>;

    /// User ids of likers.
    async fn likers(&self, post_id: Uuid, limit: usize) -> Result<Vec<Uuid>>;

    /// User ids of savers.
    async fn savers(&self, post_id: Uuid, limit: usize) -> Result<Vec<Uuid>>;

    async fn profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// The author's other published, already-scored posts published before
    /// `before`, most recent first.
    async fn author_history(
        &self,
        author_id: Uuid,
        exclude_post: Uuid,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AuthorPostSummary>>;

    /// Batch profile lookup. Unknown ids are simply absent from the result.
    async fn profiles(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Published posts with `published_at` in `[from, to]`, newest first.
    async fn published_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Post>>;

    /// Published posts with `published_at` in `[from, to)` whose quality
    /// score is still the default zero, newest first.
    async fn unscored_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Post>>;
}

#[async_trait]
pub trait ScoreWriter: Send + Sync {
    /// Overwrite both score columns for one post.
    async fn write_score(&self, result: &ScoreResult) -> Result<()>;
}
