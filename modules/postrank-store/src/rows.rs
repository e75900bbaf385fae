//! Row shapes as stored in Postgres, and their conversion to domain types.
//!
//! Counters are signed in SQL. Negative values are treated as zero.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use postrank_common::{
    AuthorPostSummary, CommentRecord, EngagementCounters, ModerationEntry, Post, PostStatus,
    Profile, ViewRecord,
};

fn count(n: i32) -> u32 {
    u32::try_from(n).unwrap_or(0)
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub word_count: i32,
    pub status: String,
    pub is_nsfw: bool,
    pub for_kids: bool,
    pub featured_image: Option<String>,
    pub source_links: Vec<String>,
    pub like_count: i32,
    pub comment_count: i32,
    pub save_count: i32,
    pub share_count: i32,
    pub view_count: i32,
    pub unique_view_count: i32,
    pub premium_view_count: i32,
    pub coins_earned: i64,
    pub allow_comments: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub quality_score: f64,
    pub spam_score: f64,
}

impl TryFrom<PostRow> for Post {
    type Error = anyhow::Error;

    fn try_from(row: PostRow) -> Result<Self> {
        let status: PostStatus = row
            .status
            .parse()
            .map_err(|e: String| anyhow!("post {}: {e}", row.id))?;

        Ok(Post {
            id: row.id,
            author_id: row.author_id,
            content: row.content,
            word_count: count(row.word_count),
            status,
            is_nsfw: row.is_nsfw,
            for_kids: row.for_kids,
            has_featured_image: row.featured_image.is_some_and(|url| !url.trim().is_empty()),
            source_links: row.source_links,
            counters: EngagementCounters {
                like_count: count(row.like_count),
                comment_count: count(row.comment_count),
                save_count: count(row.save_count),
                share_count: count(row.share_count),
                view_count: count(row.view_count),
                unique_view_count: count(row.unique_view_count),
                premium_view_count: count(row.premium_view_count),
            },
            coins_earned: u64::try_from(row.coins_earned).unwrap_or(0),
            allow_comments: row.allow_comments,
            published_at: row.published_at,
            quality_score: row.quality_score,
            spam_score: row.spam_score,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ViewRow {
    pub viewer_id: Option<Uuid>,
    pub read_duration: i32,
    pub read_percentage: f64,
    pub is_premium_viewer: bool,
    pub ip_address: Option<String>,
}

impl From<ViewRow> for ViewRecord {
    fn from(row: ViewRow) -> Self {
        ViewRecord {
            viewer_id: row.viewer_id,
            read_duration: count(row.read_duration),
            read_percentage: row.read_percentage,
            is_premium_viewer: row.is_premium_viewer,
            ip_address: row.ip_address,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        CommentRecord {
            author_id: row.author_id,
            parent_id: row.parent_id,
            content: row.content,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ModerationRow {
    pub action: String,
    pub created_at: DateTime<Utc>,
}

impl From<ModerationRow> for ModerationEntry {
    fn from(row: ModerationRow) -> Self {
        ModerationEntry {
            action: row.action,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProfileRow {
    pub user_id: Uuid,
    pub profile_score: f64,
    pub trust_level: i16,
    pub is_verified: bool,
    pub spam_score: f64,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            user_id: row.user_id,
            profile_score: row.profile_score,
            trust_level: u8::try_from(row.trust_level.max(0)).unwrap_or(u8::MAX),
            is_verified: row.is_verified,
            spam_score: row.spam_score,
            created_at: row.created_at,
            last_active_at: row.last_active_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HistoryRow {
    pub id: Uuid,
    pub quality_score: f64,
    pub published_at: DateTime<Utc>,
}

impl From<HistoryRow> for AuthorPostSummary {
    fn from(row: HistoryRow) -> Self {
        AuthorPostSummary {
            id: row.id,
            quality_score: row.quality_score,
            published_at: row.published_at,
        }
    }
}
