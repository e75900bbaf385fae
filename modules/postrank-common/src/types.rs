use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Posts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Archived,
    Removed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
            PostStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "archived" => Ok(PostStatus::Archived),
            "removed" => Ok(PostStatus::Removed),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

/// Denormalized engagement counters maintained on the post row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub like_count: u32,
    pub comment_count: u32,
    pub save_count: u32,
    pub share_count: u32,
    pub view_count: u32,
    pub unique_view_count: u32,
    pub premium_view_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    /// Rendered HTML body.
    pub content: String,
    pub word_count: u32,
    pub status: PostStatus,
    pub is_nsfw: bool,
    pub for_kids: bool,
    pub has_featured_image: bool,
    pub source_links: Vec<String>,
    pub counters: EngagementCounters,
    pub coins_earned: u64,
    pub allow_comments: bool,
    pub published_at: Option<DateTime<Utc>>,
    /// Owned by the scoring engine. Always overwritten, never incremented.
    pub quality_score: f64,
    /// Owned by the scoring engine. Always overwritten, never incremented.
    pub spam_score: f64,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

// --- Signal records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    /// None for anonymous readers.
    pub viewer_id: Option<Uuid>,
    /// Seconds spent on the page.
    pub read_duration: u32,
    /// 0–100
    pub read_percentage: f64,
    pub is_premium_viewer: bool,
    pub ip_address: Option<String>,
}

/// An approved comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftRecord {
    pub sender_id: Uuid,
}

/// Presence of an entry means a moderator has acted on the post before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationEntry {
    pub action: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub profile_score: f64,
    pub trust_level: u8,
    pub is_verified: bool,
    pub spam_score: f64,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// One of the author's earlier, already-scored posts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthorPostSummary {
    pub id: Uuid,
    pub quality_score: f64,
    pub published_at: DateTime<Utc>,
}

// --- Output ---

/// Persisted as a replacing write of both score columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub post_id: Uuid,
    pub quality_score: f64,
    pub spam_score: f64,
}
