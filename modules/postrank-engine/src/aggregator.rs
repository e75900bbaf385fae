//! Signal aggregation for one post.
//!
//! Stage 1 issues the ten independent reads concurrently and joins them.
//! Stage 2 depends on the stage-1 view records: it samples unique non-author
//! viewers and fetches their profiles in one batch.
//!
//! Every read is bounded by a cap and a timeout. A failed, timed-out or empty
//! read becomes an empty collection or zero; nothing propagates to scoring.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use postrank_common::{
    AuthorPostSummary, CommentRecord, GiftRecord, ModerationEntry, Post, PostRankError, Profile,
    ScoringConfig, ViewRecord,
};

use crate::traits::SignalSource;

/// Raw signals for one post, before derivation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostSignals {
    pub tag_count: u32,
    pub views: Vec<ViewRecord>,
    pub comments: Vec<CommentRecord>,
    pub gifts: Vec<GiftRecord>,
    pub report_count: u32,
    pub moderation_log: Vec<ModerationEntry>,
    pub likers: Vec<Uuid>,
    pub savers: Vec<Uuid>,
    pub author: Option<Profile>,
    pub author_history: Vec<AuthorPostSummary>,
    pub viewer_profiles: Vec<Profile>,
}

#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn SignalSource>,
    config: ScoringConfig,
}

impl Aggregator {
    pub fn new(source: Arc<dyn SignalSource>, config: ScoringConfig) -> Self {
        Self { source, config }
    }

    /// Gather every signal for `post`. Never fails.
    pub async fn gather(&self, post: &Post, as_of: DateTime<Utc>) -> PostSignals {
        let id = post.id;
        let c = &self.config;
        let src = &self.source;
        let history_before = post.published_at.unwrap_or(as_of);

        let (
            tag_count,
            mut views,
            mut comments,
            gifts,
            report_count,
            mut moderation_log,
            mut likers,
            mut savers,
            author,
            mut author_history,
        ) = tokio::join!(
            self.contained(id, "tag_count", src.tag_count(id)),
            self.contained(id, "views", src.views(id, c.view_cap)),
            self.contained(id, "comments", src.approved_comments(id, c.comment_cap)),
            self.contained(id, "gifts", src.gifts(id)),
            self.contained(id, "report_count", src.report_count(id)),
            self.contained(id, "moderation_log", src.moderation_log(id, c.moderation_cap)),
            self.contained(id, "likers", src.likers(id, c.like_cap)),
            self.contained(id, "savers", src.savers(id, c.bookmark_cap)),
            self.contained(id, "author_profile", src.profile(post.author_id)),
            self.contained(
                id,
                "author_history",
                src.author_history(post.author_id, id, history_before, c.author_history_cap),
            ),
        );

        // Sources are asked for at most `limit` rows; enforce it regardless.
        views.truncate(c.view_cap);
        comments.truncate(c.comment_cap);
        moderation_log.truncate(c.moderation_cap);
        likers.truncate(c.like_cap);
        savers.truncate(c.bookmark_cap);
        author_history.truncate(c.author_history_cap);

        let viewer_ids = sample_viewers(&views, post.author_id, c.viewer_sample_cap);
        let viewer_profiles = if viewer_ids.is_empty() {
            Vec::new()
        } else {
            self.contained(id, "viewer_profiles", src.profiles(&viewer_ids))
                .await
        };

        debug!(
            post_id = %id,
            views = views.len(),
            comments = comments.len(),
            likers = likers.len(),
            savers = savers.len(),
            viewer_profiles = viewer_profiles.len(),
            "Signals gathered"
        );

        PostSignals {
            tag_count,
            views,
            comments,
            gifts,
            report_count,
            moderation_log,
            likers,
            savers,
            author,
            author_history,
            viewer_profiles,
        }
    }

    async fn contained<T, F>(&self, post_id: Uuid, signal: &'static str, read: F) -> T
    where
        T: Default,
        F: Future<Output = anyhow::Result<T>>,
    {
        let err = match tokio::time::timeout(self.config.read_timeout, read).await {
            Ok(Ok(value)) => return value,
            Ok(Err(e)) => PostRankError::SignalFetch {
                signal,
                message: format!("{e:#}"),
            },
            Err(_) => PostRankError::SignalFetch {
                signal,
                message: format!("timed out after {}ms", self.config.read_timeout.as_millis()),
            },
        };
        warn!(
            post_id = %post_id,
            signal,
            error = %err,
            "Signal read failed, substituting empty value"
        );
        T::default()
    }
}

/// Unique, non-anonymous, non-author viewer ids in first-seen order.
pub fn sample_viewers(views: &[ViewRecord], author_id: Uuid, cap: usize) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    views
        .iter()
        .filter_map(|v| v.viewer_id)
        .filter(|id| *id != author_id && seen.insert(*id))
        .take(cap)
        .collect()
}
