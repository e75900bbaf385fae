// Test doubles for the scoring job.
//
// - MockSignalSource (SignalSource): HashMap-based per-post signals, with
//   injectable failures and latency per method
// - MockPostStore (PostStore + ScoreWriter): in-memory post table that
//   applies written scores back onto its rows, with injectable write and
//   selection latency
//
// Slowed calls are counted while in flight so tests can check how many a
// batch issues at once.
//
// Plus fixture helpers for posts and profiles.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use postrank_common::{
    AuthorPostSummary, CommentRecord, EngagementCounters, GiftRecord, ModerationEntry, Post,
    PostStatus, Profile, ScoreResult, ViewRecord,
};

use crate::traits::{PostStore, ScoreWriter, SignalSource};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A published, unscored post with no engagement.
pub fn post_fixture(author_id: Uuid, published_at: DateTime<Utc>) -> Post {
    Post {
        id: Uuid::new_v4(),
        author_id,
        content: String::new(),
        word_count: 0,
        status: PostStatus::Published,
        is_nsfw: false,
        for_kids: false,
        has_featured_image: false,
        source_links: Vec::new(),
        counters: EngagementCounters::default(),
        coins_earned: 0,
        allow_comments: true,
        published_at: Some(published_at),
        quality_score: 0.0,
        spam_score: 0.0,
    }
}

pub fn profile_fixture(user_id: Uuid, profile_score: f64, created_at: DateTime<Utc>) -> Profile {
    Profile {
        user_id,
        profile_score,
        trust_level: 0,
        is_verified: false,
        spam_score: 0.0,
        created_at,
        last_active_at: Some(created_at),
    }
}

// ---------------------------------------------------------------------------
// Concurrency gauge
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Gauge {
    current: usize,
    peak: usize,
}

impl Gauge {
    fn enter(&mut self) {
        self.current += 1;
        self.peak = self.peak.max(self.current);
    }

    fn leave(&mut self) {
        self.current -= 1;
    }
}

// ---------------------------------------------------------------------------
// MockSignalSource
// ---------------------------------------------------------------------------

/// Failure and latency injection keys are the trait method names:
/// `tag_count`, `views`, `approved_comments`, `gifts`, `report_count`,
/// `moderation_log`, `likers`, `savers`, `profile`, `author_history`, `profiles`.
#[derive(Default)]
pub struct MockSignalSource {
    tags: HashMap<Uuid, u32>,
    views: HashMap<Uuid, Vec<ViewRecord>>,
    comments: HashMap<Uuid, Vec<CommentRecord>>,
    gifts: HashMap<Uuid, Vec<GiftRecord>>,
    reports: HashMap<Uuid, u32>,
    moderation: HashMap<Uuid, Vec<ModerationEntry>>,
    likers: HashMap<Uuid, Vec<Uuid>>,
    savers: HashMap<Uuid, Vec<Uuid>>,
    profiles: HashMap<Uuid, Profile>,
    history: HashMap<Uuid, Vec<AuthorPostSummary>>,
    failing: HashSet<&'static str>,
    latency: HashMap<&'static str, Duration>,
    panicking: HashSet<Uuid>,
    profile_batches: Mutex<Vec<usize>>,
    in_flight: Mutex<HashMap<&'static str, Gauge>>,
}

impl MockSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tags(mut self, post_id: Uuid, count: u32) -> Self {
        self.tags.insert(post_id, count);
        self
    }

    pub fn on_views(mut self, post_id: Uuid, views: Vec<ViewRecord>) -> Self {
        self.views.insert(post_id, views);
        self
    }

    pub fn on_comments(mut self, post_id: Uuid, comments: Vec<CommentRecord>) -> Self {
        self.comments.insert(post_id, comments);
        self
    }

    pub fn on_gifts(mut self, post_id: Uuid, gifts: Vec<GiftRecord>) -> Self {
        self.gifts.insert(post_id, gifts);
        self
    }

    pub fn on_reports(mut self, post_id: Uuid, count: u32) -> Self {
        self.reports.insert(post_id, count);
        self
    }

    pub fn on_moderation(mut self, post_id: Uuid, entries: Vec<ModerationEntry>) -> Self {
        self.moderation.insert(post_id, entries);
        self
    }

    pub fn on_likers(mut self, post_id: Uuid, users: Vec<Uuid>) -> Self {
        self.likers.insert(post_id, users);
        self
    }

    pub fn on_savers(mut self, post_id: Uuid, users: Vec<Uuid>) -> Self {
        self.savers.insert(post_id, users);
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.insert(profile.user_id, profile);
        self
    }

    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = Profile>) -> Self {
        for p in profiles {
            self.profiles.insert(p.user_id, p);
        }
        self
    }

    /// Register an earlier post of `author_id`.
    pub fn with_history(mut self, author_id: Uuid, summary: AuthorPostSummary) -> Self {
        self.history.entry(author_id).or_default().push(summary);
        self
    }

    /// Make every call to `method` fail.
    pub fn failing(mut self, method: &'static str) -> Self {
        self.failing.insert(method);
        self
    }

    /// Delay every call to `method`.
    pub fn slow(mut self, method: &'static str, delay: Duration) -> Self {
        self.latency.insert(method, delay);
        self
    }

    /// Panic while reading signals for `post_id`.
    pub fn panicking_on(mut self, post_id: Uuid) -> Self {
        self.panicking.insert(post_id);
        self
    }

    /// Sizes of each batch profile lookup, in call order.
    pub fn profile_batches(&self) -> Vec<usize> {
        self.profile_batches.lock().unwrap().clone()
    }

    /// Most calls to a slowed `method` that were in flight at once.
    pub fn peak_concurrency(&self, method: &'static str) -> usize {
        self.in_flight
            .lock()
            .unwrap()
            .get(method)
            .map_or(0, |g| g.peak)
    }

    fn track(&self, method: &'static str, step: fn(&mut Gauge)) {
        let mut in_flight = self.in_flight.lock().unwrap();
        step(in_flight.entry(method).or_default());
    }

    async fn gate(&self, method: &'static str) -> Result<()> {
        if let Some(delay) = self.latency.get(method) {
            self.track(method, Gauge::enter);
            tokio::time::sleep(*delay).await;
            self.track(method, Gauge::leave);
        }
        if self.failing.contains(method) {
            bail!("MockSignalSource: {method} configured to fail");
        }
        Ok(())
    }
}

fn capped<T: Clone>(map: &HashMap<Uuid, Vec<T>>, key: &Uuid, limit: usize) -> Vec<T> {
    map.get(key)
        .map(|v| v.iter().take(limit).cloned().collect())
        .unwrap_or_default()
}

#[async_trait]
impl SignalSource for MockSignalSource {
    async fn tag_count(&self, post_id: Uuid) -> Result<u32> {
        self.gate("tag_count").await?;
        if self.panicking.contains(&post_id) {
            panic!("MockSignalSource: panicking on {post_id}");
        }
        Ok(self.tags.get(&post_id).copied().unwrap_or(0))
    }

    async fn views(&self, post_id: Uuid, limit: usize) -> Result<Vec<ViewRecord>> {
        self.gate("views").await?;
        Ok(capped(&self.views, &post_id, limit))
    }

    async fn approved_comments(&self, post_id: Uuid, limit: usize) -> Result<Vec<CommentRecord>> {
        self.gate("approved_comments").await?;
        Ok(capped(&self.comments, &post_id, limit))
    }

    async fn gifts(&self, post_id: Uuid) -> Result<Vec<GiftRecord>> {
        self.gate("gifts").await?;
        Ok(self.gifts.get(&post_id).cloned().unwrap_or_default())
    }

    async fn report_count(&self, post_id: Uuid) -> Result<u32> {
        self.gate("report_count").await?;
        Ok(self.reports.get(&post_id).copied().unwrap_or(0))
    }

    async fn moderation_log(&self, post_id: Uuid, limit: usize) -> Result<Vec<ModerationEntry>> {
        self.gate("moderation_log").await?;
        Ok(capped(&self.moderation, &post_id, limit))
    }

    async fn likers(&self, post_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        self.gate("likers").await?;
        Ok(capped(&self.likers, &post_id, limit))
    }

    async fn savers(&self, post_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        self.gate("savers").await?;
        Ok(capped(&self.savers, &post_id, limit))
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.gate("profile").await?;
        Ok(self.profiles.get(&user_id).cloned())
    }

    async fn author_history(
        &self,
        author_id: Uuid,
        exclude_post: Uuid,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AuthorPostSummary>> {
        self.gate("author_history").await?;
        let mut posts: Vec<AuthorPostSummary> = self
            .history
            .get(&author_id)
            .map(|entries| {
                entries
                    .iter()
                    .copied()
                    .filter(|s| {
                        s.id != exclude_post && s.published_at < before && s.quality_score > 0.0
                    })
                    .collect()
            })
            .unwrap_or_default();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(limit);
        Ok(posts)
    }

    async fn profiles(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>> {
        self.profile_batches.lock().unwrap().push(user_ids.len());
        self.gate("profiles").await?;
        Ok(user_ids
            .iter()
            .filter_map(|id| self.profiles.get(id).cloned())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockPostStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockPostStore {
    posts: Mutex<Vec<Post>>,
    failing_writes: HashSet<Uuid>,
    hanging_writes: HashSet<Uuid>,
    write_latency: Option<Duration>,
    selection_latency: Option<Duration>,
    fail_selection: bool,
    writes: Mutex<Vec<ScoreResult>>,
    writes_in_flight: Mutex<Gauge>,
}

impl MockPostStore {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Self::default()
        }
    }

    pub fn failing_write(mut self, post_id: Uuid) -> Self {
        self.failing_writes.insert(post_id);
        self
    }

    /// The write for `post_id` never completes.
    pub fn hanging_write(mut self, post_id: Uuid) -> Self {
        self.hanging_writes.insert(post_id);
        self
    }

    /// Delay every write.
    pub fn slow_writes(mut self, delay: Duration) -> Self {
        self.write_latency = Some(delay);
        self
    }

    pub fn failing_selection(mut self) -> Self {
        self.fail_selection = true;
        self
    }

    /// Delay both selection queries.
    pub fn slow_selection(mut self, delay: Duration) -> Self {
        self.selection_latency = Some(delay);
        self
    }

    /// Most slowed writes that were in flight at once.
    pub fn peak_concurrent_writes(&self) -> usize {
        self.writes_in_flight.lock().unwrap().peak
    }

    /// Every successful write, in the order it happened.
    pub fn writes(&self) -> Vec<ScoreResult> {
        self.writes.lock().unwrap().clone()
    }

    pub fn post(&self, post_id: Uuid) -> Option<Post> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
    }

    async fn select(&self, limit: usize, keep: impl Fn(&Post) -> bool) -> Result<Vec<Post>> {
        if let Some(delay) = self.selection_latency {
            tokio::time::sleep(delay).await;
        }
        if self.fail_selection {
            bail!("MockPostStore: selection configured to fail");
        }
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_published() && keep(p))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(limit);
        Ok(posts)
    }
}

#[async_trait]
impl PostStore for MockPostStore {
    async fn published_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        self.select(limit, |p| p.published_at.is_some_and(|t| t >= from && t <= to))
            .await
    }

    async fn unscored_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        self.select(limit, |p| {
            p.quality_score == 0.0 && p.published_at.is_some_and(|t| t >= from && t < to)
        })
        .await
    }
}

#[async_trait]
impl ScoreWriter for MockPostStore {
    async fn write_score(&self, result: &ScoreResult) -> Result<()> {
        if self.hanging_writes.contains(&result.post_id) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.write_latency {
            self.writes_in_flight.lock().unwrap().enter();
            tokio::time::sleep(delay).await;
            self.writes_in_flight.lock().unwrap().leave();
        }
        if self.failing_writes.contains(&result.post_id) {
            bail!("MockPostStore: write for {} configured to fail", result.post_id);
        }
        let mut posts = self.posts.lock().unwrap();
        match posts.iter_mut().find(|p| p.id == result.post_id) {
            Some(post) => {
                post.quality_score = result.quality_score;
                post.spam_score = result.spam_score;
            }
            None => bail!("MockPostStore: no post {}", result.post_id),
        }
        drop(posts);
        self.writes.lock().unwrap().push(*result);
        Ok(())
    }
}
