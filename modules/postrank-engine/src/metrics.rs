//! Metric derivation: raw signals → the flat input bundle both scorers read.
//!
//! Pure. Every ratio goes through [`ratio`], so an empty denominator yields 0.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use postrank_common::{Post, ViewRecord};

use crate::aggregator::PostSignals;
use crate::structure::ContentStructure;
use crate::tiers::ratio;

/// A view counts as a qualified read at or above both of these.
pub const QUALIFIED_READ_SECS: u32 = 30;
pub const QUALIFIED_READ_PCT: f64 = 40.0;
/// A view is a bounce below both of these.
pub const BOUNCE_SECS: u32 = 5;
pub const BOUNCE_PCT: f64 = 5.0;
/// Likes and saves from readers below this are "quick".
pub const QUICK_ENGAGEMENT_SECS: u32 = 10;
/// An IP with at least this many views is a cluster.
pub const SAME_IP_CLUSTER_MIN: usize = 3;
pub const QUALITY_COMMENT_MIN_TOKENS: usize = 20;
pub const SHORT_COMMENT_MAX_TOKENS: usize = 5;
pub const ACTIVE_WITHIN_DAYS: i64 = 30;
pub const NEW_ACCOUNT_DAYS: f64 = 7.0;

/// Everything the scorers need for one post. Rebuilt every pass, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreInputs {
    // Post
    pub word_count: u32,
    pub has_featured_image: bool,
    pub has_source_link: bool,
    pub is_nsfw: bool,
    pub allow_comments: bool,
    pub tag_count: u32,
    pub structure: ContentStructure,
    pub unique_view_count: u32,
    pub like_count: u32,
    pub comment_count: u32,
    pub save_count: u32,
    pub share_count: u32,
    pub coins_earned: u64,

    // Reading
    pub avg_read_duration: f64,
    pub avg_read_percentage: f64,
    pub qualified_read_count: u32,
    pub qualified_read_ratio: f64,
    pub bounce_rate: f64,

    // Engagement
    pub like_ratio: f64,
    pub save_ratio: f64,
    pub unique_commenters: u32,
    pub reply_count: u32,
    pub quality_comment_count: u32,
    pub short_comment_ratio: f64,

    // Visitors
    pub visitor_avg_profile_score: f64,
    pub visitor_avg_account_age_days: f64,
    pub visitor_active_ratio: f64,
    pub visitor_new_account_ratio: f64,
    pub premium_view_ratio: f64,

    // Author
    pub author_profile_score: f64,
    pub author_trust_level: u8,
    pub author_verified: bool,
    pub author_spam_score: f64,
    pub author_avg_quality_score: f64,
    pub author_published_count: u32,

    // Economy
    pub gift_count: u32,
    pub gift_sender_count: u32,

    // Moderation
    pub report_count: u32,
    pub was_moderated: bool,
    pub ai_flagged: bool,

    // Manipulation
    pub quick_liker_ratio: f64,
    pub quick_saver_ratio: f64,
    pub same_ip_cluster_ratio: f64,
}

impl ScoreInputs {
    /// Reject bundles carrying NaN or infinite metrics.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("avg_read_duration", self.avg_read_duration),
            ("avg_read_percentage", self.avg_read_percentage),
            ("qualified_read_ratio", self.qualified_read_ratio),
            ("bounce_rate", self.bounce_rate),
            ("like_ratio", self.like_ratio),
            ("save_ratio", self.save_ratio),
            ("short_comment_ratio", self.short_comment_ratio),
            ("visitor_avg_profile_score", self.visitor_avg_profile_score),
            ("visitor_avg_account_age_days", self.visitor_avg_account_age_days),
            ("visitor_active_ratio", self.visitor_active_ratio),
            ("visitor_new_account_ratio", self.visitor_new_account_ratio),
            ("premium_view_ratio", self.premium_view_ratio),
            ("author_profile_score", self.author_profile_score),
            ("author_spam_score", self.author_spam_score),
            ("author_avg_quality_score", self.author_avg_quality_score),
            ("quick_liker_ratio", self.quick_liker_ratio),
            ("quick_saver_ratio", self.quick_saver_ratio),
            ("same_ip_cluster_ratio", self.same_ip_cluster_ratio),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, v)) => Err(format!("{name} is not finite ({v})")),
            None => Ok(()),
        }
    }
}

/// Build the input bundle for one post.
pub fn derive_inputs(
    post: &Post,
    structure: ContentStructure,
    signals: &PostSignals,
    as_of: DateTime<Utc>,
) -> ScoreInputs {
    let c = &post.counters;
    let unique_views = f64::from(c.unique_view_count);
    let views = &signals.views;

    let qualified_read_count = views.iter().filter(|v| is_qualified_read(v)).count() as u32;
    let bounces = views.iter().filter(|v| is_bounce(v)).count();

    let (unique_commenters, reply_count, quality_comment_count, short_comment_ratio) =
        comment_metrics(post.author_id, signals);

    let author = signals.author.as_ref();
    let author_spam_score = author.map_or(0.0, |a| a.spam_score);

    let history = &signals.author_history;
    let author_avg_quality_score = ratio(
        history.iter().map(|p| p.quality_score).sum(),
        history.len() as f64,
    );

    let read_time = longest_read_by_viewer(views);
    let sender_count = signals
        .gifts
        .iter()
        .map(|g| g.sender_id)
        .collect::<HashSet<_>>()
        .len() as u32;

    let visitors = visitor_metrics(signals, as_of);

    ScoreInputs {
        word_count: post.word_count,
        has_featured_image: post.has_featured_image,
        has_source_link: post.source_links.iter().any(|l| !l.trim().is_empty()),
        is_nsfw: post.is_nsfw,
        allow_comments: post.allow_comments,
        tag_count: signals.tag_count,
        structure,
        unique_view_count: c.unique_view_count,
        like_count: c.like_count,
        comment_count: c.comment_count,
        save_count: c.save_count,
        share_count: c.share_count,
        coins_earned: post.coins_earned,

        avg_read_duration: positive_mean(views.iter().map(|v| f64::from(v.read_duration))),
        avg_read_percentage: positive_mean(views.iter().map(|v| v.read_percentage)),
        qualified_read_count,
        qualified_read_ratio: ratio(f64::from(qualified_read_count), unique_views),
        bounce_rate: ratio(bounces as f64, views.len() as f64),

        like_ratio: ratio(f64::from(c.like_count), unique_views),
        save_ratio: ratio(f64::from(c.save_count), unique_views),
        unique_commenters,
        reply_count,
        quality_comment_count,
        short_comment_ratio,

        visitor_avg_profile_score: visitors.avg_profile_score,
        visitor_avg_account_age_days: visitors.avg_account_age_days,
        visitor_active_ratio: visitors.active_ratio,
        visitor_new_account_ratio: visitors.new_account_ratio,
        premium_view_ratio: ratio(f64::from(c.premium_view_count), unique_views),

        author_profile_score: author.map_or(0.0, |a| a.profile_score),
        author_trust_level: author.map_or(0, |a| a.trust_level),
        author_verified: author.is_some_and(|a| a.is_verified),
        author_spam_score,
        author_avg_quality_score,
        author_published_count: history.len() as u32,

        gift_count: signals.gifts.len() as u32,
        gift_sender_count: sender_count,

        report_count: signals.report_count,
        was_moderated: !signals.moderation_log.is_empty(),
        // A post from a flagged author that has never scored above zero.
        ai_flagged: author_spam_score > 0.0 && post.quality_score == 0.0,

        quick_liker_ratio: quick_ratio(&signals.likers, &read_time),
        quick_saver_ratio: quick_ratio(&signals.savers, &read_time),
        same_ip_cluster_ratio: same_ip_cluster_ratio(views),
    }
}

pub fn is_qualified_read(v: &ViewRecord) -> bool {
    v.read_duration >= QUALIFIED_READ_SECS && v.read_percentage >= QUALIFIED_READ_PCT
}

pub fn is_bounce(v: &ViewRecord) -> bool {
    v.read_duration < BOUNCE_SECS && v.read_percentage < BOUNCE_PCT
}

/// Mean of the strictly positive values only.
fn positive_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .filter(|v| *v > 0.0)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    ratio(sum, n as f64)
}

fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn comment_metrics(author_id: Uuid, signals: &PostSignals) -> (u32, u32, u32, f64) {
    let comments = &signals.comments;

    let unique_commenters = comments
        .iter()
        .filter(|c| c.author_id != author_id)
        .map(|c| c.author_id)
        .collect::<HashSet<_>>()
        .len() as u32;

    let replies = comments.iter().filter(|c| c.parent_id.is_some()).count() as u32;

    let quality = comments
        .iter()
        .filter(|c| {
            c.author_id != author_id && token_count(&c.content) >= QUALITY_COMMENT_MIN_TOKENS
        })
        .count() as u32;

    let short = comments
        .iter()
        .filter(|c| token_count(&c.content) < SHORT_COMMENT_MAX_TOKENS)
        .count();

    (
        unique_commenters,
        replies,
        quality,
        ratio(short as f64, comments.len() as f64),
    )
}

fn longest_read_by_viewer(views: &[ViewRecord]) -> HashMap<Uuid, u32> {
    let mut longest: HashMap<Uuid, u32> = HashMap::new();
    for v in views {
        if let Some(id) = v.viewer_id {
            let entry = longest.entry(id).or_insert(0);
            *entry = (*entry).max(v.read_duration);
        }
    }
    longest
}

/// Fraction of engaging users with no view record or a too-short read.
fn quick_ratio(users: &[Uuid], read_time: &HashMap<Uuid, u32>) -> f64 {
    let quick = users
        .iter()
        .filter(|u| {
            read_time
                .get(u)
                .map_or(true, |secs| *secs < QUICK_ENGAGEMENT_SECS)
        })
        .count();
    ratio(quick as f64, users.len() as f64)
}

/// Fraction of views whose IP appears at least [`SAME_IP_CLUSTER_MIN`] times.
///
/// Every record from a qualifying IP counts, whether it is one heavy reader
/// or several people behind one connection.
fn same_ip_cluster_ratio(views: &[ViewRecord]) -> f64 {
    let mut per_ip: HashMap<&str, usize> = HashMap::new();
    for ip in views.iter().filter_map(|v| v.ip_address.as_deref()) {
        if !ip.is_empty() {
            *per_ip.entry(ip).or_insert(0) += 1;
        }
    }
    let clustered: usize = per_ip
        .values()
        .filter(|n| **n >= SAME_IP_CLUSTER_MIN)
        .sum();
    ratio(clustered as f64, views.len() as f64)
}

#[derive(Debug, Default)]
struct VisitorMetrics {
    avg_profile_score: f64,
    avg_account_age_days: f64,
    active_ratio: f64,
    new_account_ratio: f64,
}

fn visitor_metrics(signals: &PostSignals, as_of: DateTime<Utc>) -> VisitorMetrics {
    let profiles = &signals.viewer_profiles;
    let n = profiles.len() as f64;
    if profiles.is_empty() {
        return VisitorMetrics::default();
    }

    let ages: Vec<f64> = profiles
        .iter()
        .map(|p| (as_of - p.created_at).num_seconds().max(0) as f64 / 86_400.0)
        .collect();
    let active_cutoff = as_of - Duration::days(ACTIVE_WITHIN_DAYS);

    VisitorMetrics {
        avg_profile_score: ratio(profiles.iter().map(|p| p.profile_score).sum(), n),
        avg_account_age_days: ratio(ages.iter().sum(), n),
        active_ratio: ratio(
            profiles
                .iter()
                .filter(|p| p.last_active_at.is_some_and(|t| t >= active_cutoff))
                .count() as f64,
            n,
        ),
        new_account_ratio: ratio(
            ages.iter().filter(|age| **age < NEW_ACCOUNT_DAYS).count() as f64,
            n,
        ),
    }
}
