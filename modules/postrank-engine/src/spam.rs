//! Spam score: five capped risk dimensions.
//!
//! Independent of quality. A post can score high or low on both.

use serde::Serialize;

use crate::metrics::ScoreInputs;
use crate::tiers::{award, award_count, cap, finalize, Tier};

pub const QUICK_ENGAGEMENT_CAP: f64 = 30.0;
pub const VISITOR_ANOMALIES_CAP: f64 = 25.0;
pub const ENGAGEMENT_ANOMALIES_CAP: f64 = 20.0;
pub const MODERATION_HISTORY_CAP: f64 = 15.0;
pub const CONTENT_FLAGS_CAP: f64 = 10.0;

/// Audience-based anomaly checks need at least this many unique views.
pub const ANOMALY_VIEW_GATE: u32 = 10;

const QUICK_LIKERS: &[Tier] = &[
    Tier::at_least(0.60, 20.0),
    Tier::at_least(0.40, 12.0),
    Tier::at_least(0.20, 6.0),
];
const QUICK_SAVERS: &[Tier] = &[Tier::at_least(0.50, 10.0), Tier::at_least(0.30, 5.0)];

const NEW_ACCOUNTS: &[Tier] = &[Tier::at_least(0.40, 15.0), Tier::at_least(0.20, 8.0)];
const LOW_VISITOR_PROFILE: &[Tier] = &[Tier::below(10.0, 10.0), Tier::below(20.0, 5.0)];
const SAME_IP: &[Tier] = &[Tier::at_least(0.30, 15.0), Tier::at_least(0.20, 8.0)];

const LIKE_RATIO: &[Tier] = &[Tier::at_least(0.50, 10.0), Tier::at_least(0.30, 5.0)];
const BOUNCE_RATE: &[Tier] = &[Tier::at_least(0.60, 8.0), Tier::at_least(0.40, 4.0)];

const REPORTS: &[Tier] = &[
    Tier::at_least(5.0, 10.0),
    Tier::at_least(3.0, 6.0),
    Tier::at_least(1.0, 3.0),
];
const AUTHOR_SPAM: &[Tier] = &[Tier::at_least(70.0, 5.0), Tier::at_least(50.0, 3.0)];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpamBreakdown {
    pub quick_engagement: f64,
    pub visitor_anomalies: f64,
    pub engagement_anomalies: f64,
    pub moderation_history: f64,
    pub content_flags: f64,
    /// Clamped to [0, 100], two decimals.
    pub total: f64,
}

pub fn score(inputs: &ScoreInputs) -> SpamBreakdown {
    let mut b = SpamBreakdown {
        quick_engagement: quick_engagement(inputs),
        visitor_anomalies: visitor_anomalies(inputs),
        engagement_anomalies: engagement_anomalies(inputs),
        moderation_history: moderation_history(inputs),
        content_flags: content_flags(inputs),
        total: 0.0,
    };
    b.total = finalize(
        b.quick_engagement
            + b.visitor_anomalies
            + b.engagement_anomalies
            + b.moderation_history
            + b.content_flags,
    );
    b
}

pub fn quick_engagement(i: &ScoreInputs) -> f64 {
    let mut points = 0.0;
    if i.like_count >= 5 {
        points += award(i.quick_liker_ratio, QUICK_LIKERS);
    }
    if i.save_count >= 3 {
        points += award(i.quick_saver_ratio, QUICK_SAVERS);
    }
    cap(points, QUICK_ENGAGEMENT_CAP)
}

pub fn visitor_anomalies(i: &ScoreInputs) -> f64 {
    if i.unique_view_count < ANOMALY_VIEW_GATE {
        return 0.0;
    }
    // An empty viewer sample averages to 0 and reads as a low-profile audience.
    let points = award(i.visitor_new_account_ratio, NEW_ACCOUNTS)
        + award(i.visitor_avg_profile_score, LOW_VISITOR_PROFILE)
        + award(i.same_ip_cluster_ratio, SAME_IP);
    cap(points, VISITOR_ANOMALIES_CAP)
}

pub fn engagement_anomalies(i: &ScoreInputs) -> f64 {
    if i.unique_view_count < ANOMALY_VIEW_GATE {
        return 0.0;
    }
    let mut points = award(i.like_ratio, LIKE_RATIO);
    if i.like_count > 20 && i.comment_count == 0 {
        points += 5.0;
    }
    if i.unique_view_count > 50 && i.qualified_read_count == 0 {
        points += 10.0;
    }
    if i.unique_view_count >= 20 {
        points += award(i.bounce_rate, BOUNCE_RATE);
    }
    cap(points, ENGAGEMENT_ANOMALIES_CAP)
}

pub fn moderation_history(i: &ScoreInputs) -> f64 {
    let mut points = award_count(i.report_count, REPORTS);
    if i.was_moderated {
        points += 3.0;
    }
    if i.ai_flagged {
        points += 2.0;
    }
    points += award(i.author_spam_score, AUTHOR_SPAM);
    cap(points, MODERATION_HISTORY_CAP)
}

pub fn content_flags(i: &ScoreInputs) -> f64 {
    let mut points = 0.0;
    if i.is_nsfw {
        points += 5.0;
    }
    if i.word_count < 20 && i.unique_view_count > 50 {
        points += 5.0;
    }
    cap(points, CONTENT_FLAGS_CAP)
}
