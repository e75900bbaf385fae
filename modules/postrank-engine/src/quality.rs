//! Quality score: six capped reward dimensions plus two uncapped penalties.

use serde::Serialize;

use crate::metrics::ScoreInputs;
use crate::tiers::{award, award_count, cap, finalize, Tier};

pub const CONTENT_STRUCTURE_CAP: f64 = 15.0;
pub const READ_QUALITY_CAP: f64 = 20.0;
pub const ENGAGEMENT_QUALITY_CAP: f64 = 20.0;
pub const VISITOR_QUALITY_CAP: f64 = 20.0;
pub const AUTHOR_AUTHORITY_CAP: f64 = 10.0;
pub const ECONOMIC_SIGNALS_CAP: f64 = 8.0;

/// Read and visitor quality stay at 0 below this many unique views.
pub const VIEW_GATE: u32 = 3;
/// Author reputation stands in for engagement below this many unique views.
pub const COLD_START_VIEWS: u32 = 5;
/// Author history only counts once the author has this many scored posts.
pub const CONSISTENCY_MIN_POSTS: u32 = 5;

// Content structure
const IMAGES: &[Tier] = &[Tier::at_least(4.0, 1.0), Tier::at_least(1.0, 2.0)];
const WORD_COUNT: &[Tier] = &[
    Tier::at_least(300.0, 3.0),
    Tier::at_least(100.0, 2.0),
    Tier::at_least(30.0, 1.0),
];

// Read quality
const READ_DURATION: &[Tier] = &[
    Tier::at_least(120.0, 6.0),
    Tier::at_least(60.0, 4.0),
    Tier::at_least(30.0, 2.0),
];
const READ_PERCENTAGE: &[Tier] = &[
    Tier::at_least(70.0, 5.0),
    Tier::at_least(50.0, 3.0),
    Tier::at_least(30.0, 1.0),
];
const QUALIFIED_READ_RATIO: &[Tier] = &[
    Tier::at_least(0.40, 5.0),
    Tier::at_least(0.20, 3.0),
    Tier::at_least(0.10, 1.0),
];
const BOUNCE_RATE: &[Tier] = &[Tier::above(0.50, -3.0), Tier::above(0.30, -1.0)];

// Engagement quality
const LIKE_RATIO: &[Tier] = &[
    Tier::at_least(0.15, 4.0),
    Tier::at_least(0.08, 3.0),
    Tier::at_least(0.03, 2.0),
];
const UNIQUE_COMMENTERS: &[Tier] = &[
    Tier::at_least(10.0, 5.0),
    Tier::at_least(5.0, 3.0),
    Tier::at_least(2.0, 2.0),
    Tier::at_least(1.0, 1.0),
];
const SAVE_RATIO: &[Tier] = &[
    Tier::at_least(0.05, 3.0),
    Tier::at_least(0.02, 2.0),
    Tier::at_least(0.005, 1.0),
];
const REPLIES: &[Tier] = &[
    Tier::at_least(10.0, 3.0),
    Tier::at_least(3.0, 2.0),
    Tier::at_least(1.0, 1.0),
];
const SHARES: &[Tier] = &[Tier::at_least(10.0, 2.0), Tier::at_least(3.0, 1.0)];
const QUALITY_COMMENTS: &[Tier] = &[
    Tier::at_least(5.0, 3.0),
    Tier::at_least(2.0, 2.0),
    Tier::at_least(1.0, 1.0),
];

// Visitor quality
const VISITOR_PROFILE: &[Tier] = &[
    Tier::at_least(60.0, 8.0),
    Tier::at_least(40.0, 6.0),
    Tier::at_least(20.0, 4.0),
    Tier::above(0.0, 1.0),
];
const VISITOR_AGE_DAYS: &[Tier] = &[
    Tier::at_least(365.0, 3.0),
    Tier::at_least(180.0, 2.0),
    Tier::at_least(30.0, 1.0),
];
const VISITOR_ACTIVE: &[Tier] = &[Tier::at_least(0.50, 3.0), Tier::at_least(0.25, 2.0)];
const PREMIUM_RATIO: &[Tier] = &[Tier::at_least(0.20, 2.0), Tier::at_least(0.10, 1.0)];

// Author authority
const AUTHOR_PROFILE: &[Tier] = &[
    Tier::at_least(80.0, 4.0),
    Tier::at_least(60.0, 3.0),
    Tier::at_least(40.0, 2.0),
    Tier::at_least(20.0, 1.0),
];
const AUTHOR_TRUST: &[Tier] = &[
    Tier::at_least(5.0, 3.0),
    Tier::at_least(4.0, 2.0),
    Tier::at_least(3.0, 1.0),
];
const AUTHOR_CONSISTENCY: &[Tier] = &[
    Tier::at_least(60.0, 3.0),
    Tier::at_least(40.0, 2.0),
    Tier::at_least(20.0, 1.0),
];
const COLD_START_BOOST: &[Tier] = &[
    Tier::at_least(70.0, 5.0),
    Tier::at_least(50.0, 3.0),
    Tier::at_least(30.0, 2.0),
];
const AUTHOR_SPAM: &[Tier] = &[Tier::at_least(50.0, -5.0), Tier::at_least(30.0, -3.0)];

// Economic signals
const GIFTS: &[Tier] = &[
    Tier::at_least(5.0, 3.0),
    Tier::at_least(2.0, 2.0),
    Tier::at_least(1.0, 1.0),
];
const GIFT_SENDERS: &[Tier] = &[Tier::at_least(3.0, 3.0), Tier::at_least(2.0, 2.0)];
const COINS: &[Tier] = &[Tier::at_least(100.0, 2.0), Tier::at_least(20.0, 1.0)];

// Penalties
const REPORTS: &[Tier] = &[
    Tier::at_least(5.0, -8.0),
    Tier::at_least(3.0, -5.0),
    Tier::at_least(1.0, -2.0),
];
const QUICK_LIKERS: &[Tier] = &[Tier::at_least(0.60, -8.0), Tier::at_least(0.40, -5.0)];
const QUICK_SAVERS: &[Tier] = &[Tier::at_least(0.50, -5.0)];
const SAME_IP: &[Tier] = &[Tier::at_least(0.30, -7.0)];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub content_structure: f64,
    pub read_quality: f64,
    pub engagement_quality: f64,
    pub visitor_quality: f64,
    pub author_authority: f64,
    pub economic_signals: f64,
    /// Zero or negative.
    pub content_penalty: f64,
    /// Zero or negative.
    pub manipulation_penalty: f64,
    /// Clamped to [0, 100], two decimals.
    pub total: f64,
}

pub fn score(inputs: &ScoreInputs) -> QualityBreakdown {
    let mut b = QualityBreakdown {
        content_structure: content_structure(inputs),
        read_quality: read_quality(inputs),
        engagement_quality: engagement_quality(inputs),
        visitor_quality: visitor_quality(inputs),
        author_authority: author_authority(inputs),
        economic_signals: economic_signals(inputs),
        content_penalty: content_penalty(inputs),
        manipulation_penalty: manipulation_penalty(inputs),
        total: 0.0,
    };
    b.total = finalize(
        b.content_structure
            + b.read_quality
            + b.engagement_quality
            + b.visitor_quality
            + b.author_authority
            + b.economic_signals
            + b.content_penalty
            + b.manipulation_penalty,
    );
    b
}

pub fn content_structure(i: &ScoreInputs) -> f64 {
    let s = &i.structure;
    let mut points = 0.0;
    if i.has_featured_image {
        points += 2.0;
    }
    points += award_count(s.image_count, IMAGES);
    if s.heading_count >= 2 {
        points += 2.0;
    }
    if i.tag_count >= 3 {
        points += 2.0;
    }
    points += award_count(i.word_count, WORD_COUNT);
    if i.has_source_link {
        points += 1.0;
    }
    if s.rich_block_kinds() >= 2 {
        points += 2.0;
    }
    cap(points, CONTENT_STRUCTURE_CAP)
}

pub fn read_quality(i: &ScoreInputs) -> f64 {
    if i.unique_view_count < VIEW_GATE {
        return 0.0;
    }
    let views = i.unique_view_count;
    let mut points = award(i.avg_read_duration, READ_DURATION)
        + award(i.avg_read_percentage, READ_PERCENTAGE)
        + award(i.qualified_read_ratio, QUALIFIED_READ_RATIO);

    if i.avg_read_duration > 0.0 && i.avg_read_duration < 15.0 && views >= 50 {
        points -= 4.0;
    }
    if views >= 20 {
        points += award(i.bounce_rate, BOUNCE_RATE);
    }
    cap(points, READ_QUALITY_CAP)
}

pub fn engagement_quality(i: &ScoreInputs) -> f64 {
    let mut points = award(i.like_ratio, LIKE_RATIO)
        + award_count(i.unique_commenters, UNIQUE_COMMENTERS)
        + award(i.save_ratio, SAVE_RATIO)
        + award_count(i.reply_count, REPLIES)
        + award_count(i.share_count, SHARES)
        + award_count(i.quality_comment_count, QUALITY_COMMENTS);

    if i.comment_count > 5 && i.short_comment_ratio > 0.80 {
        points -= 2.0;
    }
    cap(points, ENGAGEMENT_QUALITY_CAP)
}

pub fn visitor_quality(i: &ScoreInputs) -> f64 {
    if i.unique_view_count < VIEW_GATE {
        return 0.0;
    }
    let mut points = award(i.visitor_avg_profile_score, VISITOR_PROFILE)
        + award(i.visitor_avg_account_age_days, VISITOR_AGE_DAYS)
        + award(i.visitor_active_ratio, VISITOR_ACTIVE)
        + award(i.premium_view_ratio, PREMIUM_RATIO);

    if i.visitor_new_account_ratio > 0.30 && i.unique_view_count >= 20 {
        points -= 4.0;
    }
    cap(points, VISITOR_QUALITY_CAP)
}

pub fn author_authority(i: &ScoreInputs) -> f64 {
    let mut points = award(i.author_profile_score, AUTHOR_PROFILE)
        + award(f64::from(i.author_trust_level), AUTHOR_TRUST);
    if i.author_verified {
        points += 2.0;
    }
    if i.author_published_count >= CONSISTENCY_MIN_POSTS {
        points += award(i.author_avg_quality_score, AUTHOR_CONSISTENCY);
    }
    if i.unique_view_count < COLD_START_VIEWS {
        points += award(i.author_profile_score, COLD_START_BOOST);
    }
    points += award(i.author_spam_score, AUTHOR_SPAM);
    cap(points, AUTHOR_AUTHORITY_CAP)
}

pub fn economic_signals(i: &ScoreInputs) -> f64 {
    let points = award_count(i.gift_count, GIFTS)
        + award_count(i.gift_sender_count, GIFT_SENDERS)
        + award(i.coins_earned as f64, COINS);
    cap(points, ECONOMIC_SIGNALS_CAP)
}

pub fn content_penalty(i: &ScoreInputs) -> f64 {
    let mut points = award_count(i.report_count, REPORTS);
    if i.is_nsfw {
        points -= 5.0;
    }
    if i.was_moderated {
        points -= 3.0;
    }
    if i.ai_flagged {
        points -= 2.0;
    }
    if !i.allow_comments {
        points -= 1.0;
    }
    points
}

pub fn manipulation_penalty(i: &ScoreInputs) -> f64 {
    let mut points = 0.0;
    if i.like_count >= 10 {
        points += award(i.quick_liker_ratio, QUICK_LIKERS);
    }
    if i.save_count >= 5 {
        points += award(i.quick_saver_ratio, QUICK_SAVERS);
    }
    if i.unique_view_count >= 20 {
        points += award(i.same_ip_cluster_ratio, SAME_IP);
    }
    if i.unique_view_count > 50 && i.qualified_read_count == 0 {
        points -= 5.0;
    }
    points
}
