use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PostRankError;

/// Policy knobs for one scoring run.
///
/// Every signal read is capped, so a score is always an estimate over a
/// bounded sample. The caps, batch sizes and selection windows live here
/// rather than as literals in the job.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Posts evaluated concurrently per batch.
    pub scoring_batch_size: usize,
    /// Score writes issued per write-back batch.
    pub write_batch_size: usize,

    /// Posts published within this many days are always rescored.
    pub recent_window_days: i64,
    /// Older posts up to this age are backfilled while still unscored.
    pub backfill_window_days: i64,
    pub recent_cap: usize,
    /// Cap on recent + backfill together.
    pub total_cap: usize,

    pub view_cap: usize,
    pub comment_cap: usize,
    pub like_cap: usize,
    pub bookmark_cap: usize,
    pub moderation_cap: usize,
    pub author_history_cap: usize,
    pub viewer_sample_cap: usize,

    /// Deadline for each individual signal read.
    pub read_timeout: Duration,
    /// Deadline for each of the two selection queries.
    pub select_timeout: Duration,
    /// Deadline for each per-post score write.
    pub write_timeout: Duration,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scoring_batch_size: 50,
            write_batch_size: 100,
            recent_window_days: 7,
            backfill_window_days: 30,
            recent_cap: 300,
            total_cap: 500,
            view_cap: 500,
            comment_cap: 500,
            like_cap: 500,
            bookmark_cap: 500,
            moderation_cap: 5,
            author_history_cap: 20,
            viewer_sample_cap: 200,
            read_timeout: Duration::from_secs(5),
            select_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl ScoringConfig {
    /// Start from the defaults and apply any `POSTRANK_*` overrides.
    pub fn from_env() -> Result<Self, PostRankError> {
        let d = Self::default();
        let config = Self {
            scoring_batch_size: env_or("POSTRANK_SCORING_BATCH_SIZE", d.scoring_batch_size)?,
            write_batch_size: env_or("POSTRANK_WRITE_BATCH_SIZE", d.write_batch_size)?,
            recent_window_days: env_or("POSTRANK_RECENT_WINDOW_DAYS", d.recent_window_days)?,
            backfill_window_days: env_or("POSTRANK_BACKFILL_WINDOW_DAYS", d.backfill_window_days)?,
            recent_cap: env_or("POSTRANK_RECENT_CAP", d.recent_cap)?,
            total_cap: env_or("POSTRANK_TOTAL_CAP", d.total_cap)?,
            view_cap: env_or("POSTRANK_VIEW_CAP", d.view_cap)?,
            comment_cap: env_or("POSTRANK_COMMENT_CAP", d.comment_cap)?,
            like_cap: env_or("POSTRANK_LIKE_CAP", d.like_cap)?,
            bookmark_cap: env_or("POSTRANK_BOOKMARK_CAP", d.bookmark_cap)?,
            moderation_cap: env_or("POSTRANK_MODERATION_CAP", d.moderation_cap)?,
            author_history_cap: env_or("POSTRANK_AUTHOR_HISTORY_CAP", d.author_history_cap)?,
            viewer_sample_cap: env_or("POSTRANK_VIEWER_SAMPLE_CAP", d.viewer_sample_cap)?,
            read_timeout: env_millis("POSTRANK_READ_TIMEOUT_MS", d.read_timeout)?,
            select_timeout: env_millis("POSTRANK_SELECT_TIMEOUT_MS", d.select_timeout)?,
            write_timeout: env_millis("POSTRANK_WRITE_TIMEOUT_MS", d.write_timeout)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PostRankError> {
        if self.scoring_batch_size == 0 || self.write_batch_size == 0 {
            return Err(PostRankError::Config(
                "batch sizes must be greater than zero".to_string(),
            ));
        }
        if self.recent_window_days <= 0 || self.backfill_window_days <= self.recent_window_days {
            return Err(PostRankError::Config(format!(
                "backfill window ({}d) must extend past the recent window ({}d)",
                self.backfill_window_days, self.recent_window_days
            )));
        }
        if self.read_timeout.is_zero()
            || self.select_timeout.is_zero()
            || self.write_timeout.is_zero()
        {
            return Err(PostRankError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.recent_cap > self.total_cap {
            return Err(PostRankError::Config(format!(
                "recent cap {} exceeds total cap {}",
                self.recent_cap, self.total_cap
            )));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        tracing::info!(
            scoring_batch_size = self.scoring_batch_size,
            write_batch_size = self.write_batch_size,
            recent_window_days = self.recent_window_days,
            backfill_window_days = self.backfill_window_days,
            recent_cap = self.recent_cap,
            total_cap = self.total_cap,
            viewer_sample_cap = self.viewer_sample_cap,
            read_timeout_ms = self.read_timeout.as_millis() as u64,
            select_timeout_ms = self.select_timeout.as_millis() as u64,
            write_timeout_ms = self.write_timeout.as_millis() as u64,
            "Scoring config loaded"
        );
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, PostRankError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PostRankError::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration, PostRankError> {
    env_or(key, default.as_millis() as u64).map(Duration::from_millis)
}
