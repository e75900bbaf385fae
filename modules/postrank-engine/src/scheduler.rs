use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use postrank_common::{Post, PostRankError, ScoreResult, ScoringConfig};

use crate::aggregator::Aggregator;
use crate::scorecard;
use crate::traits::{PostStore, ScoreWriter, SignalSource};

/// Stats from a scoring run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScoringRunStats {
    pub selected_recent: u64,
    pub selected_backfill: u64,
    pub skipped_unpublished: u64,
    pub evaluated: u64,
    pub evaluation_failed: u64,
    pub written: u64,
    pub write_failed: u64,
}

impl fmt::Display for ScoringRunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "selected_recent={} selected_backfill={} skipped_unpublished={} evaluated={} \
             evaluation_failed={} written={} write_failed={}",
            self.selected_recent,
            self.selected_backfill,
            self.skipped_unpublished,
            self.evaluated,
            self.evaluation_failed,
            self.written,
            self.write_failed,
        )
    }
}

/// The periodic scoring job: select → evaluate in batches → write back in batches.
///
/// Stateless between runs. Re-running after a crash re-selects the same posts
/// and overwrites their scores.
pub struct ScoringJob {
    posts: Arc<dyn PostStore>,
    writer: Arc<dyn ScoreWriter>,
    aggregator: Aggregator,
    config: ScoringConfig,
}

impl ScoringJob {
    /// Fails if `config` does not pass [`ScoringConfig::validate`].
    pub fn new(
        posts: Arc<dyn PostStore>,
        writer: Arc<dyn ScoreWriter>,
        source: Arc<dyn SignalSource>,
        config: ScoringConfig,
    ) -> Result<Self, PostRankError> {
        config.validate()?;
        Ok(Self {
            posts,
            writer,
            aggregator: Aggregator::new(source, config.clone()),
            config,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Run one full pass. Only a selection failure aborts the run.
    pub async fn run(&self, as_of: DateTime<Utc>) -> Result<ScoringRunStats> {
        let mut stats = ScoringRunStats::default();

        let posts = self.select(as_of, &mut stats).await?;
        info!(
            recent = stats.selected_recent,
            backfill = stats.selected_backfill,
            as_of = %as_of.format("%Y-%m-%dT%H:%M:%S"),
            "Scoring run selected posts"
        );

        let results = self.evaluate_all(posts, as_of, &mut stats).await;
        self.write_back(&results, &mut stats).await;

        info!("Scoring run complete. {stats}");
        Ok(stats)
    }

    /// Recent posts (always rescored) plus unscored older posts filling the
    /// remaining headroom. De-duplicated so no post is evaluated twice.
    async fn select(&self, as_of: DateTime<Utc>, stats: &mut ScoringRunStats) -> Result<Vec<Post>> {
        let c = &self.config;
        let recent_from = as_of - Duration::days(c.recent_window_days);
        let backfill_from = as_of - Duration::days(c.backfill_window_days);

        let mut recent = self
            .bounded_select(
                "recent",
                self.posts.published_between(recent_from, as_of, c.recent_cap),
            )
            .await?;
        recent.truncate(c.recent_cap);

        let headroom = c.total_cap.saturating_sub(recent.len());
        let mut backfill = if headroom > 0 {
            self.bounded_select(
                "backfill",
                self.posts.unscored_between(backfill_from, recent_from, headroom),
            )
            .await?
        } else {
            Vec::new()
        };
        backfill.truncate(headroom);

        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(recent.len() + backfill.len());

        for (post, is_recent) in recent
            .into_iter()
            .map(|p| (p, true))
            .chain(backfill.into_iter().map(|p| (p, false)))
        {
            if !seen.insert(post.id) {
                continue;
            }
            if !post.is_published() {
                stats.skipped_unpublished += 1;
                continue;
            }
            if is_recent {
                stats.selected_recent += 1;
            } else {
                stats.selected_backfill += 1;
            }
            selected.push(post);
        }

        Ok(selected)
    }

    async fn bounded_select<F>(&self, window: &'static str, query: F) -> Result<Vec<Post>>
    where
        F: Future<Output = Result<Vec<Post>>>,
    {
        let timeout = self.config.select_timeout;
        match tokio::time::timeout(timeout, query).await {
            Ok(posts) => posts,
            Err(_) => Err(PostRankError::Database(format!(
                "{window} selection timed out after {}ms",
                timeout.as_millis()
            ))
            .into()),
        }
    }

    /// Evaluate in fixed-size batches. Each post runs in its own task, so a
    /// failure or panic loses that post only. A batch is fully awaited before
    /// the next starts.
    async fn evaluate_all(
        &self,
        posts: Vec<Post>,
        as_of: DateTime<Utc>,
        stats: &mut ScoringRunStats,
    ) -> Vec<ScoreResult> {
        let mut results = Vec::with_capacity(posts.len());

        for (batch_no, batch) in posts.chunks(self.config.scoring_batch_size).enumerate() {
            let handles: Vec<_> = batch
                .iter()
                .cloned()
                .map(|post| {
                    let aggregator = self.aggregator.clone();
                    let post_id = post.id;
                    let handle = tokio::spawn(async move {
                        let signals = aggregator.gather(&post, as_of).await;
                        scorecard::evaluate(&post, &signals, as_of)
                    });
                    async move { (post_id, handle.await) }
                })
                .collect();

            for (post_id, outcome) in join_all(handles).await {
                let card = match outcome {
                    Ok(card) => card,
                    Err(join_err) => Err(PostRankError::PostEvaluation {
                        post_id,
                        message: format!("evaluation task failed: {join_err}"),
                    }),
                };
                match card {
                    Ok(card) => {
                        debug!(
                            post_id = %post_id,
                            quality = card.quality.total,
                            spam = card.spam.total,
                            quality_breakdown = ?card.quality,
                            spam_breakdown = ?card.spam,
                            "Post scored"
                        );
                        stats.evaluated += 1;
                        results.push(card.result());
                    }
                    Err(e) => {
                        warn!(post_id = %post_id, error = %e, "Skipping post");
                        stats.evaluation_failed += 1;
                    }
                }
            }

            debug!(batch = batch_no, size = batch.len(), "Scoring batch complete");
        }

        results
    }

    /// Persist scores in fixed-size batches. A failed or timed-out write is
    /// logged and left for the next run; it never rolls back the rest of the
    /// batch.
    async fn write_back(&self, results: &[ScoreResult], stats: &mut ScoringRunStats) {
        let timeout = self.config.write_timeout;

        for batch in results.chunks(self.config.write_batch_size) {
            let writes = batch.iter().map(|result| async move {
                let write = tokio::time::timeout(timeout, self.writer.write_score(result));
                let outcome = match write.await {
                    Ok(written) => written.map_err(|e| format!("{e:#}")),
                    Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
                };
                (result.post_id, outcome)
            });

            for (post_id, outcome) in join_all(writes).await {
                match outcome {
                    Ok(()) => stats.written += 1,
                    Err(message) => {
                        let err = PostRankError::WriteBack { post_id, message };
                        warn!(post_id = %post_id, error = %err, "Failed to persist scores");
                        stats.write_failed += 1;
                    }
                }
            }
        }
    }
}
