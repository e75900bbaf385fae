use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use postrank_common::{Post, PostRankError, ScoreResult};

use crate::aggregator::PostSignals;
use crate::metrics::{derive_inputs, ScoreInputs};
use crate::quality::{self, QualityBreakdown};
use crate::spam::{self, SpamBreakdown};
use crate::structure;

/// Both scores for one post, with the inputs and per-dimension points behind them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub post_id: Uuid,
    pub inputs: ScoreInputs,
    pub quality: QualityBreakdown,
    pub spam: SpamBreakdown,
}

impl Scorecard {
    pub fn result(&self) -> ScoreResult {
        ScoreResult {
            post_id: self.post_id,
            quality_score: self.quality.total,
            spam_score: self.spam.total,
        }
    }
}

/// Analyze, derive and score one post from an already-gathered signal snapshot.
pub fn evaluate(
    post: &Post,
    signals: &PostSignals,
    as_of: DateTime<Utc>,
) -> Result<Scorecard, PostRankError> {
    if !post.is_published() {
        return Err(PostRankError::PostEvaluation {
            post_id: post.id,
            message: format!("post is {}, only published posts are scored", post.status),
        });
    }

    let structure = structure::analyze(&post.content);
    let inputs = derive_inputs(post, structure, signals, as_of);
    inputs
        .validate()
        .map_err(|message| PostRankError::PostEvaluation {
            post_id: post.id,
            message,
        })?;

    Ok(Scorecard {
        post_id: post.id,
        quality: quality::score(&inputs),
        spam: spam::score(&inputs),
        inputs,
    })
}
