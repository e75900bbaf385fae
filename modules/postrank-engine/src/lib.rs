//! Content quality and spam scoring for published posts.
//!
//! Per post: gather bounded signals ([`aggregator`]), parse structure
//! ([`structure`]), derive ratio metrics ([`metrics`]), then compute two
//! independent scores ([`quality`], [`spam`]). [`scheduler::ScoringJob`]
//! drives a whole periodic run.

pub mod aggregator;
pub mod metrics;
pub mod quality;
pub mod scheduler;
pub mod scorecard;
pub mod spam;
pub mod structure;
pub mod tiers;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use aggregator::{Aggregator, PostSignals};
pub use metrics::{derive_inputs, ScoreInputs};
pub use quality::QualityBreakdown;
pub use scheduler::{ScoringJob, ScoringRunStats};
pub use scorecard::{evaluate, Scorecard};
pub use spam::SpamBreakdown;
pub use structure::{analyze, ContentStructure};
pub use traits::{PostStore, ScoreWriter, SignalSource};
