pub mod config;
pub mod error;
pub mod types;

pub use config::ScoringConfig;
pub use error::PostRankError;
pub use types::*;
