//! Postgres-backed signal source, post selection and score write-back for
//! the scoring job.
//!
//! The tables it expects are described in `schema/scoring.sql` at the
//! workspace root.

mod rows;
pub mod store;

pub use store::PgScoringStore;

/// The reference schema, for tests and local bootstrapping.
pub const SCHEMA: &str = include_str!("../../../schema/scoring.sql");
