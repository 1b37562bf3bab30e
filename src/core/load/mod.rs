//! Load stage: entity builders, id cache and submission
//!
//! - [`builders`] - one [`EntityBuilder`] per output resource type
//! - [`cache`] - per-run natural key to remote id cache
//! - [`context`] - shared state handed to builders
//! - [`record`] - builder input records
//! - [`stage`] - concurrent per-type submission loop
//! - [`summary`] - per-type outcome counters and errors

pub mod builders;
pub mod cache;
pub mod context;
pub mod record;
pub mod stage;
pub mod summary;

pub use builders::{builder_for, registry, EntityBuilder};
pub use cache::IdCache;
pub use context::BuildContext;
pub use record::BuilderRecord;
pub use stage::LoadStage;
pub use summary::{IngestError, IngestErrorType, IngestSummary, TypeCounts};
