//! Snapshot transformation
//!
//! Turns typed study snapshots into denormalized tables and the set of
//! resource types the load stage should run for each study.

pub mod merge;

pub use merge::{filter_family_relationships, merge_study, StepOutput};
