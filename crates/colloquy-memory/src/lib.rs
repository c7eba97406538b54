pub mod store;
pub mod builder;
pub mod summarizer;

pub use store::{ContextEntry, ContextStore};
pub use builder::{ContextBuilder, COMPACTION_THRESHOLD};
pub use summarizer::{SummaryUpdater, SUMMARY_MODEL};
