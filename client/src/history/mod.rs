pub mod history_store;
pub mod medium;
pub mod models;

pub use history_store::{HISTORY_CAPACITY, HISTORY_KEY, HistoryStore};
pub use medium::{FileMedium, MemoryMedium, StorageMedium};
pub use models::{AnalysisEntry, BatchEntry, SingleEntry, SlotOutcome, SourceSummary};
