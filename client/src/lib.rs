pub mod anomaly;
pub mod config;
pub mod error;
pub mod fallback;
pub mod history;
pub mod orchestrator;
pub mod remote;
pub mod upload;

pub use anomaly::LocalPrecheck;
pub use config::{ClientConfig, ConfigError};
pub use error::{AnalysisError, HistoryError, RemoteError};
pub use fallback::{FallbackStrategy, FixedFallback, SeededFallback};
pub use history::{AnalysisEntry, BatchEntry, HistoryStore, SingleEntry, SlotOutcome};
pub use orchestrator::{Analysis, Orchestrator};
pub use remote::{Availability, InferenceApi, RemoteClient, RemoteOutcome};
pub use upload::ImageUpload;
