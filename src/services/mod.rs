pub mod cache;
pub mod engine;
pub mod poller;
pub mod replay;
pub mod signals;
pub mod sqlite_store;
pub mod trading;

pub use cache::Cache;
pub use engine::{Engine, EngineSettings, SignalOutcome, TickOutcome};
pub use poller::Poller;
pub use replay::{replay, ReplayReport, SeriesSource};
pub use signals::{ScoringEngine, SignalHistory};
pub use sqlite_store::SqliteStore;
pub use trading::{TradingError, TradingService};
