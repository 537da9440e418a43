pub mod config;
pub mod cycle;
pub mod fallback;
pub mod logging;
pub mod memory;
pub mod replay;


pub use config::OrchestratorConfig;
pub use cycle::{is_peak_mode, trend_context, CycleOrchestrator, CycleRequest};
pub use fallback::rule_based_decision;
pub use logging::init_tracing;
pub use memory::{DecisionMemory, MemoryEntry, DEFAULT_LAST_CONFIDENCE};
pub use replay::{load_cycles, OfflineStrategist, RecordedAgents, RecordedCycle, RecordedHistory};
