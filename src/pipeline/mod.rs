pub mod orchestrator;
pub mod phase;
pub mod state;

pub use orchestrator::Console;
pub use phase::{AgentDefinition, PipelineProfile, DEFAULT_REQUEST};
pub use state::{AgentState, AgentStatus, RunState, RunStatus};
