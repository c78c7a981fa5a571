pub mod workflow;

pub use workflow::{EscalationWorkflow, ResolveOutcome};
