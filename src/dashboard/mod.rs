pub mod reconciler;

pub use reconciler::{apply_run_summary, hard_refresh};
