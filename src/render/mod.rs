pub mod progress;
pub mod renderer;

pub use progress::RunProgress;
pub use renderer::*;
