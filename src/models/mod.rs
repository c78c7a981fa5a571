pub mod event;
pub mod review;
pub mod run;
pub mod dashboard;

pub use event::*;
pub use review::*;
pub use run::*;
pub use dashboard::*;
