//! Online analyses (§4.F)

pub mod mean_value;
pub mod pso;
pub mod stage;

pub use mean_value::{MeanValueEntry, MeanValueTable};
pub use pso::PsoDetector;
pub use stage::{StageReport, StageTracker};
