pub mod metrics;
pub mod predictor;
pub mod registry;

pub use metrics::*;
pub use predictor::*;
pub use registry::*;
