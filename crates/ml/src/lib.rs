pub mod ensemble;
pub mod explanation;
pub mod features;
pub mod models;
pub mod narrative;
pub mod shap;

pub use ensemble::*;
pub use explanation::*;
pub use features::*;
pub use models::*;
pub use shap::*;
