pub mod player;
pub mod predictions;
pub mod requests;
pub mod error;

pub use player::*;
pub use predictions::*;
pub use requests::*;
pub use error::*;
