pub mod ids;
pub mod model;
pub mod timing;
pub mod types;
pub mod verdict;

pub use ids::*;
pub use model::*;
pub use timing::*;
pub use types::*;
pub use verdict::*;
