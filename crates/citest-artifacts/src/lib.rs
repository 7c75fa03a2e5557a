pub mod ansi;
pub mod render;
pub mod store;

pub use ansi::*;
pub use render::*;
pub use store::*;
