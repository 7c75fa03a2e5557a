pub mod chrome;
pub mod probe;
pub mod types;
pub mod xvfb;

pub use chrome::ChromeCli;
pub use probe::ReqwestProbe;
pub use types::*;
pub use xvfb::{NoDisplay, Xvfb};
