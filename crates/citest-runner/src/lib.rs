pub mod aggregate;
pub mod collectors;
pub mod config;
pub mod coordinator;
pub mod doctor;
pub mod error;
pub mod util;
pub mod worker;

pub use aggregate::*;
pub use config::*;
pub use coordinator::*;
pub use doctor::*;
pub use error::*;
pub use util::*;
pub use worker::*;
