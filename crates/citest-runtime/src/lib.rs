pub mod contract;
pub mod docker;
pub mod types;

pub use docker::DockerCli;
pub use types::*;
