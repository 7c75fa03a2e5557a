use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
    #[error("runtime command failed: {args}: {stderr}")]
    Command { args: String, stderr: String },
    #[error("no such container: {0}")]
    NotFound(String),
    #[error("unexpected runtime output: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A container started by the runtime. Owned by whoever started it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub image_ref: String,
}

#[derive(Clone, Debug, Default)]
pub struct LaunchSpec {
    pub image_ref: String,
    pub env: BTreeMap<String, String>,
    /// `host:container` bind mounts.
    pub volumes: Vec<String>,
    pub privileged: bool,
    pub command: Vec<String>,
}

impl LaunchSpec {
    pub fn new(image_ref: impl Into<String>) -> Self {
        Self { image_ref: image_ref.into(), ..Self::default() }
    }
}

/// The subset of container/image attributes the collectors read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerAttrs {
    pub labels: BTreeMap<String, String>,
    pub ip_address: Option<String>,
    pub image: String,
    pub image_size: Option<u64>,
    pub running: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub output: String,
}

/// Container runtime capability. Implementations are shared across worker
/// threads, so every method takes `&self`.
pub trait ContainerRuntime: Send + Sync {
    /// Cheap reachability check; returns the server version.
    fn ping(&self) -> Result<String, RuntimeError>;

    fn start(&self, spec: &LaunchSpec) -> Result<ContainerHandle, RuntimeError>;

    /// Combined stdout/stderr of the container so far.
    fn logs(&self, container: &ContainerHandle) -> Result<String, RuntimeError>;

    fn exec(&self, container: &ContainerHandle, command: &[&str]) -> Result<ExecOutput, RuntimeError>;

    fn inspect(&self, container: &ContainerHandle) -> Result<ContainerAttrs, RuntimeError>;

    /// Remove the container. A container that is already gone is not an error.
    fn remove(&self, container: &ContainerHandle, force: bool) -> Result<(), RuntimeError>;
}
