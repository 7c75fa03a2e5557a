use std::path::Path;
use std::time::Duration;

use citest_core::ConsoleEntry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser unavailable: {0}")]
    Unavailable(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("endpoint probe failed: {0}")]
    Probe(String),
    #[error("virtual display: {0}")]
    Display(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub window_width: u32,
    pub window_height: u32,
    pub page_load_timeout: Duration,
    /// Render time a page gets between navigation and capture.
    pub settle_delay: Duration,
    /// Containers under test usually serve self-signed certificates.
    pub ignore_tls_errors: bool,
    /// X display to render on, if any.
    pub display: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            window_width: 1920,
            window_height: 1080,
            page_load_timeout: Duration::from_secs(60),
            settle_delay: Duration::ZERO,
            ignore_tls_errors: true,
            display: None,
        }
    }
}

pub trait HeadlessBrowser: Send + Sync {
    fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One browser session, owned by a single worker.
pub trait BrowserSession: Send {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;
    /// Capture the current page once it has had `settle_delay` to render.
    fn screenshot(&mut self, path: &Path) -> Result<(), BrowserError>;
    fn console_logs(&self) -> Vec<ConsoleEntry>;
    fn quit(&mut self) -> Result<(), BrowserError>;
}

/// Reachability check run before every navigation attempt.
pub trait HttpProbe: Send + Sync {
    /// Returns the HTTP status of a successful probe.
    fn probe(&self, url: &str) -> Result<u16, BrowserError>;
}

/// Virtual display shared by every browser session of a run.
pub trait VirtualDisplay: Send + Sync {
    fn acquire(&self) -> Result<DisplayLease, BrowserError>;
}

/// Held for the duration of a batch. The display is released on drop.
pub struct DisplayLease {
    name: Option<String>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl DisplayLease {
    pub fn new(name: Option<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self { name, release: Some(Box::new(release)) }
    }

    /// A lease that owns nothing, for environments that already have a display.
    pub fn none() -> Self {
        Self { name: None, release: None }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Drop for DisplayLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for DisplayLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayLease").field("name", &self.name).finish()
    }
}
