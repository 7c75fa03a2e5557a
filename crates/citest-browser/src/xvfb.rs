use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{info, warn};

use crate::types::{BrowserError, DisplayLease, VirtualDisplay};

/// Starts an `Xvfb` server for the lifetime of the lease.
#[derive(Clone, Debug)]
pub struct Xvfb {
    pub binary: String,
    pub display: String,
    pub screen: String,
}

impl Default for Xvfb {
    fn default() -> Self {
        Self { binary: "Xvfb".into(), display: ":99".into(), screen: "1920x1080x24".into() }
    }
}

impl VirtualDisplay for Xvfb {
    fn acquire(&self) -> Result<DisplayLease, BrowserError> {
        let mut child = Command::new(&self.binary)
            .args([self.display.as_str(), "-screen", "0", self.screen.as_str(), "-nolisten", "tcp"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BrowserError::Display(format!("{}: {e}", self.binary)))?;

        // give the server a moment; an immediate exit means the display is taken
        std::thread::sleep(Duration::from_millis(500));
        if let Some(status) = child.try_wait()? {
            return Err(BrowserError::Display(format!("{} exited early with {status}", self.binary)));
        }
        info!(display = %self.display, "virtual display started");

        let display_name = self.display.clone();
        Ok(DisplayLease::new(Some(self.display.clone()), move || {
            if let Err(e) = child.kill() {
                warn!(display = %display_name, "failed to stop virtual display: {e}");
            }
            let _ = child.wait();
            info!(display = %display_name, "virtual display stopped");
        }))
    }
}

/// For hosts that already provide a display, or runs without screenshots.
#[derive(Clone, Debug, Default)]
pub struct NoDisplay;

impl VirtualDisplay for NoDisplay {
    fn acquire(&self) -> Result<DisplayLease, BrowserError> {
        Ok(DisplayLease::none())
    }
}
