use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use citest_core::ConsoleEntry;
use tracing::debug;

use crate::types::{BrowserError, BrowserSession, HeadlessBrowser, SessionOptions};

/// Headless Chromium driven through its command line. Each capture is a
/// fresh browser process; the session carries the target URL and the console
/// output gathered so far.
#[derive(Clone, Debug)]
pub struct ChromeCli {
    pub binary: String,
}

impl Default for ChromeCli {
    fn default() -> Self {
        Self::new("chromium")
    }
}

impl ChromeCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl HeadlessBrowser for ChromeCli {
    fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let out = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| BrowserError::Unavailable(format!("{}: {e}", self.binary)))?;
        if !out.status.success() {
            return Err(BrowserError::Unavailable(format!("{} --version failed", self.binary)));
        }
        Ok(Box::new(ChromeSession {
            binary: self.binary.clone(),
            options: options.clone(),
            url: None,
            console: vec![],
            closed: false,
        }))
    }
}

struct ChromeSession {
    binary: String,
    options: SessionOptions,
    url: Option<String>,
    console: Vec<ConsoleEntry>,
    closed: bool,
}

impl ChromeSession {
    fn capture_args(&self, url: &str, path: &Path) -> Vec<String> {
        let mut args = vec![
            "--headless=new".to_string(),
            "--no-sandbox".into(),
            "--disable-gpu".into(),
            "--hide-scrollbars".into(),
            "--enable-logging=stderr".into(),
            "--v=0".into(),
            format!("--window-size={},{}", self.options.window_width, self.options.window_height),
            format!("--timeout={}", self.options.page_load_timeout.as_millis()),
            format!("--screenshot={}", path.display()),
        ];
        if !self.options.settle_delay.is_zero() {
            args.push(format!("--virtual-time-budget={}", self.options.settle_delay.as_millis()));
        }
        if self.options.ignore_tls_errors {
            args.push("--ignore-certificate-errors".into());
        }
        args.push(url.to_string());
        args
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        if self.closed {
            return Err(BrowserError::Navigation { url: url.into(), reason: "session closed".into() });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(BrowserError::Navigation { url: url.into(), reason: "unsupported scheme".into() });
        }
        self.url = Some(url.to_string());
        Ok(())
    }

    fn screenshot(&mut self, path: &Path) -> Result<(), BrowserError> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| BrowserError::Screenshot("no page loaded".into()))?;
        let args = self.capture_args(&url, path);
        debug!(binary = %self.binary, ?args, "capturing screenshot");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args).stdout(Stdio::null()).stderr(Stdio::piped());
        if let Some(display) = &self.options.display {
            cmd.env("DISPLAY", display);
        }
        let mut child = cmd.spawn()?;

        // stderr must be drained while the browser runs
        let mut stderr = child.stderr.take();
        let reader = std::thread::spawn(move || {
            let mut s = String::new();
            if let Some(ref mut e) = stderr {
                let _ = e.read_to_string(&mut s);
            }
            s
        });

        let budget = self.options.page_load_timeout + self.options.settle_delay + Duration::from_secs(10);
        let status = wait_or_kill(&mut child, budget);
        let log = reader.join().unwrap_or_default();
        self.console.extend(parse_console(&log));

        match status {
            Err(e) => Err(e),
            Ok(s) if !s.success() => Err(BrowserError::Screenshot(format!("{} exited with {s}", self.binary))),
            Ok(_) => Ok(()),
        }
    }

    fn console_logs(&self) -> Vec<ConsoleEntry> {
        self.console.clone()
    }

    fn quit(&mut self) -> Result<(), BrowserError> {
        self.closed = true;
        self.url = None;
        Ok(())
    }
}

/// Wait for `child` to exit within `budget`. On timeout or a failed status
/// poll the process is killed and reaped before the error is returned.
fn wait_or_kill(child: &mut Child, budget: Duration) -> Result<ExitStatus, BrowserError> {
    let started = Instant::now();
    let outcome = loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if started.elapsed() < budget => std::thread::sleep(Duration::from_millis(100)),
            Ok(None) => break BrowserError::Timeout(budget),
            Err(e) => break BrowserError::Io(e),
        }
    };
    let _ = child.kill();
    let _ = child.wait();
    Err(outcome)
}

/// Pick page console messages out of Chromium's stderr log, e.g.
/// `[1:2:1017/120000.123:WARNING:CONSOLE(12)] "msg", source: http://x/ (12)`.
pub fn parse_console(log: &str) -> Vec<ConsoleEntry> {
    log.lines()
        .filter_map(|line| {
            let start = line.find(":CONSOLE(")?;
            let level = line[..start].rsplit(':').next()?.to_string();
            let close = line[start..].find("] ")? + start + 2;
            let message = line[close..].trim().to_string();
            Some(ConsoleEntry { level, message })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_lines() {
        let log = "\
[1:2:1017/120000.1:INFO:headless_shell.cc(1)] started
[1:2:1017/120000.2:WARNING:CONSOLE(12)] \"deprecated api\", source: http://10.0.0.2/app.js (12)
[1:2:1017/120000.3:ERROR:CONSOLE(40)] \"Uncaught TypeError\", source: http://10.0.0.2/main.js (40)";
        let entries = parse_console(log);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, "WARNING");
        assert!(entries[0].message.starts_with("\"deprecated api\""));
        assert_eq!(entries[1].level, "ERROR");
    }

    #[test]
    fn capture_args_include_target_and_window() {
        let s = ChromeSession {
            binary: "chromium".into(),
            options: SessionOptions::default(),
            url: None,
            console: vec![],
            closed: false,
        };
        let args = s.capture_args("https://10.0.0.2:443/", Path::new("/tmp/amd64.png"));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--virtual-time-budget")));
        assert!(args.contains(&"--screenshot=/tmp/amd64.png".to_string()));
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://10.0.0.2:443/"));
    }

    #[test]
    fn settle_delay_becomes_a_render_budget() {
        let s = ChromeSession {
            binary: "chromium".into(),
            options: SessionOptions { settle_delay: Duration::from_secs(30), ..SessionOptions::default() },
            url: None,
            console: vec![],
            closed: false,
        };
        let args = s.capture_args("http://10.0.0.2:80", Path::new("/tmp/amd64.png"));
        let budget = args.iter().position(|a| a == "--virtual-time-budget=30000").unwrap();
        let target = args.iter().position(|a| a == "http://10.0.0.2:80").unwrap();
        assert!(budget < target);
    }

    #[cfg(unix)]
    #[test]
    fn overrunning_child_is_killed_and_reaped() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let started = Instant::now();
        let err = wait_or_kill(&mut child, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, BrowserError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn navigate_rejects_unknown_scheme_and_closed_session() {
        let mut s = ChromeSession {
            binary: "chromium".into(),
            options: SessionOptions::default(),
            url: None,
            console: vec![],
            closed: false,
        };
        assert!(s.navigate("ftp://x").is_err());
        assert!(s.navigate("http://x").is_ok());
        s.quit().unwrap();
        assert!(s.navigate("http://x").is_err());
        assert!(s.screenshot(Path::new("/tmp/x.png")).is_err());
    }
}
