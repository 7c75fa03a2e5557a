#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use citest_artifacts::FsArtifactStore;
use citest_browser::{BrowserError, BrowserSession, DisplayLease, HeadlessBrowser, HttpProbe, SessionOptions, VirtualDisplay};
use citest_core::{ConsoleEntry, RunReport};
use citest_runner::{Capabilities, CiError, Coordinator, RunConfig};
use citest_runtime::{ContainerAttrs, ContainerHandle, ContainerRuntime, ExecOutput, LaunchSpec, RuntimeError};
use tempfile::TempDir;

pub const IMAGE: &str = "linuxserver/test";

pub fn config(tags: &[&str]) -> RunConfig {
    let mut cfg = RunConfig {
        image: IMAGE.into(),
        meta_tag: "1.0-ls1".into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        builder: "node-1".into(),
        ..Default::default()
    };
    cfg.scanner.image = "scanner:latest".into();
    cfg.publish.dry_run = true;
    let t = &mut cfg.timing;
    t.poll_interval_ms = 5;
    t.retry_interval_ms = 5;
    t.startup_timeout_ms = 150;
    t.sbom_timeout_ms = 150;
    t.join_grace_ms = 500;
    t.screenshot_timeout_ms = 150;
    t.settle_delay_ms = 0;
    t.startup_delay_ms = 0;
    cfg
}

/// Per-tag behaviour of [`FakeRuntime`].
#[derive(Default)]
pub struct Script {
    pub never_starts: HashSet<String>,
    pub sbom_hangs: HashSet<String>,
    pub sbom_errors: HashSet<String>,
    pub launch_fails: HashSet<String>,
    pub remove_fails: HashSet<String>,
    /// App log reads fail with a runtime error.
    pub logs_fail: HashSet<String>,
    /// App inspect blocks long past the evidence join budget.
    pub inspect_hangs: HashSet<String>,
    pub ping_fails: bool,
}

impl Script {
    pub fn with(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

enum Kind {
    App(String),
    Scanner(String),
}

#[derive(Default)]
struct State {
    next_id: usize,
    containers: HashMap<String, Kind>,
    scanner_runs: usize,
    scanner_removes: usize,
    app_runs: usize,
    app_removes: usize,
    launches: Vec<LaunchSpec>,
}

/// Container runtime double that counts launches and removals.
pub struct FakeRuntime {
    script: Script,
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new(script: Script) -> Self {
        Self { script, state: Mutex::default() }
    }

    pub fn scanner_counts(&self) -> (usize, usize) {
        let s = self.state.lock().unwrap();
        (s.scanner_runs, s.scanner_removes)
    }

    pub fn app_counts(&self) -> (usize, usize) {
        let s = self.state.lock().unwrap();
        (s.app_runs, s.app_removes)
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.state.lock().unwrap().launches.clone()
    }

    fn kind_of(&self, handle: &ContainerHandle) -> Result<(bool, String), RuntimeError> {
        let s = self.state.lock().unwrap();
        match s.containers.get(&handle.id) {
            Some(Kind::App(tag)) => Ok((false, tag.clone())),
            Some(Kind::Scanner(tag)) => Ok((true, tag.clone())),
            None => Err(RuntimeError::NotFound(handle.id.clone())),
        }
    }
}

fn tag_of(image_ref: &str) -> String {
    image_ref.rsplit_once(':').map(|(_, t)| t.to_string()).unwrap_or_default()
}

impl ContainerRuntime for FakeRuntime {
    fn ping(&self) -> Result<String, RuntimeError> {
        if self.script.ping_fails {
            return Err(RuntimeError::Unavailable("daemon down".into()));
        }
        Ok("fake-24.0".into())
    }

    fn start(&self, spec: &LaunchSpec) -> Result<ContainerHandle, RuntimeError> {
        let mut s = self.state.lock().unwrap();
        s.launches.push(spec.clone());
        let kind = match spec.command.first() {
            Some(target) => {
                s.scanner_runs += 1;
                Kind::Scanner(tag_of(target))
            }
            None => {
                let tag = tag_of(&spec.image_ref);
                if self.script.launch_fails.contains(&tag) {
                    return Err(RuntimeError::Command { args: "run".into(), stderr: "pull access denied".into() });
                }
                s.app_runs += 1;
                Kind::App(tag)
            }
        };
        s.next_id += 1;
        let id = format!("c{}", s.next_id);
        s.containers.insert(id.clone(), kind);
        Ok(ContainerHandle { id, image_ref: spec.image_ref.clone() })
    }

    fn logs(&self, container: &ContainerHandle) -> Result<String, RuntimeError> {
        let (scanner, tag) = self.kind_of(container)?;
        if !scanner {
            if self.script.logs_fail.contains(&tag) {
                return Err(RuntimeError::Unavailable("daemon hiccup".into()));
            }
            if self.script.never_starts.contains(&tag) {
                return Ok("booting...\n".into());
            }
            return Ok("\u{1b}[32m[ls.io-init] done.\u{1b}[0m\n".into());
        }
        if self.script.sbom_errors.contains(&tag) {
            return Err(RuntimeError::Unavailable("scanner crashed".into()));
        }
        if self.script.sbom_hangs.contains(&tag) {
            return Ok(" ✔ Cataloging packages\n".into());
        }
        Ok(" ✔ Parsed image\nNAME     VERSION  TYPE\nbusybox  1.36.1   apk\nuwsgi    2.0.22   apk\n".into())
    }

    fn exec(&self, _container: &ContainerHandle, _command: &[&str]) -> Result<ExecOutput, RuntimeError> {
        Ok(ExecOutput { exit_code: 0, output: String::new() })
    }

    fn inspect(&self, container: &ContainerHandle) -> Result<ContainerAttrs, RuntimeError> {
        let (scanner, tag) = self.kind_of(container)?;
        if !scanner && self.script.inspect_hangs.contains(&tag) {
            std::thread::sleep(Duration::from_secs(2));
        }
        let mut attrs = ContainerAttrs {
            ip_address: Some("172.17.0.2".into()),
            image: container.image_ref.clone(),
            image_size: Some(52_430_000),
            running: true,
            ..Default::default()
        };
        attrs.labels.insert("org.opencontainers.image.version".into(), "1.0-ls1".into());
        attrs.labels.insert("org.opencontainers.image.created".into(), "2024-05-01T00:00:00Z".into());
        attrs.labels.insert("maintainer".into(), "linuxserver".into());
        Ok(attrs)
    }

    fn remove(&self, container: &ContainerHandle, _force: bool) -> Result<(), RuntimeError> {
        let mut s = self.state.lock().unwrap();
        match s.containers.remove(&container.id) {
            Some(Kind::Scanner(_)) => s.scanner_removes += 1,
            Some(Kind::App(tag)) => {
                if self.script.remove_fails.contains(&tag) {
                    s.containers.insert(container.id.clone(), Kind::App(tag));
                    return Err(RuntimeError::Command { args: "rm".into(), stderr: "device busy".into() });
                }
                s.app_removes += 1;
            }
            None => {}
        }
        Ok(())
    }
}

/// Browser double; every screenshot fails when `fail_screenshots` is set and
/// reports success without writing a file when `skip_write` is set.
#[derive(Default)]
pub struct FakeBrowser {
    pub fail_screenshots: bool,
    pub skip_write: bool,
    pub settle_seen: Mutex<Option<Duration>>,
}

struct FakeSession {
    fail: bool,
    skip_write: bool,
    url: Option<String>,
}

impl HeadlessBrowser for FakeBrowser {
    fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        *self.settle_seen.lock().unwrap() = Some(options.settle_delay);
        Ok(Box::new(FakeSession { fail: self.fail_screenshots, skip_write: self.skip_write, url: None }))
    }
}

impl BrowserSession for FakeSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.url = Some(url.to_string());
        Ok(())
    }

    fn screenshot(&mut self, path: &Path) -> Result<(), BrowserError> {
        if self.fail {
            return Err(BrowserError::Screenshot("blank page".into()));
        }
        if self.skip_write {
            return Ok(());
        }
        std::fs::write(path, b"\x89PNG")?;
        Ok(())
    }

    fn console_logs(&self) -> Vec<ConsoleEntry> {
        vec![ConsoleEntry { level: "INFO".into(), message: format!("loaded {}", self.url.clone().unwrap_or_default()) }]
    }

    fn quit(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// Refuses the first `refusals` probes, then answers 200.
#[derive(Default)]
pub struct FakeProbe {
    pub refusals: usize,
    pub calls: AtomicUsize,
}

impl HttpProbe for FakeProbe {
    fn probe(&self, _url: &str) -> Result<u16, BrowserError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.refusals {
            return Err(BrowserError::Probe("connection refused".into()));
        }
        Ok(200)
    }
}

#[derive(Default)]
pub struct FakeDisplay {
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl VirtualDisplay for FakeDisplay {
    fn acquire(&self) -> Result<DisplayLease, BrowserError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let released = self.released.clone();
        Ok(DisplayLease::new(Some(":99".into()), move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

pub struct Harness {
    pub runtime: Arc<FakeRuntime>,
    pub display: Arc<FakeDisplay>,
    pub out: TempDir,
    pub browser: Arc<FakeBrowser>,
    pub probe: Arc<FakeProbe>,
}

impl Harness {
    pub fn new(script: Script) -> Self {
        Self::build(script, FakeBrowser::default(), FakeProbe::default())
    }

    pub fn with_browser(script: Script, browser: FakeBrowser) -> Self {
        Self::build(script, browser, FakeProbe::default())
    }

    pub fn with_probe(script: Script, probe: FakeProbe) -> Self {
        Self::build(script, FakeBrowser::default(), probe)
    }

    fn build(script: Script, browser: FakeBrowser, probe: FakeProbe) -> Self {
        Self {
            runtime: Arc::new(FakeRuntime::new(script)),
            display: Arc::new(FakeDisplay::default()),
            out: tempfile::tempdir().unwrap(),
            browser: Arc::new(browser),
            probe: Arc::new(probe),
        }
    }

    pub fn run(&self, cfg: RunConfig) -> Result<RunReport, CiError> {
        let caps = Capabilities {
            runtime: self.runtime.clone(),
            browser: self.browser.clone(),
            probe: self.probe.clone(),
            display: self.display.clone(),
        };
        let artifacts = Arc::new(FsArtifactStore::new(self.out.path().to_path_buf()));
        Coordinator::new(cfg, caps, artifacts).run()
    }
}
