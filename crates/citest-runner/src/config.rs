use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use citest_core::{Tag, VerdictPolicy};

use crate::error::CiError;

/// Everything one test run needs. Loaded from a TOML file, the environment, or both.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub image: String,
    pub meta_tag: String,
    pub release_tag: String,
    pub tags: Vec<String>,
    pub builder: String,
    pub output_root: String,
    pub worker_concurrency: usize,
    pub native_override: bool,
    pub container: ContainerConfig,
    pub scanner: ScannerConfig,
    pub timing: TimingConfig,
    pub web: WebConfig,
    pub publish: PublishConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub env: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    pub privileged: bool,
    pub startup_markers: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub image: String,
    /// Header of the package table; its line starts the inventory.
    pub marker: String,
    pub volumes: Vec<String>,
}

/// All durations are in milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub retry_interval_ms: u64,
    pub startup_timeout_ms: u64,
    pub sbom_timeout_ms: u64,
    pub join_grace_ms: u64,
    pub screenshot_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub startup_delay_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub screenshot: bool,
    pub auth: String,
    pub path: String,
    pub port: u16,
    pub ssl: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            meta_tag: String::new(),
            release_tag: "latest".into(),
            tags: vec![],
            builder: "-".into(),
            output_root: "output".into(),
            worker_concurrency: 10,
            native_override: true,
            container: ContainerConfig::default(),
            scanner: ScannerConfig::default(),
            timing: TimingConfig::default(),
            web: WebConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            volumes: vec![],
            privileged: false,
            startup_markers: vec!["[ls.io-init] done.".into(), "[services.d] done.".into()],
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image: "ghcr.io/anchore/syft:latest".into(),
            marker: "VERSION".into(),
            volumes: vec!["/var/run/docker.sock:/var/run/docker.sock:ro".into()],
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            retry_interval_ms: 1_000,
            startup_timeout_ms: 120_000,
            sbom_timeout_ms: 900_000,
            join_grace_ms: 10_000,
            screenshot_timeout_ms: 120_000,
            settle_delay_ms: 30_000,
            startup_delay_ms: 5_000,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { screenshot: false, auth: "user:password".into(), path: String::new(), port: 80, ssl: false }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            bucket: "ci-tests.linuxserver.io".into(),
            region: "us-east-1".into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            dry_run: false,
        }
    }
}

impl TimingConfig {
    fn fields(&self) -> [(&'static str, u64); 8] {
        [
            ("poll_interval_ms", self.poll_interval_ms),
            ("retry_interval_ms", self.retry_interval_ms),
            ("startup_timeout_ms", self.startup_timeout_ms),
            ("sbom_timeout_ms", self.sbom_timeout_ms),
            ("join_grace_ms", self.join_grace_ms),
            ("screenshot_timeout_ms", self.screenshot_timeout_ms),
            ("settle_delay_ms", self.settle_delay_ms),
            ("startup_delay_ms", self.startup_delay_ms),
        ]
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
    pub fn sbom_timeout(&self) -> Duration {
        Duration::from_millis(self.sbom_timeout_ms)
    }
    /// How long the worker waits for the metadata/inventory pair.
    pub fn evidence_join_timeout(&self) -> Duration {
        Duration::from_millis(self.sbom_timeout_ms.saturating_add(self.join_grace_ms))
    }
    pub fn screenshot_timeout(&self) -> Duration {
        Duration::from_millis(self.screenshot_timeout_ms)
    }
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

impl WebConfig {
    fn scheme(&self) -> &'static str {
        if self.ssl {
            "https://"
        } else {
            "http://"
        }
    }

    /// Browser target: `{scheme}{auth@}{ip}:{port}{path}`.
    pub fn endpoint(&self, ip: &str) -> String {
        let auth = if self.auth.is_empty() { String::new() } else { format!("{}@", self.auth) };
        format!("{}{}{}:{}{}", self.scheme(), auth, ip, self.port, self.path)
    }

    /// Readiness probe target, without credentials.
    pub fn probe_url(&self, ip: &str) -> String {
        format!("{}{}:{}{}", self.scheme(), ip, self.port, self.path)
    }
}

/// Parse `K=V|K=V`. Entries without `=` or with an empty key or value are dropped.
pub fn split_key_value_string(s: &str) -> BTreeMap<String, String> {
    s.split('|')
        .filter_map(|item| item.split_once('='))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The `K:V` list form used for volume mounts.
pub fn split_key_value_list(s: &str) -> Vec<String> {
    split_key_value_string(s).into_iter().map(|(k, v)| format!("{k}:{v}")).collect()
}

fn parse_bool(v: &str) -> bool {
    v.trim().eq_ignore_ascii_case("true")
}

fn parse_num<T: FromStr>(name: &str, v: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    v.trim().parse::<T>().map_err(|e| anyhow!("{name}={v:?}: {e}"))
}

/// Upper bound for any single timing setting: one day.
pub const MAX_TIMING_MS: u64 = 86_400_000;

fn secs_to_ms(name: &str, v: &str) -> Result<u64> {
    let ms = parse_num::<u64>(name, v)?.saturating_mul(1_000);
    if ms > MAX_TIMING_MS {
        bail!("{name}={v:?}: exceeds {}s", MAX_TIMING_MS / 1_000);
    }
    Ok(ms)
}

impl RunConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: RunConfig = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Overlay settings found through `lookup` (normally the process environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |k: &str| lookup(k).filter(|v| !v.is_empty());

        if let Some(v) = get("IMAGE") {
            self.image = v;
        }
        if let Some(v) = get("META_TAG") {
            self.meta_tag = v;
        }
        if let Some(v) = get("RELEASE_TAG") {
            self.release_tag = v;
        }
        if let Some(v) = get("TAGS") {
            self.tags = v.split('|').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect();
        }
        if let Some(v) = get("NODE_NAME") {
            self.builder = v;
        }
        if let Some(v) = get("CI_OUTPUT_DIR") {
            self.output_root = v;
        }
        if let Some(v) = get("WORKER_CONCURRENCY") {
            self.worker_concurrency = parse_num("WORKER_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("CI_NATIVE_OVERRIDE") {
            self.native_override = parse_bool(&v);
        }

        if let Some(v) = get("DOCKER_ENV") {
            self.container.env = split_key_value_string(&v);
        }
        if let Some(v) = get("DOCKER_VOLUMES") {
            self.container.volumes = split_key_value_list(&v);
        }
        if let Some(v) = get("DOCKER_PRIVILEGED") {
            self.container.privileged = parse_bool(&v);
        }

        if let Some(v) = get("DOCKER_LOGS_TIMEOUT") {
            self.timing.startup_timeout_ms = secs_to_ms("DOCKER_LOGS_TIMEOUT", &v)?;
        }
        if let Some(v) = get("SBOM_TIMEOUT") {
            self.timing.sbom_timeout_ms = secs_to_ms("SBOM_TIMEOUT", &v)?;
        }
        if let Some(v) = get("DELAY_START") {
            self.timing.startup_delay_ms = secs_to_ms("DELAY_START", &v)?;
        }
        if let Some(v) = get("WEB_SCREENSHOT_TIMEOUT") {
            self.timing.screenshot_timeout_ms = secs_to_ms("WEB_SCREENSHOT_TIMEOUT", &v)?;
        }
        if let Some(v) = get("WEB_SCREENSHOT_DELAY") {
            self.timing.settle_delay_ms = secs_to_ms("WEB_SCREENSHOT_DELAY", &v)?;
        }

        if let Some(v) = get("WEB_SCREENSHOT") {
            self.web.screenshot = parse_bool(&v);
        }
        if let Some(v) = lookup("WEB_AUTH") {
            self.web.auth = v;
        }
        if let Some(v) = lookup("WEB_PATH") {
            self.web.path = v;
        }
        if let Some(v) = get("PORT") {
            self.web.port = parse_num("PORT", &v)?;
        }
        if let Some(v) = get("SSL") {
            self.web.ssl = parse_bool(&v);
        }

        if let Some(v) = get("S3_BUCKET") {
            self.publish.bucket = v;
        }
        if let Some(v) = get("S3_REGION") {
            self.publish.region = v;
        }
        if let Some(v) = get("S3_ENDPOINT") {
            self.publish.endpoint = Some(v);
        }
        if let Some(v) = get("ACCESS_KEY") {
            self.publish.access_key = Some(v);
        }
        if let Some(v) = get("SECRET_KEY") {
            self.publish.secret_key = Some(v);
        }
        if let Some(v) = get("DRY_RUN") {
            self.publish.dry_run = parse_bool(&v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CiError> {
        let missing = |what: &str| CiError::Config(format!("{what} is required"));
        if self.image.is_empty() {
            return Err(missing("IMAGE"));
        }
        if self.meta_tag.is_empty() {
            return Err(missing("META_TAG"));
        }
        if self.tags.is_empty() {
            return Err(missing("TAGS"));
        }
        if self.worker_concurrency == 0 {
            return Err(CiError::Config("WORKER_CONCURRENCY must be at least 1".into()));
        }
        if let Some((name, ms)) = self.timing.fields().into_iter().find(|(_, ms)| *ms > MAX_TIMING_MS) {
            return Err(CiError::Config(format!("timing.{name} = {ms} exceeds {MAX_TIMING_MS} ms")));
        }
        if !self.publish.dry_run {
            if self.publish.access_key.is_none() {
                return Err(missing("ACCESS_KEY"));
            }
            if self.publish.secret_key.is_none() {
                return Err(missing("SECRET_KEY"));
            }
        }
        Ok(())
    }

    /// Tags in configured order, duplicates removed.
    pub fn tag_list(&self) -> Vec<Tag> {
        let mut seen = std::collections::HashSet::new();
        self.tags.iter().filter(|t| seen.insert(t.as_str())).map(|t| Tag::new(t.as_str())).collect()
    }

    pub fn image_ref(&self, tag: &Tag) -> String {
        format!("{}:{}", self.image, tag)
    }

    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.output_root).to_string())
    }

    pub fn verdict_policy(&self) -> VerdictPolicy {
        VerdictPolicy { native_override: self.native_override }
    }

    /// Values that must never reach a log sink.
    pub fn secrets(&self) -> Vec<String> {
        [&self.publish.access_key, &self.publish.secret_key]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect()
    }
}
