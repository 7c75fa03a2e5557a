use anyhow::{anyhow, Result};

use citest_browser::{ChromeCli, Xvfb};
use citest_runtime::ContainerRuntime;

use crate::util::{find_on_path, run_cmd};
use crate::RunConfig;

/// Host tools a run shells out to, by the name it invokes them with.
#[derive(Clone, Debug)]
pub struct Toolchain {
    pub browser: String,
    pub display: String,
    pub uploader: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self { browser: ChromeCli::default().binary, display: Xvfb::default().binary, uploader: "aws".into() }
    }
}

/// Check configuration and host tooling before a run. Returns one line per
/// passed check.
pub fn doctor(cfg: &RunConfig, runtime: &dyn ContainerRuntime, tools: &Toolchain) -> Result<Vec<String>> {
    let mut ok = vec![];

    cfg.validate()?;
    ok.push(format!("config: {} ({} tags)", cfg.image, cfg.tag_list().len()));

    let version = runtime.ping().map_err(|e| anyhow!("container runtime unreachable: {e}"))?;
    ok.push(format!("container runtime: {version}"));

    if cfg.web.screenshot {
        for tool in [&tools.browser, &tools.display] {
            let path = find_on_path(tool).ok_or_else(|| anyhow!("{tool} not found on PATH; required for screenshots"))?;
            ok.push(format!("{tool}: {}", path.display()));
        }
    }

    if !cfg.publish.dry_run {
        let version = run_cmd(&tools.uploader, &["--version"])
            .map_err(|e| anyhow!("{} is required to publish reports: {e}", tools.uploader))?;
        ok.push(format!("{}: {version}", tools.uploader));
    }

    Ok(ok)
}
