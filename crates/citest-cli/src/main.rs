mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use citest_artifacts::{ArtifactStore, FsArtifactStore, FsReportRenderer, ReportRenderer};
use citest_browser::{ChromeCli, NoDisplay, ReqwestProbe, VirtualDisplay, Xvfb};
use citest_core::Tag;
use citest_publish::{AwsCliBlobStore, BlobStore, DirBlobStore, PublishTarget, Publisher};
use citest_runner::{doctor, Capabilities, CiError, Coordinator, RunConfig, Toolchain};
use citest_runtime::DockerCli;

const LOG_FILE: &str = "ci.log";

#[derive(Parser)]
#[command(name = "citest", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Test every tag of an image and publish the report
    Run {
        /// TOML settings; environment variables override them
        #[arg(long)]
        config: Option<PathBuf>,
        /// Render the report but do not upload it
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration and host tooling
    Doctor {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the platform a tag is built for
    Platform { tag: String },
}

fn log_level() -> String {
    std::env::var("CI_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(p) => {
            let mut cfg = RunConfig::load_from(p)?;
            cfg.apply_env(|k| std::env::var(k).ok())?;
            Ok(cfg)
        }
        None => RunConfig::from_env(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Run { config, dry_run } => {
            let mut cfg = load_config(config.as_deref())?;
            cfg.publish.dry_run |= dry_run;
            run(cfg)?;
        }
        Command::Doctor { config } => {
            logging::init(&log_level(), None, vec![])?;
            let cfg = load_config(config.as_deref())?;
            for line in doctor(&cfg, &DockerCli::default(), &Toolchain::default())? {
                println!("ok  {line}");
            }
            println!("OK");
        }
        Command::Platform { tag } => {
            println!("{}", Tag::new(tag).platform());
        }
    }

    Ok(())
}

fn run(cfg: RunConfig) -> Result<()> {
    cfg.validate()?;
    let store = Arc::new(FsArtifactStore::create_run_dir(&cfg.output_root(), &cfg.image, &cfg.meta_tag)?);
    let log_path = store.path_for(LOG_FILE);
    logging::init(&log_level(), Some(&log_path), cfg.secrets())?;
    info!(image = %cfg.image, meta_tag = %cfg.meta_tag, output = %store.dir().display(), "starting run");

    let display: Arc<dyn VirtualDisplay> = if std::env::var_os("DISPLAY").is_some() {
        Arc::new(NoDisplay)
    } else {
        Arc::new(Xvfb::default())
    };
    let caps = Capabilities {
        runtime: Arc::new(DockerCli::default()),
        browser: Arc::new(ChromeCli::default()),
        probe: Arc::new(ReqwestProbe::new(Duration::from_secs(10))?),
        display,
    };

    let report = Coordinator::new(cfg.clone(), caps, store.clone()).run()?;
    FsReportRenderer.render(&report, store.as_ref())?;
    publish(&cfg, &store.files()?, &log_path)?;

    if !report.passed() {
        let failed: Vec<&str> = report.failed_tags().into_iter().map(Tag::as_str).collect();
        bail!("{} {} failed: {}", cfg.image, cfg.meta_tag, failed.join(", "));
    }
    info!("all checks passed");
    Ok(())
}

fn publish(cfg: &RunConfig, files: &[PathBuf], log_path: &Path) -> Result<()> {
    let p = &cfg.publish;
    let store: Box<dyn BlobStore> = if p.dry_run {
        let root = cfg.output_root().join("dry-run");
        info!(root = %root.display(), "dry run, mirroring uploads locally");
        Box::new(DirBlobStore::new(root))
    } else {
        Box::new(AwsCliBlobStore::new(
            p.region.clone(),
            p.endpoint.clone(),
            p.access_key.clone().unwrap_or_default(),
            p.secret_key.clone().unwrap_or_default(),
        ))
    };
    let target = PublishTarget {
        bucket: p.bucket.clone(),
        image: cfg.image.clone(),
        meta_tag: cfg.meta_tag.clone(),
        release_tag: cfg.release_tag.clone(),
    };
    Publisher::new(store.as_ref(), target)
        .publish_with_diagnostics(files, Some(log_path))
        .map_err(|e| CiError::Publish(e.to_string()))?;
    Ok(())
}
