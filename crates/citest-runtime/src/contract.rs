use anyhow::{anyhow, Context, Result};

use crate::types::{ContainerRuntime, LaunchSpec};

/// Shared runtime contract suite, run against any [`ContainerRuntime`].
///
/// `image_ref` must ship `sh` and `sleep`, e.g. `busybox`.
pub fn run_runtime_contract_suite(runtime: &dyn ContainerRuntime, image_ref: &str) -> Result<()> {
    runtime.ping().context("ping")?;

    let mut spec = LaunchSpec::new(image_ref);
    spec.env.insert("CONTRACT".into(), "yes".into());
    spec.command = vec!["sh".into(), "-c".into(), "echo contract-ready; sleep 60".into()];
    let c = runtime.start(&spec).context("start")?;

    let result = (|| -> Result<()> {
        let mut seen = false;
        for _ in 0..20 {
            if runtime.logs(&c)?.contains("contract-ready") {
                seen = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(250));
        }
        if !seen {
            return Err(anyhow!("startup line never appeared in logs"));
        }

        let out = runtime.exec(&c, &["sh", "-c", "echo $CONTRACT"])?;
        if out.exit_code != 0 || out.output.trim() != "yes" {
            return Err(anyhow!("exec did not see launch env: {:?}", out));
        }

        let attrs = runtime.inspect(&c)?;
        if !attrs.running {
            return Err(anyhow!("container not running after start"));
        }
        Ok(())
    })();

    runtime.remove(&c, true).context("remove")?;
    // second removal must be tolerated
    runtime.remove(&c, true).context("remove twice")?;
    result
}
