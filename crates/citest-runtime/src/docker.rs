use std::collections::BTreeMap;
use std::process::Command;

use serde_json::Value;
use tracing::debug;

use crate::types::{ContainerAttrs, ContainerHandle, ContainerRuntime, ExecOutput, LaunchSpec, RuntimeError};

/// Drives the `docker` CLI. Every call is a separate process, so one instance
/// can be shared by all worker threads.
#[derive(Clone, Debug)]
pub struct DockerCli {
    pub binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn output(&self, args: &[&str]) -> Result<std::process::Output, RuntimeError> {
        debug!(binary = %self.binary, ?args, "runtime call");
        Command::new(&self.binary).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RuntimeError::Unavailable(format!("{} not found on PATH", self.binary))
            } else {
                RuntimeError::Io(e)
            }
        })
    }

    fn run(&self, args: &[&str]) -> Result<String, RuntimeError> {
        let out = self.output(args)?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            if stderr.contains("No such container") || stderr.contains("No such object") {
                return Err(RuntimeError::NotFound(stderr));
            }
            return Err(RuntimeError::Command { args: args.join(" "), stderr });
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn inspect_json(&self, args: &[&str]) -> Result<Value, RuntimeError> {
        let raw = self.run(args)?;
        let v: Value = serde_json::from_str(&raw).map_err(|e| RuntimeError::Parse(e.to_string()))?;
        match v {
            Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
            _ => Err(RuntimeError::Parse(format!("empty inspect output for {:?}", args))),
        }
    }
}

/// Build `docker run` arguments for a detached container.
pub fn run_args(spec: &LaunchSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--detach".to_string()];
    if spec.privileged {
        args.push("--privileged".into());
    }
    for (k, v) in &spec.env {
        args.push("--env".into());
        args.push(format!("{k}={v}"));
    }
    for vol in &spec.volumes {
        args.push("--volume".into());
        args.push(vol.clone());
    }
    args.push(spec.image_ref.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Map `docker inspect` output of a container and its image onto [`ContainerAttrs`].
pub fn parse_attrs(container: &Value, image: Option<&Value>) -> ContainerAttrs {
    let labels: BTreeMap<String, String> = container["Config"]["Labels"]
        .as_object()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let net = &container["NetworkSettings"];
    let ip_address = net["Networks"]["bridge"]["IPAddress"]
        .as_str()
        .or_else(|| net["IPAddress"].as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    ContainerAttrs {
        labels,
        ip_address,
        image: container["Image"].as_str().unwrap_or_default().to_string(),
        image_size: image.and_then(|i| i["Size"].as_u64()),
        running: container["State"]["Running"].as_bool().unwrap_or(false),
    }
}

impl ContainerRuntime for DockerCli {
    fn ping(&self) -> Result<String, RuntimeError> {
        self.run(&["version", "--format", "{{.Server.Version}}"])
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))
    }

    fn start(&self, spec: &LaunchSpec) -> Result<ContainerHandle, RuntimeError> {
        let args = run_args(spec);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = self.run(&refs)?;
        if id.is_empty() {
            return Err(RuntimeError::Parse(format!("docker run returned no id for {}", spec.image_ref)));
        }
        Ok(ContainerHandle { id, image_ref: spec.image_ref.clone() })
    }

    fn logs(&self, container: &ContainerHandle) -> Result<String, RuntimeError> {
        let out = self.output(&["logs", &container.id])?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(RuntimeError::Command { args: format!("logs {}", container.id), stderr });
        }
        // the CLI splits the container's streams; keep both
        let mut blob = String::from_utf8_lossy(&out.stdout).into_owned();
        blob.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(blob)
    }

    fn exec(&self, container: &ContainerHandle, command: &[&str]) -> Result<ExecOutput, RuntimeError> {
        let mut args = vec!["exec", container.id.as_str()];
        args.extend_from_slice(command);
        let out = self.output(&args)?;
        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(ExecOutput { exit_code: out.status.code().map(i64::from).unwrap_or(-1), output })
    }

    fn inspect(&self, container: &ContainerHandle) -> Result<ContainerAttrs, RuntimeError> {
        let c = self.inspect_json(&["container", "inspect", &container.id])?;
        let image_id = c["Image"].as_str().unwrap_or_default().to_string();
        let image = if image_id.is_empty() {
            None
        } else {
            Some(self.inspect_json(&["image", "inspect", &image_id])?)
        };
        Ok(parse_attrs(&c, image.as_ref()))
    }

    fn remove(&self, container: &ContainerHandle, force: bool) -> Result<(), RuntimeError> {
        let mut args = vec!["rm"];
        if force {
            args.push("--force");
        }
        args.push(&container.id);
        match self.run(&args) {
            Ok(_) | Err(RuntimeError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_args_carry_env_volumes_and_command() {
        let mut spec = LaunchSpec::new("ghcr.io/anchore/syft:latest");
        spec.env.insert("PUID".into(), "1000".into());
        spec.volumes.push("/var/run/docker.sock:/var/run/docker.sock".into());
        spec.privileged = true;
        spec.command = vec!["linuxserver/test:amd64-1.0".into()];
        let args = run_args(&spec);
        assert_eq!(
            args,
            vec![
                "run",
                "--detach",
                "--privileged",
                "--env",
                "PUID=1000",
                "--volume",
                "/var/run/docker.sock:/var/run/docker.sock",
                "ghcr.io/anchore/syft:latest",
                "linuxserver/test:amd64-1.0",
            ]
        );
    }

    #[test]
    fn parses_labels_ip_and_size() {
        let c = json!({
            "Image": "sha256:abc",
            "State": {"Running": true},
            "Config": {"Labels": {"maintainer": "Roxedus,thespad", "org.opencontainers.image.version": "2.4.3.4248-ls7"}},
            "NetworkSettings": {"IPAddress": "", "Networks": {"bridge": {"IPAddress": "172.17.0.3"}}}
        });
        let i = json!({"Size": 275_930_000u64});
        let attrs = parse_attrs(&c, Some(&i));
        assert_eq!(attrs.labels["maintainer"], "Roxedus,thespad");
        assert_eq!(attrs.ip_address.as_deref(), Some("172.17.0.3"));
        assert_eq!(attrs.image_size, Some(275_930_000));
        assert!(attrs.running);
    }

    #[test]
    fn missing_network_and_labels_are_empty() {
        let attrs = parse_attrs(&json!({"Config": {"Labels": null}}), None);
        assert!(attrs.labels.is_empty());
        assert_eq!(attrs.ip_address, None);
        assert_eq!(attrs.image_size, None);
        assert!(!attrs.running);
    }
}
