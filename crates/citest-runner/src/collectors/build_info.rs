use std::time::Instant;

use tracing::{info, warn};

use citest_core::BuildInfo;
use citest_runtime::{ContainerAttrs, ContainerHandle};

use super::{TagContext, BUILD_INFO_TEST};
use crate::error::CiError;

const VERSION_LABEL: &str = "org.opencontainers.image.version";
const CREATED_LABEL: &str = "org.opencontainers.image.created";
const MAINTAINER_LABEL: &str = "maintainer";

/// Build metadata from the container's labels and its image size.
pub fn build_info_from_attrs(attrs: &ContainerAttrs, builder: &str, tag: &str, image: &str) -> Result<BuildInfo, String> {
    let label = |key: &str| attrs.labels.get(key).cloned().ok_or_else(|| format!("missing label {key}"));
    let size = attrs.image_size.ok_or_else(|| "image size unavailable".to_string())?;
    Ok(BuildInfo {
        version: label(VERSION_LABEL)?,
        created: label(CREATED_LABEL)?,
        size: format!("{:.2}MB", size as f64 / 1_000_000.0),
        maintainer: label(MAINTAINER_LABEL)?,
        builder: builder.to_string(),
        tag: tag.to_string(),
        image: image.to_string(),
    })
}

pub fn collect_build_info(ctx: &TagContext, container: &ContainerHandle) -> Result<BuildInfo, CiError> {
    let started = Instant::now();
    let cfg = &ctx.config;
    let attrs = ctx
        .runtime
        .inspect(container)
        .map_err(|e| ctx.fail(BUILD_INFO_TEST, e.to_string(), started))?;
    match build_info_from_attrs(&attrs, &cfg.builder, ctx.tag.as_str(), &cfg.image) {
        Ok(info) => {
            info!(tag = %ctx.tag, version = %info.version, size = %info.size, "build info collected");
            ctx.pass(BUILD_INFO_TEST, started);
            Ok(info)
        }
        Err(message) => {
            warn!(tag = %ctx.tag, "build info unavailable: {message}");
            Err(ctx.fail(BUILD_INFO_TEST, message, started))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> ContainerAttrs {
        let mut a = ContainerAttrs { image_size: Some(123_456_789), ..Default::default() };
        a.labels.insert(VERSION_LABEL.into(), "1.24-ls10".into());
        a.labels.insert(CREATED_LABEL.into(), "2024-01-01T00:00:00Z".into());
        a.labels.insert(MAINTAINER_LABEL.into(), "someone".into());
        a
    }

    #[test]
    fn maps_labels_and_formats_size() {
        let info = build_info_from_attrs(&attrs(), "node-1", "amd64-1.24", "linuxserver/nginx").unwrap();
        assert_eq!(info.version, "1.24-ls10");
        assert_eq!(info.size, "123.46MB");
        assert_eq!(info.builder, "node-1");
        assert_eq!(info.image, "linuxserver/nginx");
    }

    #[test]
    fn missing_label_is_an_error() {
        let mut a = attrs();
        a.labels.remove(MAINTAINER_LABEL);
        let err = build_info_from_attrs(&a, "-", "t", "i").unwrap_err();
        assert!(err.contains("maintainer"));
    }
}
