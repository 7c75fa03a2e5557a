use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use citest_core::Tag;

use crate::ansi::ansi_to_html;

pub trait ArtifactStore: Send + Sync {
    fn dir(&self) -> &Path;
    fn path_for(&self, name: &str) -> PathBuf;
    fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<PathBuf>;
    /// Every file in the output directory, sorted by name.
    fn files(&self) -> Result<Vec<PathBuf>>;

    fn write_text(&self, name: &str, text: &str) -> Result<PathBuf> {
        self.write_bytes(name, text.as_bytes())
    }

    /// Render terminal output for `tag` to `{tag}.{kind}.html` and return the artifact name.
    fn write_ansi_html(&self, tag: &Tag, kind: &str, raw: &str) -> Result<String> {
        let name = format!("{}.{}.html", tag.as_str(), kind);
        let title = format!("{} {}", tag.as_str(), kind);
        self.write_text(&name, &ansi_to_html(&title, raw))?;
        Ok(name)
    }
}

/// Output directory of one run: `{root}/{image}/{meta_tag}/`.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    pub root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn create_run_dir(output_root: &Path, image: &str, meta_tag: &str) -> Result<Self> {
        let dir = output_root.join(image).join(meta_tag);
        std::fs::create_dir_all(&dir).with_context(|| format!("create output dir {}", dir.display()))?;
        Ok(Self::new(dir))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn dir(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(name);
        std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut out = vec![];
        for entry in std::fs::read_dir(&self.root).with_context(|| format!("list {}", self.root.display()))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }
}
