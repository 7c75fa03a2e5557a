use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const REMOVED: &str = "(removed)";

/// Replaces credentials in log output.
#[derive(Clone, Debug, Default)]
pub struct Redactor {
    secrets: Arc<Vec<String>>,
}

impl Redactor {
    pub fn new(secrets: Vec<String>) -> Self {
        let secrets = secrets.into_iter().filter(|s| !s.is_empty()).collect();
        Self { secrets: Arc::new(secrets) }
    }

    pub fn redact(&self, text: &str) -> String {
        self.secrets.iter().fold(text.to_string(), |acc, s| acc.replace(s.as_str(), REMOVED))
    }
}

/// Buffers one event and writes it, redacted, when dropped.
pub struct RedactingWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
    redactor: Redactor,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W, redactor: Redactor) -> Self {
        Self { inner, buf: Vec::new(), redactor }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let text = self.redactor.redact(&String::from_utf8_lossy(&self.buf));
        let _ = self.inner.write_all(text.as_bytes());
        let _ = self.inner.flush();
    }
}

pub struct RedactingMakeWriter<M> {
    inner: M,
    redactor: Redactor,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M, redactor: Redactor) -> Self {
        Self { inner, redactor }
    }
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for RedactingMakeWriter<M> {
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(self.inner.make_writer(), self.redactor.clone())
    }
}

/// Install the global subscriber: stderr plus, when given, a plain-text log file.
/// `RUST_LOG` wins over `level` when set.
pub fn init(level: &str, log_file: Option<&Path>, secrets: Vec<String>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?,
    };
    let redactor = Redactor::new(secrets);

    let stderr = fmt::layer()
        .with_thread_names(true)
        .with_writer(RedactingMakeWriter::new(io::stderr, redactor.clone()));
    let file = match log_file {
        Some(path) => {
            let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_thread_names(true)
                    .with_writer(RedactingMakeWriter::new(Mutex::new(f), redactor)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .context("install log subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn secrets_are_replaced() {
        let r = Redactor::new(vec!["AKIA123".into(), String::new(), "s3cr3t".into()]);
        assert_eq!(r.redact("key=AKIA123 secret=s3cr3t"), "key=(removed) secret=(removed)");
        assert_eq!(r.redact("nothing here"), "nothing here");
    }

    #[test]
    fn writer_flushes_redacted_text_on_drop() {
        let mut out = Vec::new();
        {
            let mut w = RedactingWriter::new(&mut out, Redactor::new(vec!["hunter2".into()]));
            write!(w, "password is hun").unwrap();
            write!(w, "ter2").unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "password is (removed)");
    }

    #[test]
    fn log_file_never_sees_credentials() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ci.log");
        let file = File::create(&path).unwrap();
        let subscriber = fmt()
            .with_ansi(false)
            .with_writer(RedactingMakeWriter::new(Mutex::new(file), Redactor::new(vec!["AKIA123".into()])))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(access_key = "AKIA123", "uploading");
        });
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("uploading"));
        assert!(text.contains("(removed)"));
        assert!(!text.contains("AKIA123"));
    }
}
