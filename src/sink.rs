// Destinations for formatted usage records, chosen once from config.
// File: size-rotated line log. Pipeline: bounded channel to a downstream consumer.

use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

fn default_max_size_kb() -> u64 {
    100
}

fn default_max_backups() -> u32 {
    20
}

fn default_capacity() -> usize {
    64
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputConfig {
    File {
        path: String,
        #[serde(default = "default_max_size_kb")]
        max_size_kb: u64,
        #[serde(default = "default_max_backups")]
        max_backups: u32,
    },
    Pipeline {
        #[serde(default = "default_capacity")]
        capacity: usize,
    },
}

pub enum Sink {
    File(FileSink),
    Pipeline(PipelineSink),
}

impl Sink {
    /// Builds the configured sink. Pipeline sinks also return the consumer end.
    pub fn from_config(output: &OutputConfig) -> (Self, Option<mpsc::Receiver<String>>) {
        match output {
            OutputConfig::File {
                path,
                max_size_kb,
                max_backups,
            } => (
                Sink::File(FileSink::new(path, *max_size_kb, *max_backups)),
                None,
            ),
            OutputConfig::Pipeline { capacity } => {
                let (sink, rx) = PipelineSink::channel(*capacity);
                (Sink::Pipeline(sink), Some(rx))
            }
        }
    }

    pub async fn accept(&mut self, record: &str) -> anyhow::Result<()> {
        match self {
            Sink::File(sink) => sink.accept(record).await,
            Sink::Pipeline(sink) => sink.accept(record).await,
        }
    }
}

/// Largest accepted `max_size_kb`; the byte limit must fit in a u64.
pub const MAX_FILE_SIZE_KB: u64 = u64::MAX / 1024;

/// Appends one record per line. When a write would push the file past `max_size_kb`,
/// the file is rotated to `<path>.1` and older backups shift up, keeping `max_backups`.
///
/// Writes and rotation run on the blocking pool.
pub struct FileSink {
    inner: Arc<Mutex<RotatingFile>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, max_size_kb: u64, max_backups: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RotatingFile {
                path: path.into(),
                max_size_bytes: max_size_kb.saturating_mul(1024),
                max_backups,
                file: None,
                size: 0,
            })),
        }
    }

    pub async fn accept(&mut self, record: &str) -> anyhow::Result<()> {
        let inner = Arc::clone(&self.inner);
        let line = record.to_string();
        tokio::task::spawn_blocking(move || {
            let mut file = inner
                .lock()
                .map_err(|_| anyhow::anyhow!("file sink lock poisoned"))?;
            file.write_line(&line)
        })
        .await?
    }
}

struct RotatingFile {
    path: PathBuf,
    max_size_bytes: u64,
    max_backups: u32,
    file: Option<File>,
    size: u64,
}

impl RotatingFile {
    fn write_line(&mut self, record: &str) -> anyhow::Result<()> {
        let line_len = record.len() as u64 + 1;
        if self.file.is_none() {
            self.open()?;
        }
        if self.size > 0 && self.size.saturating_add(line_len) > self.max_size_bytes {
            self.rotate()?;
        }
        let Some(file) = self.file.as_mut() else {
            anyhow::bail!("file sink {} is not open", self.path.display());
        };
        writeln!(file, "{}", record)?;
        file.flush()?;
        self.size += line_len;
        Ok(())
    }

    fn open(&mut self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> anyhow::Result<()> {
        self.file = None;
        if self.max_backups == 0 {
            std::fs::remove_file(&self.path)?;
        } else {
            let oldest = self.backup_path(self.max_backups);
            if oldest.exists() {
                std::fs::remove_file(&oldest)?;
            }
            for n in (1..self.max_backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    std::fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            std::fs::rename(&self.path, self.backup_path(1))?;
        }
        tracing::debug!(path = %self.path.display(), "file sink rotated");
        self.open()
    }
}

/// Hands records to a downstream consumer over a bounded channel (back-pressure on full).
pub struct PipelineSink {
    tx: mpsc::Sender<String>,
}

impl PipelineSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end for the downstream consumer.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn accept(&mut self, record: &str) -> anyhow::Result<()> {
        self.tx
            .send(record.to_string())
            .await
            .map_err(|_| anyhow::anyhow!("pipeline consumer closed"))
    }
}
