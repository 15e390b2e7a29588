//! Line sources: where a job's input lines come from.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::io;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Ordered, finite stream of lines. An `Err` item aborts the file.
pub type LineStream = BoxStream<'static, io::Result<String>>;

#[async_trait]
pub trait LineSource: Send + Sync {
    /// Open `file` for reading; `Ok(None)` when it does not exist
    async fn open(&self, file: &str) -> io::Result<Option<LineStream>>;
}

/// Reads files from a directory on disk, one line at a time
pub struct DirLineSource {
    root: PathBuf,
}

impl DirLineSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl LineSource for DirLineSource {
    async fn open(&self, file: &str) -> io::Result<Option<LineStream>> {
        let path = self.root.join(file);
        let handle = match File::open(&path).await {
            Ok(handle) => handle,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Input file not found");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let lines = BufReader::new(handle).lines();
        let stream = stream::unfold(Some(lines), |state| async move {
            let mut lines = state?;
            match lines.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(lines))),
                Ok(None) => None,
                // yield the error once, then end the stream
                Err(e) => Some((Err(e), None)),
            }
        });
        Ok(Some(stream.boxed()))
    }
}

/// Serves fixed in-memory contents
#[cfg(test)]
#[derive(Default, Clone)]
pub struct MemoryLineSource {
    files: std::collections::HashMap<String, Vec<String>>,
}

#[cfg(test)]
impl MemoryLineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file<I, S>(mut self, name: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files
            .insert(name.to_string(), lines.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
#[async_trait]
impl LineSource for MemoryLineSource {
    async fn open(&self, file: &str) -> io::Result<Option<LineStream>> {
        Ok(self
            .files
            .get(file)
            .map(|lines| stream::iter(lines.clone().into_iter().map(Ok)).boxed()))
    }
}
