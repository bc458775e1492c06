use std::path::Path;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::detection::FrameLandmarks;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid frame at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Landmark detector collaborator. `Ok(None)` means the source is exhausted.
#[axum::async_trait]
pub trait LandmarkSource: Send {
    async fn next_frame(&mut self) -> Result<Option<FrameLandmarks>, SourceError>;
}

/// Replays a JSON-lines recording, one `FrameLandmarks` per line.
pub struct ReplaySource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl ReplaySource<BufReader<File>> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path).await?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> ReplaySource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

#[axum::async_trait]
impl<R: AsyncBufRead + Unpin + Send> LandmarkSource for ReplaySource<R> {
    async fn next_frame(&mut self) -> Result<Option<FrameLandmarks>, SourceError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|source| SourceError::Parse {
                    line: self.line_no,
                    source,
                });
        }
        Ok(None)
    }
}

/// In-memory source, mostly for driving sessions from synthetic sequences.
pub struct IterSource<I> {
    frames: I,
}

impl<I> IterSource<I> {
    pub fn new<T>(frames: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            frames: frames.into_iter(),
        }
    }
}

#[axum::async_trait]
impl<I> LandmarkSource for IterSource<I>
where
    I: Iterator<Item = FrameLandmarks> + Send,
{
    async fn next_frame(&mut self) -> Result<Option<FrameLandmarks>, SourceError> {
        Ok(self.frames.next())
    }
}
