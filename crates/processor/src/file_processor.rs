//! Line counting with encoding fallback

use crate::encoding::EncodingChain;
use chrono::Utc;
use dropwatch_core::error::{Error, Result};
use dropwatch_core::{FileRecord, WorkerConfig};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, trace};

/// Why a file could not be analysed
///
/// Both variants end up as a `FAILED` record; neither is retried.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Could not decode file with any of the encodings: {}", tried.join(", "))]
    Undecodable { tried: Vec<String> },

    #[error("Failed to read file: {0}")]
    Read(#[from] io::Error),
}

impl From<ProcessError> for Error {
    fn from(err: ProcessError) -> Self {
        Error::processing(err.to_string())
    }
}

/// Successful analysis of a file's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCount {
    pub lines: u64,
    /// Configured label of the encoding that decoded the content
    pub encoding: String,
}

/// Number of lines in `content`
///
/// `\n`, `\r\n` and a lone `\r` each end a line, and trailing text without
/// a final line break counts as one more line. Empty content has zero lines.
pub fn count_lines(content: &str) -> u64 {
    let bytes = content.as_bytes();
    let breaks = bytes
        .iter()
        .enumerate()
        .filter(|(i, b)| match **b {
            b'\n' => true,
            b'\r' => bytes.get(i + 1) != Some(&b'\n'),
            _ => false,
        })
        .count() as u64;

    match bytes.last() {
        None | Some(b'\n') | Some(b'\r') => breaks,
        Some(_) => breaks + 1,
    }
}

/// Reads files and turns them into [`FileRecord`]s
#[derive(Debug, Clone)]
pub struct FileProcessor {
    encodings: EncodingChain,
}

impl FileProcessor {
    /// Processor using the configured encoding list
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        Ok(Self::with_encodings(EncodingChain::from_labels(
            &config.encodings,
        )?))
    }

    pub fn with_encodings(encodings: EncodingChain) -> Self {
        Self { encodings }
    }

    /// Decode `bytes` and count their lines
    pub fn analyze(&self, bytes: &[u8]) -> std::result::Result<LineCount, ProcessError> {
        match self.encodings.decode(bytes) {
            Some((label, text)) => Ok(LineCount {
                lines: count_lines(&text),
                encoding: label.to_string(),
            }),
            None => Err(ProcessError::Undecodable {
                tried: self.encodings.labels(),
            }),
        }
    }

    /// Read the file at `path` and analyse it
    pub async fn read_and_analyze(
        &self,
        path: &Path,
    ) -> std::result::Result<LineCount, ProcessError> {
        let bytes = tokio::fs::read(path).await?;
        trace!(path = %path.display(), bytes = bytes.len(), "Read file");
        self.analyze(&bytes)
    }

    /// Build the record for one processing attempt
    ///
    /// Never fails: unreadable or undecodable files produce a `FAILED` record.
    pub async fn process(&self, path: &Path) -> FileRecord {
        let started = Utc::now();
        let path_string = path.to_string_lossy().into_owned();

        match self.read_and_analyze(path).await {
            Ok(count) => {
                debug!(
                    path = %path.display(),
                    lines = count.lines,
                    encoding = %count.encoding,
                    "File analysed"
                );
                FileRecord::ok(path_string, count.lines, started, Utc::now())
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "File could not be analysed");
                FileRecord::failed(path_string, e.to_string(), started)
            }
        }
    }
}
