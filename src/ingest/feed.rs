//! JSON-lines feed adapter
//!
//! The external chat extractor appends one JSON object per line to a file:
//!
//! ```text
//! {"id":"abc","timestamp_ms":1725000000000,"author":"alice","text":"hi"}
//! ```
//!
//! Each poll returns the complete lines appended since the previous poll. A
//! trailing line without a newline is left for the next poll. The read
//! position survives session recreation, and a file that shrank below it
//! is read again from the start. Lines that fail to decode are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::ingest::source::{ChatItem, ChatSource, SourceFactory};
use crate::utils::error::SourceError;

#[derive(Debug)]
pub struct JsonLinesFeedFactory {
    path: PathBuf,
    url: String,
    resume: Arc<AtomicU64>,
}

impl JsonLinesFeedFactory {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            resume: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl SourceFactory for JsonLinesFeedFactory {
    fn source_url(&self) -> String {
        self.url.clone()
    }

    fn create(&self) -> Result<Box<dyn ChatSource>, SourceError> {
        if !self.path.is_file() {
            return Err(SourceError::Create(format!(
                "feed {} does not exist",
                self.path.display()
            )));
        }
        Ok(Box::new(JsonLinesFeed {
            path: self.path.clone(),
            offset: self.resume.load(Ordering::SeqCst),
            resume: self.resume.clone(),
            terminated: false,
        }))
    }
}

#[derive(Debug)]
pub struct JsonLinesFeed {
    path: PathBuf,
    offset: u64,
    resume: Arc<AtomicU64>,
    terminated: bool,
}

impl JsonLinesFeed {
    fn read_new_lines(&mut self) -> Result<Vec<ChatItem>, SourceError> {
        let len = std::fs::metadata(&self.path)?.len();
        if len < self.offset {
            warn!(path = %self.path.display(), "feed shrank, reading from the start");
            self.offset = 0;
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(file);

        let mut items = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line)?;
            if n == 0 || line.last() != Some(&b'\n') {
                break;
            }
            self.offset += n as u64;

            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatItem>(trimmed) {
                Ok(item) => items.push(item),
                Err(e) => warn!("skipping malformed feed line: {e}"),
            }
        }

        self.resume.store(self.offset, Ordering::SeqCst);
        debug!(items = items.len(), offset = self.offset, "feed polled");
        Ok(items)
    }
}

impl ChatSource for JsonLinesFeed {
    fn is_alive(&mut self) -> bool {
        !self.terminated && self.path.is_file()
    }

    fn poll(&mut self) -> Result<Vec<ChatItem>, SourceError> {
        if self.terminated {
            return Err(SourceError::Poll("session terminated".to_string()));
        }
        self.read_new_lines()
    }

    fn terminate(&mut self) {
        self.terminated = true;
    }
}
