//! Output Capture
//!
//! Buffers emitted output in memory so it can be pushed into a cache entry
//! and replayed on later runs. Talks to the cache only through
//! [`CacheStore::push`] and [`CacheStore::fetch`].

use std::io::{self, Write};

use serde::ser::Error as _;
use tracing::debug;

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};

// == Output Capture ==
/// In-memory sink collecting everything written to it.
#[derive(Debug, Default)]
pub struct OutputCapture {
    buffer: Vec<u8>,
}

impl OutputCapture {
    /// Begins capturing into an empty buffer.
    pub fn start() -> Self {
        Self::default()
    }

    /// Bytes captured so far.
    pub fn captured(&self) -> &[u8] {
        &self.buffer
    }

    /// Stops capturing, stores the text under `store` and returns it.
    ///
    /// When `echo` is given the captured text is also written there, so the
    /// caller sees the output it would have seen without the cache.
    pub fn stop(self, store: &CacheStore, echo: Option<&mut dyn Write>) -> Result<String> {
        let text = String::from_utf8(self.buffer).map_err(|e| {
            CacheError::UnsupportedValue(serde_json::Error::custom(format!(
                "captured output is not valid UTF-8: {}",
                e
            )))
        })?;

        store.push(&text)?;

        if let Some(sink) = echo {
            sink.write_all(text.as_bytes()).map_err(CacheError::Output)?;
            sink.flush().map_err(CacheError::Output)?;
        }

        Ok(text)
    }
}

impl Write for OutputCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// == Replay Or Capture ==
/// Writes the cached output to `sink` if fresh; otherwise runs `produce`
/// against a fresh capture, caches what it wrote and echoes it to `sink`.
///
/// A failing producer caches nothing.
pub fn replay_or_capture<F>(store: &CacheStore, sink: &mut dyn Write, produce: F) -> Result<String>
where
    F: FnOnce(&mut OutputCapture) -> io::Result<()>,
{
    if let Some(text) = store.fetch::<String>()? {
        debug!(key = %store.storage_key(), "replaying cached output");
        sink.write_all(text.as_bytes()).map_err(CacheError::Output)?;
        sink.flush().map_err(CacheError::Output)?;
        return Ok(text);
    }

    let mut capture = OutputCapture::start();
    produce(&mut capture).map_err(CacheError::Output)?;
    capture.stop(store, Some(sink))
}
