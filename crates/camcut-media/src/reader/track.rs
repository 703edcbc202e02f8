//! Track cursor over a sequence of part streams.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::MediaResult;

/// A byte stream of decoded data for one part of one track.
#[async_trait]
pub trait PartStream: Send {
    /// Fill `buf` as far as the stream allows. Returns the number of bytes
    /// written; anything short of `buf.len()` means end of stream.
    async fn read_fill(&mut self, buf: &mut [u8]) -> MediaResult<usize>;

    /// Release the stream. Safe to call more than once.
    async fn close(&mut self) -> MediaResult<()>;
}

/// Opens the decoded stream of one part.
#[async_trait]
pub trait PartOpener: Send + Sync {
    type Stream: PartStream;

    async fn open(&self, part: &Path) -> MediaResult<Self::Stream>;
}

/// Read cursor over one track of a (possibly multi-part) source.
///
/// Parts are opened lazily and closed as soon as they end, so at most one
/// part stream per track is open at a time. Once a read comes up short the
/// cursor is exhausted for good.
pub struct TrackCursor<O: PartOpener> {
    parts: Vec<PathBuf>,
    opener: O,
    next_part: usize,
    current: Option<O::Stream>,
    exhausted: bool,
}

impl<O: PartOpener> TrackCursor<O> {
    pub fn new(parts: Vec<PathBuf>, opener: O) -> Self {
        Self {
            parts,
            opener,
            next_part: 0,
            current: None,
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Read up to `count` whole units of `unit_bytes` each, continuing across
    /// part boundaries. A trailing partial unit at the end of a part is dropped.
    ///
    /// Returns fewer than `count` units only when the last part has ended,
    /// after which the cursor is exhausted.
    pub async fn read_units(&mut self, unit_bytes: usize, count: usize) -> MediaResult<Vec<u8>> {
        let want = unit_bytes * count;
        if self.exhausted || want == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; want];
        let mut filled = 0;

        while filled < want {
            if self.current.is_none() {
                if self.next_part >= self.parts.len() {
                    self.exhausted = true;
                    break;
                }
                let part = self.parts[self.next_part].clone();
                self.next_part += 1;
                debug!(part = %part.display(), "Opening part");
                self.current = Some(self.opener.open(&part).await?);
            }
            let Some(stream) = self.current.as_mut() else {
                break;
            };

            let n = stream.read_fill(&mut buf[filled..]).await?;
            filled += n;

            if filled < want {
                // Part ended mid-read: realign to a unit boundary, move on
                filled -= filled % unit_bytes;
                if let Some(mut ended) = self.current.take() {
                    ended.close().await?;
                }
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    /// Close the open part stream, if any, and mark the track exhausted.
    pub async fn close(&mut self) -> MediaResult<()> {
        self.exhausted = true;
        self.next_part = self.parts.len();
        if let Some(mut stream) = self.current.take() {
            stream.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory part stream that hands out at most `step` bytes per call.
    pub struct MemoryStream {
        data: Vec<u8>,
        pos: usize,
        step: usize,
        open: Arc<AtomicUsize>,
        closed: bool,
    }

    #[async_trait]
    impl PartStream for MemoryStream {
        async fn read_fill(&mut self, buf: &mut [u8]) -> MediaResult<usize> {
            let mut written = 0;
            while written < buf.len() && self.pos < self.data.len() {
                let n = self
                    .step
                    .min(buf.len() - written)
                    .min(self.data.len() - self.pos);
                buf[written..written + n].copy_from_slice(&self.data[self.pos..self.pos + n]);
                written += n;
                self.pos += n;
            }
            Ok(written)
        }

        async fn close(&mut self) -> MediaResult<()> {
            if !self.closed {
                self.closed = true;
                self.open.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    /// Opener serving part contents from a map, counting open streams.
    #[derive(Clone, Default)]
    pub struct MemoryOpener {
        pub parts: HashMap<PathBuf, Vec<u8>>,
        pub open: Arc<AtomicUsize>,
        pub step: usize,
    }

    impl MemoryOpener {
        pub fn new(parts: impl IntoIterator<Item = (&'static str, Vec<u8>)>) -> Self {
            Self {
                parts: parts
                    .into_iter()
                    .map(|(name, data)| (PathBuf::from(name), data))
                    .collect(),
                open: Arc::new(AtomicUsize::new(0)),
                step: 7,
            }
        }

        pub fn open_streams(&self) -> usize {
            self.open.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PartOpener for MemoryOpener {
        type Stream = MemoryStream;

        async fn open(&self, part: &Path) -> MediaResult<MemoryStream> {
            let data = self.parts.get(part).cloned().unwrap_or_default();
            self.open.fetch_add(1, Ordering::SeqCst);
            Ok(MemoryStream {
                data,
                pos: 0,
                step: self.step,
                open: self.open.clone(),
                closed: false,
            })
        }
    }
}
