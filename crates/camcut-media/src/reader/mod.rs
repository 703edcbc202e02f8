//! Chunked, cursor-advancing access to media sources.
//!
//! A source is a single file or a directory of parts played back to back.
//! Each source owns two independent cursors, one per track, and hands out
//! window-sized chunks tagged with a [`ChunkRead`] state.

mod pipe;
mod source;
mod track;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};
use crate::frame::{AudioBlock, Frame};

pub use pipe::{DecodeKind, FfmpegPartOpener, FfmpegPipe};
pub use source::SourceReader;
pub use track::{PartOpener, PartStream, TrackCursor};

/// Result of reading one window from a track.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkRead<T> {
    /// The full window was read.
    Complete(T),
    /// The track ran out mid-window; carries whatever was drained.
    Incomplete(T),
    /// The track was already exhausted before this read.
    Exhausted,
}

impl<T> ChunkRead<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// The payload, if any was read.
    pub fn into_inner(self) -> Option<T> {
        match self {
            Self::Complete(value) | Self::Incomplete(value) => Some(value),
            Self::Exhausted => None,
        }
    }

    pub fn as_ref(&self) -> ChunkRead<&T> {
        match self {
            Self::Complete(value) => ChunkRead::Complete(value),
            Self::Incomplete(value) => ChunkRead::Incomplete(value),
            Self::Exhausted => ChunkRead::Exhausted,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ChunkRead<U> {
        match self {
            Self::Complete(value) => ChunkRead::Complete(f(value)),
            Self::Incomplete(value) => ChunkRead::Incomplete(f(value)),
            Self::Exhausted => ChunkRead::Exhausted,
        }
    }
}

/// A readable media source as seen by the selection engine.
#[async_trait]
pub trait MediaSource: Send {
    /// Stable position of this source in the run's source list.
    fn index(&self) -> usize;

    /// Frame rate of the decoded video track.
    fn frame_rate(&self) -> f64;

    /// Sample rate of the decoded audio track.
    fn sample_rate(&self) -> u32;

    /// Read `round(round(fps) × duration)` frames.
    async fn read_video_chunk(&mut self, duration: f64) -> MediaResult<ChunkRead<Vec<Frame>>>;

    /// Read `round(sample_rate × duration)` sample frames.
    async fn read_audio_chunk(&mut self, duration: f64) -> MediaResult<ChunkRead<AudioBlock>>;

    /// Release all decode resources. Safe to call more than once.
    async fn close(&mut self) -> MediaResult<()>;
}

/// Resolve a source path into its ordered list of parts.
///
/// A file is its own single part. A directory contributes its regular,
/// non-hidden files sorted by name.
pub fn list_parts(path: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let path = path.as_ref();

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let mut parts = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_file() {
            parts.push(entry.path());
        }
    }

    if parts.is_empty() {
        return Err(MediaError::EmptySource(path.to_path_buf()));
    }

    parts.sort();
    Ok(parts)
}
