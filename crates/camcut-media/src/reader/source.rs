//! SourceReader: one feed, single file or directory of parts.

use async_trait::async_trait;
use camcut_models::OutputFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::pipe::{DecodeKind, FfmpegPartOpener};
use super::track::{PartOpener, TrackCursor};
use super::{list_parts, ChunkRead, MediaSource};
use crate::error::{MediaError, MediaResult};
use crate::frame::{AudioBlock, Frame};
use crate::probe::probe_source;

/// Chunked reader over one source.
///
/// Both tracks are decoded into the run's [`OutputFormat`], so frame and
/// sample rates are those of the output rather than of the recording.
pub struct SourceReader<O: PartOpener = FfmpegPartOpener> {
    index: usize,
    path: PathBuf,
    format: OutputFormat,
    video: TrackCursor<O>,
    audio: TrackCursor<O>,
    closed: bool,
}

impl SourceReader<FfmpegPartOpener> {
    /// Open a file or part directory. Every part is probed up front, so a
    /// broken part fails here rather than mid-run.
    pub async fn open(index: usize, path: impl AsRef<Path>, format: OutputFormat) -> MediaResult<Self> {
        let path = path.as_ref();
        let part_paths = list_parts(path)?;

        let mut parts = Vec::with_capacity(part_paths.len());
        for part in &part_paths {
            parts.push(probe_source(part).await?);
        }

        let duration: f64 = parts.iter().map(|p| p.duration).sum();
        info!(
            source_index = index,
            path = %path.display(),
            parts = parts.len(),
            duration_secs = duration,
            source_fps = parts[0].fps,
            "Source opened"
        );

        Ok(Self::from_parts(
            index,
            path,
            part_paths,
            FfmpegPartOpener::new(DecodeKind::Video, format),
            FfmpegPartOpener::new(DecodeKind::Audio, format),
            format,
        ))
    }
}

impl<O: PartOpener> SourceReader<O> {
    /// Assemble a reader from already-resolved parts and openers.
    pub fn from_parts(
        index: usize,
        path: impl AsRef<Path>,
        part_paths: Vec<PathBuf>,
        video_opener: O,
        audio_opener: O,
        format: OutputFormat,
    ) -> Self {
        Self {
            index,
            path: path.as_ref().to_path_buf(),
            format,
            video: TrackCursor::new(part_paths.clone(), video_opener),
            audio: TrackCursor::new(part_paths, audio_opener),
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<O: PartOpener> MediaSource for SourceReader<O> {
    fn index(&self) -> usize {
        self.index
    }

    fn frame_rate(&self) -> f64 {
        self.format.frame_rate() as f64
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    async fn read_video_chunk(&mut self, duration: f64) -> MediaResult<ChunkRead<Vec<Frame>>> {
        if self.video.is_exhausted() {
            return Ok(ChunkRead::Exhausted);
        }

        let target = self.format.frames_per_window(duration);
        if target == 0 {
            // An empty Complete chunk would never exhaust the source
            return Err(MediaError::internal(format!(
                "window of {duration}s is shorter than one frame at {} fps",
                self.format.frame_rate()
            )));
        }
        let frame_bytes = self.format.frame_bytes();
        let mut frames = Vec::with_capacity(target);

        // Frame by frame keeps each allocation to one frame
        while frames.len() < target {
            let data = self.video.read_units(frame_bytes, 1).await?;
            if data.is_empty() {
                break;
            }
            frames.push(Frame::from_rgb(self.format.width, self.format.height, data)?);
        }

        if frames.len() == target {
            Ok(ChunkRead::Complete(frames))
        } else {
            debug!(
                source_index = self.index,
                frames = frames.len(),
                target,
                "Video track exhausted"
            );
            Ok(ChunkRead::Incomplete(frames))
        }
    }

    async fn read_audio_chunk(&mut self, duration: f64) -> MediaResult<ChunkRead<AudioBlock>> {
        if self.audio.is_exhausted() {
            return Ok(ChunkRead::Exhausted);
        }

        let target = self.format.samples_per_window(duration);
        if target == 0 {
            return Err(MediaError::internal(format!(
                "window of {duration}s is shorter than one sample at {} Hz",
                self.format.sample_rate
            )));
        }
        let bytes = self
            .audio
            .read_units(self.format.sample_frame_bytes(), target)
            .await?;
        let block = AudioBlock::from_le_bytes(self.format.sample_rate, self.format.channels, &bytes);

        if block.frame_count() == target {
            Ok(ChunkRead::Complete(block))
        } else {
            Ok(ChunkRead::Incomplete(block))
        }
    }

    async fn close(&mut self) -> MediaResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Close both tracks even if the first fails
        let video = self.video.close().await;
        let audio = self.audio.close().await;
        debug!(source_index = self.index, "Source closed");
        video.and(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::super::track::testing::MemoryOpener;
    use super::*;

    /// 2x1 frames at 2 fps, 1 Hz mono audio: one window of 1s is 2 frames
    /// (12 bytes) and 1 sample (2 bytes).
    fn tiny_format() -> OutputFormat {
        OutputFormat {
            width: 2,
            height: 1,
            fps: 2.0,
            sample_rate: 1,
            channels: 1,
        }
    }

    fn reader(
        video: &[(&'static str, Vec<u8>)],
        audio: &[(&'static str, Vec<u8>)],
    ) -> (SourceReader<MemoryOpener>, MemoryOpener, MemoryOpener) {
        let video_opener = MemoryOpener::new(video.iter().cloned());
        let audio_opener = MemoryOpener::new(audio.iter().cloned());
        let mut names: Vec<&str> = video.iter().map(|(n, _)| *n).collect();
        names.sort();
        let reader = SourceReader::from_parts(
            3,
            "cams/3",
            names.into_iter().map(PathBuf::from).collect(),
            video_opener.clone(),
            audio_opener.clone(),
            tiny_format(),
        );
        (reader, video_opener, audio_opener)
    }

    #[tokio::test]
    async fn test_single_file_chunks() {
        // 3 frames and 1 sample: one full window, then a short one
        let (mut source, _, _) = reader(&[("a", vec![5; 18])], &[("a", vec![1, 0])]);
        assert_eq!(source.index(), 3);
        assert_eq!(source.frame_rate(), 2.0);

        let first = source.read_video_chunk(1.0).await.unwrap();
        assert!(first.is_complete());
        assert_eq!(first.into_inner().unwrap().len(), 2);

        match source.read_video_chunk(1.0).await.unwrap() {
            ChunkRead::Incomplete(frames) => assert_eq!(frames.len(), 1),
            other => panic!("expected incomplete, got {:?}", other.map(|f| f.len())),
        }
        assert_eq!(source.read_video_chunk(1.0).await.unwrap(), ChunkRead::Exhausted);

        let audio = source.read_audio_chunk(1.0).await.unwrap();
        assert_eq!(audio, ChunkRead::Complete(AudioBlock::new(1, 1, vec![1])));
        match source.read_audio_chunk(1.0).await.unwrap() {
            ChunkRead::Incomplete(block) => assert!(block.is_empty()),
            _ => panic!("expected drained audio"),
        }
    }

    #[tokio::test]
    async fn test_composite_continues_across_parts() {
        // Part 1 holds 1 frame, part 2 holds 3: the first window spans both
        let (mut source, video, _) = reader(
            &[("p1", vec![1; 6]), ("p2", vec![2; 18])],
            &[("p1", vec![0; 2]), ("p2", vec![0; 2])],
        );

        let frames = source.read_video_chunk(1.0).await.unwrap().into_inner().unwrap();
        assert_eq!(frames[0].data, vec![1; 6]);
        assert_eq!(frames[1].data, vec![2; 6]);

        assert!(source.read_video_chunk(1.0).await.unwrap().is_complete());
        assert!(!source.read_video_chunk(1.0).await.unwrap().is_complete());
        assert_eq!(video.open_streams(), 0);

        // Audio: 1 sample per part, 1 sample per window
        assert!(source.read_audio_chunk(1.0).await.unwrap().is_complete());
        assert!(source.read_audio_chunk(1.0).await.unwrap().is_complete());
        assert!(!source.read_audio_chunk(1.0).await.unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_window_shorter_than_a_frame_is_rejected() {
        let (mut source, _, _) = reader(&[("a", vec![0; 24])], &[("a", vec![0; 2])]);

        assert!(source.read_video_chunk(0.1).await.is_err());
        assert!(source.read_audio_chunk(0.1).await.is_err());
        // Nothing was consumed
        assert!(source.read_video_chunk(1.0).await.unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_tracks_advance_independently() {
        let (mut source, _, _) = reader(&[("a", vec![0; 24])], &[("a", vec![0; 2])]);

        assert!(source.read_video_chunk(1.0).await.unwrap().is_complete());
        assert!(source.read_video_chunk(1.0).await.unwrap().is_complete());
        assert!(source.read_audio_chunk(1.0).await.unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_close_releases_nested_tracks() {
        let (mut source, video, audio) = reader(
            &[("p1", vec![0; 60]), ("p2", vec![0; 60])],
            &[("p1", vec![0; 20]), ("p2", vec![0; 20])],
        );

        source.read_video_chunk(1.0).await.unwrap();
        source.read_audio_chunk(1.0).await.unwrap();
        assert_eq!(video.open_streams(), 1);
        assert_eq!(audio.open_streams(), 1);

        source.close().await.unwrap();
        source.close().await.unwrap();
        assert_eq!(video.open_streams(), 0);
        assert_eq!(audio.open_streams(), 0);
        assert_eq!(source.read_video_chunk(1.0).await.unwrap(), ChunkRead::Exhausted);
    }
}
