//! In-memory sources, scorers and sinks for driving the engine without
//! FFmpeg or a model.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use camcut_director::{
    ArtifactRole, DirectorConfig, DirectorError, DirectorResult, EngineSettings, FinishRequest,
    OutputBackend, SourceOpener, TempArtifacts, WindowSink,
};
use camcut_media::{AudioBlock, ChunkRead, ContentScorer, Frame, MediaError, MediaResult, MediaSource};
use camcut_models::{
    frames_per_window, samples_per_window, Detection, OutputFormat, Region, ScoringClasses,
    CLASS_PERSON,
};

pub const FPS: f64 = 5.0;
pub const SAMPLE_RATE: u32 = 10;
pub const WINDOW: f64 = 2.0;

pub fn settings(target_secs: f64) -> EngineSettings {
    EngineSettings {
        window_secs: WINDOW,
        target_secs,
        classes: ScoringClasses::default(),
    }
}

pub fn frames_per(window: f64) -> usize {
    frames_per_window(FPS, window)
}

pub fn samples_per(window: f64) -> usize {
    samples_per_window(SAMPLE_RATE, window)
}

/// A source with a fixed number of full windows per track.
///
/// Each 1x1 frame carries `[source, window, 0]`, so scorers and sinks can
/// tell where it came from.
pub struct StubSource {
    index: usize,
    video_windows: usize,
    audio_windows: usize,
    tail_frames: usize,
    video_read: usize,
    audio_read: usize,
    video_done: bool,
    audio_done: bool,
    pub video_calls: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl StubSource {
    pub fn new(index: usize, windows: usize) -> Self {
        Self::with_tracks(index, windows, windows)
    }

    pub fn with_tracks(index: usize, video_windows: usize, audio_windows: usize) -> Self {
        Self {
            index,
            video_windows,
            audio_windows,
            tail_frames: 3,
            video_read: 0,
            audio_read: 0,
            video_done: false,
            audio_done: false,
            video_calls: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unlimited(index: usize) -> Self {
        Self::new(index, usize::MAX)
    }
}

#[async_trait]
impl MediaSource for StubSource {
    fn index(&self) -> usize {
        self.index
    }

    fn frame_rate(&self) -> f64 {
        FPS
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    async fn read_video_chunk(&mut self, duration: f64) -> MediaResult<ChunkRead<Vec<Frame>>> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        if self.video_done {
            return Ok(ChunkRead::Exhausted);
        }

        let window = self.video_read;
        let make = |count: usize| {
            (0..count)
                .map(|_| Frame::from_rgb(1, 1, vec![self.index as u8, window as u8, 0]))
                .collect::<MediaResult<Vec<_>>>()
        };

        if self.video_read < self.video_windows {
            self.video_read += 1;
            Ok(ChunkRead::Complete(make(frames_per(duration))?))
        } else {
            self.video_done = true;
            Ok(ChunkRead::Incomplete(make(self.tail_frames)?))
        }
    }

    async fn read_audio_chunk(&mut self, duration: f64) -> MediaResult<ChunkRead<AudioBlock>> {
        if self.audio_done {
            return Ok(ChunkRead::Exhausted);
        }
        if self.audio_read < self.audio_windows {
            self.audio_read += 1;
            let samples = vec![self.index as i16; samples_per(duration)];
            Ok(ChunkRead::Complete(AudioBlock::new(SAMPLE_RATE, 1, samples)))
        } else {
            self.audio_done = true;
            Ok(ChunkRead::Incomplete(AudioBlock::new(SAMPLE_RATE, 1, Vec::new())))
        }
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.video_done = true;
        self.audio_done = true;
        Ok(())
    }
}

/// Scorer reading per-(source, window) scores from a table.
///
/// A score `s > 0` is reported as one fully confident person of area `s`,
/// which the metrics turn back into exactly `s`.
#[derive(Default)]
pub struct TableScorer {
    scores: HashMap<(u8, u8), i64>,
    fail_at_window: Option<u8>,
    pub calls: AtomicUsize,
}

impl TableScorer {
    /// `rows[w][s]` is the score of source `s` in window `w`.
    pub fn from_rows(rows: &[&[i64]]) -> Self {
        let mut scores = HashMap::new();
        for (window, row) in rows.iter().enumerate() {
            for (source, score) in row.iter().enumerate() {
                scores.insert((source as u8, window as u8), *score);
            }
        }
        Self {
            scores,
            ..Default::default()
        }
    }

    pub fn failing_at(mut self, window: u8) -> Self {
        self.fail_at_window = Some(window);
        self
    }
}

impl ContentScorer for TableScorer {
    fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (source, window) = (frame.data[0], frame.data[1]);

        if self.fail_at_window == Some(window) {
            return Err(MediaError::detection_failed("inference failed"));
        }

        let score = self.scores.get(&(source, window)).copied().unwrap_or(0);
        if score <= 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Detection::new(
            CLASS_PERSON,
            Region::from_xywh(0.0, 0.0, score as f32, 1.0),
            1.0,
        )])
    }

    fn name(&self) -> &'static str {
        "table"
    }
}

/// Sink that remembers what was appended.
#[derive(Default)]
pub struct RecordingSink {
    /// `(source, window)` of every appended frame, in order
    pub frames: Vec<(u8, u8)>,
    /// Samples appended per source
    pub samples: HashMap<usize, usize>,
    /// Cancel after this many windows of video
    cancel_after: Option<(usize, watch::Sender<bool>)>,
    video_appends: usize,
}

impl RecordingSink {
    pub fn cancelling_after(windows: usize, cancel: watch::Sender<bool>) -> Self {
        Self {
            cancel_after: Some((windows, cancel)),
            ..Default::default()
        }
    }

    /// Source of each window, read back from the frames.
    pub fn window_sources(&self) -> Vec<u8> {
        self.frames
            .chunks(frames_per(WINDOW))
            .map(|chunk| chunk[0].0)
            .collect()
    }

    pub fn video_secs(&self) -> f64 {
        self.frames.len() as f64 / FPS
    }

    pub fn audio_samples(&self, source: usize) -> usize {
        self.samples.get(&source).copied().unwrap_or(0)
    }
}

#[async_trait]
impl WindowSink for RecordingSink {
    async fn append_video(&mut self, frames: &[Frame]) -> DirectorResult<()> {
        self.frames
            .extend(frames.iter().map(|f| (f.data[0], f.data[1])));
        self.video_appends += 1;
        if let Some((after, cancel)) = &self.cancel_after {
            if self.video_appends >= *after {
                let _ = cancel.send(true);
            }
        }
        Ok(())
    }

    async fn append_audio(&mut self, source_index: usize, block: &AudioBlock) -> DirectorResult<()> {
        *self.samples.entry(source_index).or_default() += block.samples.len();
        Ok(())
    }
}

/// Sink writing raw bytes into registered temporary artifacts.
pub struct FileSink {
    video: PathBuf,
    audio: Vec<PathBuf>,
    cancel_after: Option<(usize, Arc<watch::Sender<bool>>)>,
    video_appends: usize,
}

impl FileSink {
    pub fn create(artifacts: &mut TempArtifacts, sources: usize) -> std::io::Result<Self> {
        let video = artifacts.register(ArtifactRole::Merged, None, None);
        std::fs::File::create(&video)?;
        let mut audio = Vec::new();
        for index in 0..sources {
            let path = artifacts.register(ArtifactRole::Audio, Some(index), None);
            std::fs::File::create(&path)?;
            audio.push(path);
        }
        Ok(Self {
            video,
            audio,
            cancel_after: None,
            video_appends: 0,
        })
    }

    fn append(path: &PathBuf, bytes: &[u8]) -> DirectorResult<()> {
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(bytes)?;
        Ok(())
    }
}

#[async_trait]
impl WindowSink for FileSink {
    async fn append_video(&mut self, frames: &[Frame]) -> DirectorResult<()> {
        for frame in frames {
            Self::append(&self.video, &frame.data)?;
        }
        self.video_appends += 1;
        if let Some((after, cancel)) = &self.cancel_after {
            if self.video_appends >= *after {
                let _ = cancel.send(true);
            }
        }
        Ok(())
    }

    async fn append_audio(&mut self, source_index: usize, block: &AudioBlock) -> DirectorResult<()> {
        Self::append(&self.audio[source_index], &block.to_le_bytes())
    }
}

/// Config matching the stub sources, with temp files under `temp_dir`.
pub fn director_config(temp_dir: &Path) -> DirectorConfig {
    DirectorConfig {
        window_secs: WINDOW,
        output: OutputFormat {
            fps: FPS,
            sample_rate: SAMPLE_RATE,
            channels: 1,
            ..OutputFormat::default()
        },
        temp_dir: temp_dir.to_path_buf(),
        ..DirectorConfig::default()
    }
}

/// Opens one [`StubSource`] per path, with a window count per index.
pub struct StubOpener {
    windows: Vec<usize>,
    fail_at: Option<usize>,
    pub opened: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl StubOpener {
    pub fn new(windows: &[usize]) -> Self {
        Self {
            windows: windows.to_vec(),
            fail_at: None,
            opened: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[async_trait]
impl SourceOpener for StubOpener {
    type Source = StubSource;

    async fn open(&self, index: usize, path: &Path, _format: OutputFormat) -> MediaResult<StubSource> {
        if self.fail_at == Some(index) {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let mut source = StubSource::new(index, self.windows.get(index).copied().unwrap_or(0));
        source.closes = self.closes.clone();
        Ok(source)
    }
}

/// Output backend writing [`FileSink`]s and concatenating them into the
/// destination in place of a mux.
#[derive(Default)]
pub struct FileOutput {
    fail_mux: bool,
    cancel_after: Option<(usize, Arc<watch::Sender<bool>>)>,
    pub aborts: Arc<AtomicUsize>,
    pub finishes: Arc<AtomicUsize>,
}

impl FileOutput {
    pub fn failing_mux() -> Self {
        Self {
            fail_mux: true,
            ..Default::default()
        }
    }

    pub fn cancelling_after(windows: usize, cancel: watch::Sender<bool>) -> Self {
        Self {
            cancel_after: Some((windows, Arc::new(cancel))),
            ..Default::default()
        }
    }
}

#[async_trait]
impl OutputBackend for FileOutput {
    type Sink = FileSink;

    fn create_sink(&self, artifacts: &mut TempArtifacts, source_count: usize) -> DirectorResult<FileSink> {
        let mut sink = FileSink::create(artifacts, source_count)?;
        sink.cancel_after = self.cancel_after.clone();
        Ok(sink)
    }

    async fn finish(
        &self,
        sink: FileSink,
        artifacts: &mut TempArtifacts,
        request: FinishRequest<'_>,
    ) -> DirectorResult<PathBuf> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        let staging = artifacts.register(ArtifactRole::Final, None, Some("bin"));

        let mut bytes = std::fs::read(&sink.video)?;
        for audio in &sink.audio {
            bytes.extend(std::fs::read(audio)?);
        }
        std::fs::write(&staging, &bytes)?;

        if self.fail_mux {
            return Err(DirectorError::mux(MediaError::ffmpeg_failed(
                "FFmpeg exited with code 1",
                Some("moov atom not found".to_string()),
                Some(1),
            )));
        }

        std::fs::rename(&staging, request.destination)?;
        Ok(request.destination.to_path_buf())
    }

    fn abort(&self, _sink: FileSink) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}
