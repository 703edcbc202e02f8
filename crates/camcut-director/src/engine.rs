//! The selection engine: window-by-window read, score, select, append.

use async_trait::async_trait;
use camcut_media::{measure_frame, AudioBlock, ChunkRead, ContentScorer, Frame, MediaSource};
use camcut_models::{
    format_elapsed, ProgressRecord, RunId, RunOutcome, ScoringClasses, SelectionDecision,
};
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{DirectorError, DirectorResult};
use crate::metrics;
use crate::progress::ProgressSender;
use crate::selection::{complete_sources, mark_exhausted, select_winner, Candidate};

/// Receives the output of each evaluated window, in window order.
#[async_trait]
pub trait WindowSink: Send {
    /// Append the winning source's frames to the single video stream.
    async fn append_video(&mut self, frames: &[Frame]) -> DirectorResult<()>;

    /// Append one source's audio for the window to that source's stream.
    async fn append_audio(&mut self, source_index: usize, block: &AudioBlock) -> DirectorResult<()>;
}

/// Engine parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub window_secs: f64,
    pub target_secs: f64,
    pub classes: ScoringClasses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    /// Target duration reached
    Completed,
    /// No source could supply a full window
    Draining,
}

/// What the engine produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineReport {
    pub outcome: RunOutcome,
    /// One entry per evaluated window, in window order
    pub decisions: Vec<SelectionDecision>,
    /// `decisions × window`, the duration of the assembled video
    pub elapsed_secs: f64,
    /// Source indices in the order they ran out
    pub exhausted: Vec<usize>,
}

/// One source's reads for one window.
struct WindowRead {
    source_index: usize,
    video: ChunkRead<Vec<Frame>>,
    audio: ChunkRead<AudioBlock>,
}

/// Drives all sources window by window.
///
/// The scorer is borrowed for the lifetime of the engine and called once
/// per Complete chunk, on the chunk's first frame.
pub struct SelectionEngine<'a> {
    run_id: RunId,
    scorer: &'a dyn ContentScorer,
    settings: EngineSettings,
    progress: Option<ProgressSender>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a> SelectionEngine<'a> {
    pub fn new(run_id: RunId, scorer: &'a dyn ContentScorer, settings: EngineSettings) -> Self {
        Self {
            run_id,
            scorer,
            settings,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run until the target duration is covered or every source is exhausted.
    ///
    /// Sources are identified by their position in `sources`. The caller
    /// keeps ownership and is responsible for closing them.
    pub async fn run<S, K>(&self, sources: &mut [S], sink: &mut K) -> DirectorResult<EngineReport>
    where
        S: MediaSource,
        K: WindowSink,
    {
        let window = self.settings.window_secs;
        let mut alive = vec![true; sources.len()];
        let mut decisions: Vec<SelectionDecision> = Vec::new();
        let mut exhausted = Vec::new();
        let mut window_index: u32 = 0;
        let mut state = EngineState::Running;

        info!(
            run_id = %self.run_id,
            sources = sources.len(),
            window_secs = window,
            target_secs = self.settings.target_secs,
            scorer = self.scorer.name(),
            "Selection started"
        );

        while state == EngineState::Running {
            if window_index as f64 * window >= self.settings.target_secs {
                state = EngineState::Completed;
                break;
            }
            if self.is_cancelled() {
                info!(run_id = %self.run_id, window = window_index, "Selection cancelled");
                return Err(DirectorError::Cancelled);
            }

            let reads = read_window(sources, &alive, window).await?;
            let (video, audio): (Vec<_>, Vec<_>) = reads
                .into_iter()
                .map(|r| ((r.source_index, r.video), (r.source_index, r.audio)))
                .unzip();

            let newly_exhausted = mark_exhausted(&mut alive, &video);
            for source_index in &newly_exhausted {
                info!(
                    run_id = %self.run_id,
                    source_index,
                    window = window_index,
                    "Source exhausted"
                );
            }
            metrics::record_sources_exhausted(newly_exhausted.len());
            exhausted.extend(newly_exhausted);

            if complete_sources(&video).is_empty() {
                state = EngineState::Draining;
                break;
            }

            let candidates = self.score_window(&video)?;
            let Some(winner) = select_winner(&candidates) else {
                state = EngineState::Draining;
                break;
            };

            let decision = SelectionDecision::new(window_index, winner.source_index, winner.score);
            let frames = video
                .iter()
                .find(|(index, _)| *index == winner.source_index)
                .and_then(|(_, read)| match read {
                    ChunkRead::Complete(frames) => Some(frames.as_slice()),
                    _ => None,
                })
                .unwrap_or_default();
            sink.append_video(frames).await?;

            for (source_index, read) in audio {
                if !alive[source_index] {
                    continue;
                }
                if let Some(block) = read.into_inner() {
                    sink.append_audio(source_index, &block).await?;
                }
            }

            self.report_progress(&decision, candidates.len());
            decisions.push(decision);
            window_index += 1;
        }

        let elapsed_secs = decisions.len() as f64 * window;
        let outcome = match state {
            EngineState::Draining => RunOutcome::Drained,
            _ => RunOutcome::Completed,
        };

        info!(
            run_id = %self.run_id,
            outcome = %outcome,
            windows = decisions.len(),
            elapsed = %format_elapsed(elapsed_secs),
            "Selection finished"
        );

        Ok(EngineReport {
            outcome,
            decisions,
            elapsed_secs,
            exhausted,
        })
    }

    /// Score the first frame of every Complete chunk.
    fn score_window(&self, video: &[(usize, ChunkRead<Vec<Frame>>)]) -> DirectorResult<Vec<Candidate>> {
        let mut candidates = Vec::with_capacity(video.len());
        for (source_index, read) in video {
            let ChunkRead::Complete(frames) = read else {
                continue;
            };
            let score = match frames.first() {
                Some(frame) => measure_frame(self.scorer, frame, self.settings.classes)
                    .map_err(|e| DirectorError::scorer(*source_index, e))?
                    .score(),
                None => 0,
            };
            debug!(source_index, score, "Chunk scored");
            candidates.push(Candidate {
                source_index: *source_index,
                score,
            });
        }
        Ok(candidates)
    }

    fn report_progress(&self, decision: &SelectionDecision, contenders: usize) {
        let record = ProgressRecord::from_decision(&self.run_id, decision, self.settings.window_secs);
        info!(
            run_id = %self.run_id,
            window = decision.window_index,
            elapsed = %format_elapsed(record.elapsed_secs),
            source_index = decision.source_index,
            score = decision.score,
            contenders,
            "Window selected"
        );
        metrics::record_window(decision.source_index, decision.score);
        if let Some(progress) = &self.progress {
            progress.emit(record);
        }
    }
}

/// Read video then audio from every alive source, all sources concurrently.
async fn read_window<S: MediaSource>(
    sources: &mut [S],
    alive: &[bool],
    window: f64,
) -> DirectorResult<Vec<WindowRead>> {
    let reads = sources
        .iter_mut()
        .enumerate()
        .filter(|(index, _)| alive[*index])
        .map(|(source_index, source)| async move {
            let video = source.read_video_chunk(window).await?;
            let audio = source.read_audio_chunk(window).await?;
            Ok::<_, camcut_media::MediaError>(WindowRead {
                source_index,
                video,
                audio,
            })
        });

    join_all(reads)
        .await
        .into_iter()
        .map(|r| r.map_err(DirectorError::from))
        .collect()
}
