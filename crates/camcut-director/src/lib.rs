//! Best-shot selection across synchronized camera feeds.
//!
//! For every fixed-length window the director reads a chunk from each live
//! source, scores the chunk's first frame, keeps the winner's video and every
//! live source's audio, and finally mixes and muxes the result.
//!
//! - [`engine`]: the window state machine
//! - [`selection`]: winner and exhaustion rules
//! - [`assembler`]: streaming intermediate artifacts
//! - [`lifecycle`]: temporary artifact registry
//! - [`pipeline`]: the full run

pub mod assembler;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod selection;

pub use assembler::{AssembledOutput, OutputAssembler};
pub use backend::{FfmpegOutput, FfmpegSourceOpener, FinishRequest, OutputBackend, SourceOpener};
pub use config::DirectorConfig;
pub use engine::{EngineReport, EngineSettings, EngineState, SelectionEngine, WindowSink};
pub use error::{DirectorError, DirectorResult};
pub use lifecycle::{ArtifactRole, ReleaseReport, TempArtifact, TempArtifacts};
pub use logging::RunLogger;
pub use pipeline::{Director, RunRequest};
pub use progress::{progress_channel, ProgressSender};
pub use selection::{select_winner, Candidate};
