#![deny(unreachable_patterns)]
//! FFmpeg and model plumbing for the camcut director.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2` and stderr diagnostics
//! - Chunked source readers over single files and part directories
//! - Streaming video/audio writers, audio mixing and the final mux
//! - The content-scoring seam and a YOLOv8 object detector

pub mod command;
pub mod detection;
pub mod error;
pub mod frame;
pub mod fs_utils;
pub mod mix;
pub mod mux;
pub mod probe;
pub mod progress;
pub mod reader;
pub mod writer;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use detection::{measure_frame, ContentScorer, ObjectDetector, ObjectDetectorConfig};
pub use error::{MediaError, MediaResult};
pub use frame::{AudioBlock, Frame};
pub use fs_utils::{move_file, remove_if_exists};
pub use mix::mix_audio_tracks;
pub use mux::{mux_final, MuxRequest, OverlayConfig};
pub use probe::{probe_source, SourceInfo};
pub use progress::FfmpegProgress;
pub use reader::{list_parts, ChunkRead, MediaSource, SourceReader};
pub use writer::{AudioWriter, VideoWriter};
