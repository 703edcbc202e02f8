//! Temporary artifact ownership for one run.
//!
//! Every intermediate file a run creates is named from the run id, the
//! artifact's role and an optional source index, and registered here before
//! it is written. The registry is released exactly once: explicitly at the
//! end of the run, or on drop if the run unwound before getting there.

use camcut_media::remove_if_exists;
use camcut_models::RunId;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::DirectorResult;

/// What a temporary artifact is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    /// The single video stream of winning windows
    Merged,
    /// One source's audio stream
    Audio,
    /// All audio streams summed
    Mixed,
    /// Muxed output before it is moved to the destination
    Final,
}

impl ArtifactRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merged => "merged",
            Self::Audio => "audio",
            Self::Mixed => "mixed",
            Self::Final => "final",
        }
    }

    /// Container extension used unless the caller picks one.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Merged | Self::Final => "mp4",
            Self::Audio | Self::Mixed => "m4a",
        }
    }
}

/// A registered temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempArtifact {
    pub path: PathBuf,
    pub role: ArtifactRole,
    pub index: Option<usize>,
}

/// Outcome of releasing the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Files deleted
    pub removed: usize,
    /// Registered but never created, or already gone
    pub missing: usize,
    /// Files that could not be deleted
    pub failed: Vec<PathBuf>,
    /// Retention was requested; nothing was touched
    pub retained: bool,
}

/// Registry of one run's temporary artifacts.
#[derive(Debug)]
pub struct TempArtifacts {
    run_id: RunId,
    dir: PathBuf,
    registry: Vec<TempArtifact>,
    retain: bool,
    released: bool,
}

/// `tmp_{role}[_{index}]_{run_id}.{ext}`
pub fn artifact_file_name(run_id: &RunId, role: ArtifactRole, index: Option<usize>, ext: &str) -> String {
    let ext = ext.trim_start_matches('.');
    match index {
        Some(index) => format!("tmp_{}_{}_{}.{}", role.as_str(), index, run_id, ext),
        None => format!("tmp_{}_{}.{}", role.as_str(), run_id, ext),
    }
}

impl TempArtifacts {
    /// Create the registry, making sure the temp directory exists.
    pub fn create(dir: impl AsRef<Path>, run_id: RunId, retain: bool) -> DirectorResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        debug!(run_id = %run_id, dir = %dir.display(), retain, "Temp artifacts created");

        Ok(Self {
            run_id,
            dir,
            registry: Vec::new(),
            retain,
            released: false,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register an artifact and return the path to write it at.
    ///
    /// Registering the same role and index twice returns the same path and
    /// keeps a single entry.
    pub fn register(&mut self, role: ArtifactRole, index: Option<usize>, ext: Option<&str>) -> PathBuf {
        let ext = ext.unwrap_or(role.default_extension());
        let path = self
            .dir
            .join(artifact_file_name(&self.run_id, role, index, ext));

        if !self.registry.iter().any(|a| a.path == path) {
            self.registry.push(TempArtifact {
                path: path.clone(),
                role,
                index,
            });
        }
        path
    }

    pub fn artifacts(&self) -> &[TempArtifact] {
        &self.registry
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Delete every registered artifact. Only the first call does anything.
    pub fn release(&mut self) -> ReleaseReport {
        if self.released {
            return ReleaseReport::default();
        }
        self.released = true;

        if self.retain {
            info!(
                run_id = %self.run_id,
                count = self.registry.len(),
                dir = %self.dir.display(),
                "Keeping temporary artifacts"
            );
            return ReleaseReport {
                retained: true,
                ..Default::default()
            };
        }

        let mut report = ReleaseReport::default();
        for artifact in &self.registry {
            match remove_if_exists(&artifact.path) {
                Ok(true) => report.removed += 1,
                Ok(false) => report.missing += 1,
                Err(e) => {
                    warn!(
                        run_id = %self.run_id,
                        path = %artifact.path.display(),
                        error = %e,
                        "Failed to remove temporary artifact"
                    );
                    report.failed.push(artifact.path.clone());
                }
            }
        }

        debug!(
            run_id = %self.run_id,
            removed = report.removed,
            missing = report.missing,
            failed = report.failed.len(),
            "Temporary artifacts released"
        );
        report
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}
