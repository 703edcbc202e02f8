//! Window arithmetic shared by readers, the engine and the assembler.
//!
//! All sources use the same rounding rule, whether they are single files or
//! directories of concatenated parts: the frame rate is rounded to the nearest
//! integer, multiplied by the window length, and the product rounded again.

/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECS: f64 = 2.0;

/// Number of frames in one window: `round(round(fps) × window)`.
pub fn frames_per_window(fps: f64, window_secs: f64) -> usize {
    if fps <= 0.0 || window_secs <= 0.0 {
        return 0;
    }
    (fps.round() * window_secs).round() as usize
}

/// Number of sample frames (one sample per channel) in one window.
pub fn samples_per_window(sample_rate: u32, window_secs: f64) -> usize {
    if window_secs <= 0.0 {
        return 0;
    }
    (sample_rate as f64 * window_secs).round() as usize
}

/// Upper bound on the number of windows a run can evaluate: `ceil(target / window)`.
pub fn max_window_count(target_secs: f64, window_secs: f64) -> u32 {
    if target_secs <= 0.0 || window_secs <= 0.0 {
        return 0;
    }
    (target_secs / window_secs).ceil() as u32
}

/// Format seconds as `H:MM:SS`.
pub fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
