//! Summing per-source audio artifacts into one track.

use camcut_models::{EncodingConfig, OutputFormat};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Build the mix command. Inputs are summed without normalisation and the
/// result is cut to `duration_secs`.
pub fn mix_command(
    inputs: &[PathBuf],
    output: &Path,
    duration_secs: f64,
    format: &OutputFormat,
    encoding: &EncodingConfig,
) -> MediaResult<FfmpegCommand> {
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| MediaError::internal("No audio tracks to mix"))?;

    let mut cmd = FfmpegCommand::new(first, output);
    for input in rest {
        cmd = cmd.add_input(input);
    }

    if inputs.len() > 1 {
        cmd = cmd
            .filter_complex(format!(
                "amix=inputs={}:duration=longest:normalize=0[mix]",
                inputs.len()
            ))
            .map("[mix]");
    } else {
        cmd = cmd.map("0:a:0");
    }

    Ok(cmd
        .no_video()
        .output_args(encoding.audio_args())
        .output_args(["-ar".to_string(), format.sample_rate.to_string()])
        .output_args(["-ac".to_string(), format.channels.to_string()])
        .duration(duration_secs))
}

/// Mix `inputs` into `output`, clamped to `duration_secs`.
pub async fn mix_audio_tracks(
    runner: &FfmpegRunner,
    inputs: &[PathBuf],
    output: impl AsRef<Path>,
    duration_secs: f64,
    format: &OutputFormat,
    encoding: &EncodingConfig,
) -> MediaResult<PathBuf> {
    let output = output.as_ref();
    let cmd = mix_command(inputs, output, duration_secs, format, encoding)?;

    info!(
        tracks = inputs.len(),
        duration_secs,
        output = %output.display(),
        "Mixing audio tracks"
    );
    runner.run(&cmd).await?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_command_multiple_inputs() {
        let inputs = vec![
            PathBuf::from("tmp_audio_0.m4a"),
            PathBuf::from("tmp_audio_1.m4a"),
            PathBuf::from("tmp_audio_2.m4a"),
        ];
        let args = mix_command(
            &inputs,
            Path::new("tmp_mixed.m4a"),
            6.0,
            &OutputFormat::default(),
            &EncodingConfig::intermediate(),
        )
        .unwrap()
        .build_args()
        .join(" ");

        assert!(args.contains("-i tmp_audio_0.m4a -i tmp_audio_1.m4a -i tmp_audio_2.m4a"));
        assert!(args.contains("amix=inputs=3:duration=longest:normalize=0[mix]"));
        assert!(args.contains("-map [mix]"));
        assert!(args.contains("-t 6.000"));
        assert!(args.ends_with("tmp_mixed.m4a"));
    }

    #[test]
    fn test_mix_command_single_input() {
        let args = mix_command(
            &[PathBuf::from("tmp_audio_0.m4a")],
            Path::new("tmp_mixed.m4a"),
            4.0,
            &OutputFormat::default(),
            &EncodingConfig::intermediate(),
        )
        .unwrap()
        .build_args()
        .join(" ");

        assert!(!args.contains("amix"));
        assert!(args.contains("-map 0:a:0"));
        assert!(args.contains("-t 4.000"));
    }

    #[test]
    fn test_mix_command_requires_inputs() {
        let err = mix_command(
            &[],
            Path::new("out.m4a"),
            1.0,
            &OutputFormat::default(),
            &EncodingConfig::intermediate(),
        )
        .unwrap_err();
        assert!(matches!(err, MediaError::Internal(_)));
    }
}
