use crate::error::{MediaError, MediaResult};
use std::path::Path;
use tokio::process::Command;

pub const ATEMPO_MIN: f64 = 0.5;
pub const ATEMPO_MAX: f64 = 2.0;
const STDERR_TAIL: usize = 600;

pub(crate) async fn run_cmd(args: &[String]) -> MediaResult<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let output = cmd.output().await.map_err(|source| MediaError::Spawn {
        program: args[0].clone(),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .chars()
            .rev()
            .take(STDERR_TAIL)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return Err(MediaError::Failed {
            program: args[0].clone(),
            code: output.status.code(),
            stderr: tail.trim().to_string(),
        });
    }

    Ok(())
}

pub(crate) fn ffmpeg_base_args() -> Vec<String> {
    vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ]
}

/// `#RRGGBB` (or `RRGGBB`) to ffmpeg's `0xRRGGBB[@alpha]`.
pub fn ffmpeg_color(hex: &str, alpha: Option<f64>) -> String {
    let digits = hex.trim().trim_start_matches('#');
    let base = format!("0x{}", digits.to_ascii_uppercase());
    match alpha {
        Some(a) => format!("{}@{:.2}", base, a.clamp(0.0, 1.0)),
        None => base,
    }
}

pub fn clamp_atempo(tempo: f64) -> f64 {
    if !tempo.is_finite() {
        return 1.0;
    }
    tempo.clamp(ATEMPO_MIN, ATEMPO_MAX)
}

pub async fn ffprobe_video_dimensions(path: &Path) -> MediaResult<(i32, i32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            program: "ffprobe".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::Metadata(format!("dimensions of {}", path.display())));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let mut parts = text.split('x');
    let w = parts
        .next()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);
    let h = parts
        .next()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);

    if w <= 0 || h <= 0 {
        return Err(MediaError::Metadata(format!("invalid dimensions '{}'", text)));
    }

    Ok((w, h))
}

pub async fn ffprobe_duration_seconds(path: &Path) -> MediaResult<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            program: "ffprobe".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::Metadata(format!("duration of {}", path.display())));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        return Err(MediaError::Metadata(format!("invalid duration '{}'", text)));
    }
    Ok(duration)
}

pub async fn ffprobe_frame_rate(path: &Path) -> MediaResult<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            program: "ffprobe".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::Metadata(format!("frame rate of {}", path.display())));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    parse_frame_rate(&text).ok_or_else(|| MediaError::Metadata(format!("invalid frame rate '{}'", text)))
}

pub fn parse_frame_rate(text: &str) -> Option<f64> {
    let (num, den) = match text.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (text.trim().parse::<f64>().ok()?, 1.0),
    };
    if den <= 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Re-encodes one TTS section to PCM with the voice profile's tempo and gain.
pub async fn ffmpeg_adjust_voice(
    in_audio: &Path,
    tempo: f64,
    gain_db: f64,
    sample_rate: u32,
    out_wav: &Path,
) -> MediaResult<bool> {
    let filter = format!("atempo={:.4},volume={:.2}dB", clamp_atempo(tempo), gain_db);
    let mut args = ffmpeg_base_args();
    args.extend([
        "-i".to_string(),
        in_audio.display().to_string(),
        "-af".to_string(),
        filter,
        "-ar".to_string(),
        sample_rate.to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        out_wav.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_wav.exists())
}

pub async fn ffmpeg_silence(seconds: f64, sample_rate: u32, out_wav: &Path) -> MediaResult<bool> {
    let mut args = ffmpeg_base_args();
    args.extend([
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("anullsrc=r={}:cl=stereo", sample_rate),
        "-t".to_string(),
        format!("{:.3}", seconds.max(0.01)),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        out_wav.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_wav.exists())
}

/// One `file '...'` line for the concat demuxer, relative to the list file.
pub(crate) fn concat_list_entry(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("file '{}'\n", name.replace('\'', "'\\''"))
}

pub async fn ffmpeg_concat_audio(list_txt: &Path, out_wav: &Path) -> MediaResult<bool> {
    let mut args = ffmpeg_base_args();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_txt.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        out_wav.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_wav.exists())
}

/// Loudness-normalises the narration and fades both ends.
pub async fn ffmpeg_master_audio(
    in_audio: &Path,
    duration: f64,
    target_lufs: f64,
    bitrate: &str,
    out_m4a: &Path,
) -> MediaResult<bool> {
    let fade = 1.0_f64.min(duration / 4.0);
    let filter = format!(
        "loudnorm=I={:.1}:LRA=11:TP=-1.5,afade=t=in:st=0:d={:.3},afade=t=out:st={:.3}:d={:.3}",
        target_lufs,
        fade,
        (duration - fade).max(0.0),
        fade
    );
    let mut args = ffmpeg_base_args();
    args.extend([
        "-i".to_string(),
        in_audio.display().to_string(),
        "-af".to_string(),
        filter,
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        bitrate.to_string(),
        out_m4a.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_m4a.exists())
}

pub async fn ffmpeg_silent_track(
    seconds: f64,
    sample_rate: u32,
    bitrate: &str,
    out_m4a: &Path,
) -> MediaResult<bool> {
    let mut args = ffmpeg_base_args();
    args.extend([
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("anullsrc=r={}:cl=stereo", sample_rate),
        "-t".to_string(),
        format!("{:.3}", seconds),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        bitrate.to_string(),
        out_m4a.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_m4a.exists())
}

pub async fn ffmpeg_concat_videos(list_txt: &Path, out_mp4: &Path) -> MediaResult<bool> {
    let mut args = ffmpeg_base_args();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_txt.display().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-crf".to_string(),
        "22".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

pub async fn ffmpeg_mix_bgm(
    video_in: &Path,
    bgm_in: &Path,
    music_volume: f64,
    video_out: &Path,
) -> MediaResult<bool> {
    let filter = format!(
        "[0:a]volume=1.0[a0];[1:a]volume={:.3}[a1];[a0][a1]amix=inputs=2:duration=first:dropout_transition=2[a]",
        music_volume
    );
    let mut args = ffmpeg_base_args();
    args.extend([
        "-i".to_string(),
        video_in.display().to_string(),
        "-stream_loop".to_string(),
        "-1".to_string(),
        "-i".to_string(),
        bgm_in.display().to_string(),
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        video_out.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(video_out.exists())
}

/// Grabs one frame at `at_s`, cover-scaled to `w`x`h`.
pub async fn ffmpeg_extract_frame(
    video_in: &Path,
    at_s: f64,
    w: u32,
    h: u32,
    out_png: &Path,
) -> MediaResult<bool> {
    let mut args = ffmpeg_base_args();
    args.extend([
        "-ss".to_string(),
        format!("{:.3}", at_s.max(0.0)),
        "-i".to_string(),
        video_in.display().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        cover_scale_filter(w, h),
        out_png.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_png.exists())
}

/// Applies a still-image filter chain (`-vf`) to one picture.
pub async fn ffmpeg_filter_image(
    image_in: &Path,
    filter: &str,
    out_image: &Path,
) -> MediaResult<bool> {
    let mut args = ffmpeg_base_args();
    args.extend([
        "-i".to_string(),
        image_in.display().to_string(),
        "-vf".to_string(),
        filter.to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        out_image.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_image.exists())
}

pub fn cover_scale_filter(w: u32, h: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
        w = w,
        h = h
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_converted_to_ffmpeg_hex() {
        assert_eq!(ffmpeg_color("#e50914", None), "0xE50914");
        assert_eq!(ffmpeg_color("0A0A0A", Some(0.6)), "0x0A0A0A@0.60");
        assert_eq!(ffmpeg_color("#C0C0C0", Some(3.0)), "0xC0C0C0@1.00");
    }

    #[test]
    fn concat_entries_quote_file_names() {
        assert_eq!(
            concat_list_entry(Path::new("/tmp/work/section_0.wav")),
            "file 'section_0.wav'\n"
        );
        assert_eq!(concat_list_entry(Path::new("it's.wav")), "file 'it'\\''s.wav'\n");
    }

    #[test]
    fn atempo_is_clamped_to_filter_range() {
        assert_eq!(clamp_atempo(0.1), ATEMPO_MIN);
        assert_eq!(clamp_atempo(3.0), ATEMPO_MAX);
        assert_eq!(clamp_atempo(f64::NAN), 1.0);
        assert!((clamp_atempo(0.945) - 0.945).abs() < 1e-9);
    }

    #[test]
    fn frame_rates_parse_as_fractions() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[tokio::test]
    async fn missing_binary_reports_spawn_error() {
        let args = vec!["definitely-not-a-real-binary-xyz".to_string()];
        match run_cmd(&args).await {
            Err(MediaError::Spawn { program, .. }) => {
                assert_eq!(program, "definitely-not-a-real-binary-xyz")
            }
            other => panic!("unexpected result: {:?}", other.is_ok()),
        }
    }
}
