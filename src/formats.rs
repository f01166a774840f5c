//! Per-platform exports cut from the master.

use crate::catalog::ContentInfo;
use crate::compose::{drawbox_filter, drawtext_filter, DrawText, TextStyle};
use crate::config::Branding;
use crate::error::MediaResult;
use crate::ffmpeg::{
    ffmpeg_base_args, ffmpeg_color, ffmpeg_extract_frame, ffmpeg_filter_image,
    ffprobe_duration_seconds, ffprobe_frame_rate, ffprobe_video_dimensions, run_cmd,
};
use crate::{logi, logok, logw};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FormatSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: &'static str,
    pub platform: &'static str,
    pub max_duration: u32,
    pub fps: u32,
    pub bitrate: &'static str,
    pub description: &'static str,
}

impl FormatSpec {
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn is_vertical(&self) -> bool {
        self.height > self.width
    }
}

pub const FORMATS: [FormatSpec; 6] = [
    FormatSpec {
        key: "youtube",
        name: "YouTube",
        width: 1920,
        height: 1080,
        aspect_ratio: "16:9",
        platform: "youtube",
        max_duration: 180,
        fps: 24,
        bitrate: "5000k",
        description: "Formato estándar para YouTube, optimizado para desktop y TV",
    },
    FormatSpec {
        key: "tiktok",
        name: "TikTok",
        width: 1080,
        height: 1920,
        aspect_ratio: "9:16",
        platform: "tiktok",
        max_duration: 60,
        fps: 30,
        bitrate: "3000k",
        description: "Formato vertical para TikTok, optimizado para móviles",
    },
    FormatSpec {
        key: "instagram_reels",
        name: "Instagram Reels",
        width: 1080,
        height: 1920,
        aspect_ratio: "9:16",
        platform: "instagram",
        max_duration: 90,
        fps: 30,
        bitrate: "3000k",
        description: "Formato vertical para Instagram Reels",
    },
    FormatSpec {
        key: "instagram_square",
        name: "Instagram Square",
        width: 1080,
        height: 1080,
        aspect_ratio: "1:1",
        platform: "instagram",
        max_duration: 60,
        fps: 30,
        bitrate: "2500k",
        description: "Formato cuadrado para Instagram posts",
    },
    FormatSpec {
        key: "facebook",
        name: "Facebook",
        width: 1920,
        height: 1080,
        aspect_ratio: "16:9",
        platform: "facebook",
        max_duration: 240,
        fps: 24,
        bitrate: "4000k",
        description: "Formato para Facebook videos",
    },
    FormatSpec {
        key: "twitter",
        name: "Twitter",
        width: 1280,
        height: 720,
        aspect_ratio: "16:9",
        platform: "twitter",
        max_duration: 140,
        fps: 30,
        bitrate: "2000k",
        description: "Formato para Twitter videos",
    },
];

pub fn format_keys() -> Vec<String> {
    FORMATS.iter().map(|f| f.key.to_string()).collect()
}

pub fn format_by_key(key: &str) -> Option<FormatSpec> {
    let key = key.trim().to_lowercase();
    FORMATS.iter().find(|f| f.key == key).copied()
}

/// Resolves requested keys; unknown ones are logged and dropped.
pub fn resolve_formats(keys: &[String]) -> Vec<FormatSpec> {
    let mut out: Vec<FormatSpec> = Vec::new();
    for key in keys {
        match format_by_key(key) {
            Some(spec) if !out.iter().any(|s| s.key == spec.key) => out.push(spec),
            Some(_) => {}
            None => logw(format!("Unknown format '{}' ignored.", key)),
        }
    }
    out
}

pub fn format_table() -> String {
    let mut out = format!(
        "{:<18} {:>10} {:>6} {:>6} {:>4} {:>8}  {}\n",
        "key", "size", "ratio", "max s", "fps", "bitrate", "description"
    );
    for f in FORMATS.iter() {
        out.push_str(&format!(
            "{:<18} {:>10} {:>6} {:>6} {:>4} {:>8}  {}\n",
            f.key,
            format!("{}x{}", f.width, f.height),
            f.aspect_ratio,
            f.max_duration,
            f.fps,
            f.bitrate,
            f.description
        ));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl Crop {
    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

fn even(v: u32) -> u32 {
    v & !1
}

/// Largest centred crop of the source with the format's aspect ratio.
/// `None` when a horizontal target already matches the source.
pub fn crop_for(src_w: u32, src_h: u32, spec: &FormatSpec) -> Option<Crop> {
    if src_w == 0 || src_h == 0 {
        return None;
    }
    let src_ratio = src_w as f64 / src_h as f64;
    let target = spec.ratio();
    if !spec.is_vertical() && (src_ratio - target).abs() < 0.01 {
        return None;
    }

    let (w, h) = if src_ratio > target {
        (even((src_h as f64 * target).round() as u32), even(src_h))
    } else {
        (even(src_w), even((src_w as f64 / target).round() as u32))
    };
    let (w, h) = (w.clamp(2, even(src_w).max(2)), h.clamp(2, even(src_h).max(2)));
    Some(Crop {
        width: w,
        height: h,
        x: src_w.saturating_sub(w) / 2,
        y: src_h.saturating_sub(h) / 2,
    })
}

pub fn export_filter(crop: Option<Crop>, spec: &FormatSpec) -> String {
    let mut chain = Vec::new();
    if let Some(c) = crop {
        chain.push(c.filter());
    }
    chain.push(format!("scale={}:{}", spec.width, spec.height));
    chain.push("setsar=1".to_string());
    chain.push(format!("fps={}", spec.fps));
    chain.join(",")
}

/// Crops, scales and trims the master for one platform.
pub async fn export_format(master: &Path, spec: &FormatSpec, out: &Path) -> MediaResult<bool> {
    let (src_w, src_h) = ffprobe_video_dimensions(master).await?;
    let crop = crop_for(src_w.max(0) as u32, src_h.max(0) as u32, spec);

    let mut args = ffmpeg_base_args();
    args.extend([
        "-i".to_string(),
        master.display().to_string(),
        "-t".to_string(),
        spec.max_duration.to_string(),
        "-vf".to_string(),
        export_filter(crop, spec),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-b:v".to_string(),
        spec.bitrate.to_string(),
        "-maxrate".to_string(),
        spec.bitrate.to_string(),
        "-bufsize".to_string(),
        spec.bitrate.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out.exists())
}

/// 0..=100: duration headroom 30, resolution 25, fps 20, aspect 25.
pub fn optimization_score(width: u32, height: u32, duration: f64, fps: f64, spec: &FormatSpec) -> f64 {
    let max = spec.max_duration as f64;
    let duration_score = ((max - duration) / max * 30.0).clamp(0.0, 30.0);

    let area = width as f64 * height as f64;
    let spec_area = spec.width as f64 * spec.height as f64;
    let resolution_score = (area / spec_area * 25.0).min(25.0);

    let fps_score = (fps / spec.fps as f64 * 20.0).clamp(0.0, 20.0);

    let aspect_score = if height == 0 {
        0.0
    } else {
        let ratio = width as f64 / height as f64;
        (25.0 - (ratio - spec.ratio()).abs() * 25.0).max(0.0)
    };

    (duration_score + resolution_score + fps_score + aspect_score).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedFormat {
    pub key: String,
    pub video_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
    pub metadata: serde_json::Value,
    pub optimization_score: f64,
}

pub fn format_metadata(spec: &FormatSpec, content: &ContentInfo, score: f64) -> serde_json::Value {
    serde_json::json!({
        "format_type": spec.key,
        "platform": spec.platform,
        "dimensions": format!("{}x{}", spec.width, spec.height),
        "aspect_ratio": spec.aspect_ratio,
        "max_duration": spec.max_duration,
        "recommended_fps": spec.fps,
        "bitrate": spec.bitrate,
        "optimization_score": score,
        "description": spec.description,
        "content_title": content.title,
        "content_platform": content.platform,
        "generated_at": chrono::Local::now().to_rfc3339(),
    })
}

/// Brand strip along the bottom of a still.
fn preview_overlay(spec: &FormatSpec, branding: &Branding) -> String {
    let size = (spec.width.min(spec.height) / 20).max(16);
    [
        drawbox_filter(
            "0",
            "ih-ih/10",
            "iw",
            "ih/10",
            &ffmpeg_color(&branding.secondary, Some(0.7)),
        ),
        drawtext_filter(
            DrawText::Inline(&branding.tag()),
            &TextStyle {
                size,
                color: ffmpeg_color(&branding.primary, None),
                x: "(w-text_w)/2",
                y: "h-h/20-text_h/2",
                shadow: 0,
            },
            branding,
        ),
    ]
    .join(",")
}

async fn export_preview(
    video: &Path,
    duration: f64,
    spec: &FormatSpec,
    branding: &Branding,
    out_jpg: &Path,
) -> MediaResult<bool> {
    let frame = out_jpg.with_extension("frame.png");
    let at = (duration * 0.3).min(10.0);
    if !ffmpeg_extract_frame(video, at, spec.width, spec.height, &frame).await? {
        return Ok(false);
    }
    let ok = ffmpeg_filter_image(&frame, &preview_overlay(spec, branding), out_jpg).await?;
    let _ = tokio::fs::remove_file(&frame).await;
    Ok(ok)
}

async fn export_one(
    master: &Path,
    spec: &FormatSpec,
    dir: &Path,
    content: &ContentInfo,
    branding: &Branding,
) -> MediaResult<Option<GeneratedFormat>> {
    let stem = format!("cine_norte_{}_{}", content.file_slug(), spec.key);
    let video_path = dir.join(format!("{}.mp4", stem));
    if !export_format(master, spec, &video_path).await? {
        return Ok(None);
    }

    let (w, h) = ffprobe_video_dimensions(&video_path)
        .await
        .map(|(w, h)| (w.max(0) as u32, h.max(0) as u32))
        .unwrap_or((spec.width, spec.height));
    let duration = ffprobe_duration_seconds(&video_path)
        .await
        .unwrap_or(spec.max_duration as f64);
    let fps = ffprobe_frame_rate(&video_path)
        .await
        .unwrap_or(spec.fps as f64);
    let score = optimization_score(w, h, duration, fps, spec);

    let thumb = dir.join(format!("{}_preview.jpg", stem));
    let thumbnail_path = match export_preview(&video_path, duration, spec, branding, &thumb).await {
        Ok(true) => Some(thumb),
        Ok(false) => None,
        Err(err) => {
            logw(format!("Preview for {} failed: {}", spec.key, err));
            None
        }
    };

    Ok(Some(GeneratedFormat {
        key: spec.key.to_string(),
        video_path,
        thumbnail_path,
        metadata: format_metadata(spec, content, score),
        optimization_score: score,
    }))
}

/// One record per spec that exports; failures are logged and skipped.
pub async fn export_all(
    master: &Path,
    specs: &[FormatSpec],
    dir: &Path,
    content: &ContentInfo,
    branding: &Branding,
) -> Vec<GeneratedFormat> {
    if let Err(err) = tokio::fs::create_dir_all(dir).await {
        logw(format!("Cannot create {}: {}", dir.display(), err));
        return Vec::new();
    }

    let mut out = Vec::new();
    for spec in specs {
        logi(format!("Exporting {} ({}x{})", spec.name, spec.width, spec.height));
        match export_one(master, spec, dir, content, branding).await {
            Ok(Some(generated)) => {
                logok(format!(
                    "{} ready, score {:.1}: {}",
                    spec.key,
                    generated.optimization_score,
                    generated.video_path.display()
                ));
                out.push(generated);
            }
            Ok(None) => logw(format!("{} export produced no file.", spec.key)),
            Err(err) => logw(format!("{} export failed: {}", spec.key, err)),
        }
    }
    out
}
