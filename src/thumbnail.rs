//! Platform thumbnails: a frame from the master (or a backdrop, or a
//! generated gradient) with title, subtitle and brand overlays.

use crate::catalog::{ContentInfo, ContentType};
use crate::compose::{drawbox_filter, drawtext_filter, DrawText, TextStyle};
use crate::config::Config;
use crate::ffmpeg::{
    cover_scale_filter, ffmpeg_color, ffmpeg_extract_frame, ffmpeg_filter_image,
    ffprobe_duration_seconds,
};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use image::RgbImage;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThumbnailSpec {
    pub key: &'static str,
    pub platform: &'static str,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: &'static str,
    pub text_size: u32,
    pub overlay_opacity: f64,
    pub description: &'static str,
}

pub const THUMBNAILS: [ThumbnailSpec; 5] = [
    ThumbnailSpec {
        key: "youtube",
        platform: "YouTube",
        width: 1280,
        height: 720,
        aspect_ratio: "16:9",
        text_size: 48,
        overlay_opacity: 0.8,
        description: "Miniatura estándar para YouTube",
    },
    ThumbnailSpec {
        key: "tiktok",
        platform: "TikTok",
        width: 1080,
        height: 1920,
        aspect_ratio: "9:16",
        text_size: 36,
        overlay_opacity: 0.7,
        description: "Miniatura vertical para TikTok",
    },
    ThumbnailSpec {
        key: "instagram",
        platform: "Instagram",
        width: 1080,
        height: 1080,
        aspect_ratio: "1:1",
        text_size: 42,
        overlay_opacity: 0.75,
        description: "Miniatura cuadrada para Instagram",
    },
    ThumbnailSpec {
        key: "facebook",
        platform: "Facebook",
        width: 1200,
        height: 630,
        aspect_ratio: "1.91:1",
        text_size: 44,
        overlay_opacity: 0.8,
        description: "Miniatura para Facebook",
    },
    ThumbnailSpec {
        key: "twitter",
        platform: "Twitter",
        width: 1200,
        height: 675,
        aspect_ratio: "16:9",
        text_size: 40,
        overlay_opacity: 0.8,
        description: "Miniatura para Twitter",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorScheme {
    pub key: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
    pub background: &'static str,
    pub text: &'static str,
    pub accent: &'static str,
}

pub const SCHEMES: [ColorScheme; 4] = [
    ColorScheme {
        key: "cinematic",
        primary: "#E50914",
        secondary: "#C0C0C0",
        background: "#0A0A0A",
        text: "#FFFFFF",
        accent: "#FFD700",
    },
    ColorScheme {
        key: "dramatic",
        primary: "#8B0000",
        secondary: "#808080",
        background: "#1A1A1A",
        text: "#FFFFFF",
        accent: "#FF4500",
    },
    ColorScheme {
        key: "action",
        primary: "#FF0000",
        secondary: "#FFA500",
        background: "#000000",
        text: "#FFFFFF",
        accent: "#00FFFF",
    },
    ColorScheme {
        key: "mystery",
        primary: "#4B0082",
        secondary: "#9370DB",
        background: "#2F2F2F",
        text: "#FFFFFF",
        accent: "#FFD700",
    },
];

/// Unknown keys fall back to `cinematic`.
pub fn scheme_by_key(key: &str) -> ColorScheme {
    let key = key.trim().to_lowercase();
    SCHEMES
        .iter()
        .find(|s| s.key == key)
        .copied()
        .unwrap_or(SCHEMES[0])
}

const CHAR_WIDTH_PX: usize = 20;
const TEXT_MARGIN_PX: usize = 100;
const MAX_TITLE_LINES: usize = 3;

/// Greedy word wrap on an estimated glyph width, three lines at most.
pub fn format_title_text(title: &str, max_width: u32) -> String {
    let limit = (max_width as usize).saturating_sub(TEXT_MARGIN_PX);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in title.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if candidate.chars().count() * CHAR_WIDTH_PX <= limit {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.truncate(MAX_TITLE_LINES);
    lines.join("\n")
}

pub fn subtitle_text(content: &ContentInfo) -> String {
    let platform = &content.platform;
    if platform.trim().is_empty() {
        return "Contenido en streaming".to_string();
    }
    match content.content_type {
        ContentType::Movie => format!("Película en {}", platform),
        ContentType::Tv => format!("Serie en {}", platform),
    }
}

/// Per-scheme grading applied before the overlays.
pub fn scheme_effects(scheme: &ColorScheme) -> &'static str {
    match scheme.key {
        "dramatic" => "eq=contrast=1.3:saturation=1.2,vignette=PI/6",
        "action" => "unsharp=5:5:1.0,eq=brightness=0.05,vignette=PI/6",
        "mystery" => "eq=saturation=0.7,vignette=PI/4",
        _ => "vignette=PI/6",
    }
}

pub fn overlay_filter(
    spec: &ThumbnailSpec,
    scheme: &ColorScheme,
    title_file: &Path,
    subtitle_file: &Path,
    title_lines: usize,
    cfg: &Config,
) -> String {
    let branding = &cfg.branding;
    let line_h = (spec.text_size as f64 * 1.2).round() as u32;
    let block_h = line_h * title_lines.max(1) as u32;
    let title_y = spec.height.saturating_sub(block_h + 100);
    let pad = 20;

    let mut chain = vec![
        scheme_effects(scheme).to_string(),
        drawbox_filter(
            "0",
            &title_y.saturating_sub(pad).to_string(),
            "iw",
            &(block_h + pad * 2).to_string(),
            &format!("black@{:.2}", spec.overlay_opacity),
        ),
        drawtext_filter(
            DrawText::File(title_file),
            &TextStyle {
                size: spec.text_size,
                color: ffmpeg_color(scheme.text, None),
                x: "(w-text_w)/2",
                y: &title_y.to_string(),
                shadow: 2,
            },
            branding,
        ),
    ];

    if title_y > 150 {
        chain.push(drawtext_filter(
            DrawText::File(subtitle_file),
            &TextStyle {
                size: spec.text_size / 2,
                color: ffmpeg_color(scheme.secondary, None),
                x: "(w-text_w)/2",
                y: &(title_y - 50).to_string(),
                shadow: 1,
            },
            branding,
        ));
    }

    let brand_size = (spec.text_size / 3).max(12);
    let tag = branding.tag();
    let tag_w = tag.chars().count() as u32 * brand_size * 6 / 10;
    chain.push(drawbox_filter(
        &format!("iw-{}", tag_w + 40),
        "10",
        &(tag_w + 20).to_string(),
        &(brand_size + 20).to_string(),
        "black@0.78",
    ));
    chain.push(drawtext_filter(
        DrawText::Inline(&tag),
        &TextStyle {
            size: brand_size,
            color: ffmpeg_color(scheme.primary, None),
            x: "w-text_w-30",
            y: "20",
            shadow: 0,
        },
        branding,
    ));
    chain.push(drawbox_filter(
        &format!("iw-{}", tag_w + 30),
        &(brand_size + 25).to_string(),
        &tag_w.to_string(),
        "2",
        &ffmpeg_color(scheme.accent, None),
    ));

    chain.join(",")
}

/// Vertical black-to-red gradient.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    let h = height.max(1);
    RgbImage::from_fn(width.max(1), h, |_, y| {
        image::Rgb([(255 * y / h) as u8, 0, 0])
    })
}

async fn write_gradient(width: u32, height: u32, out: &Path) -> Result<bool> {
    let path = out.to_path_buf();
    tokio::task::spawn_blocking(move || {
        gradient_image(width, height)
            .save(&path)
            .with_context(|| format!("save gradient {}", path.display()))
    })
    .await
    .context("gradient task")??;
    Ok(out.exists())
}

/// Base picture at the thumbnail size: master frame at 30%, else the
/// backdrop, else a gradient.
async fn base_image(
    master: Option<&Path>,
    backdrop: Option<&Path>,
    spec: &ThumbnailSpec,
    out_png: &Path,
) -> Result<bool> {
    if let Some(video) = master.filter(|p| p.exists()) {
        let at = ffprobe_duration_seconds(video)
            .await
            .map(|d| d * 0.3)
            .unwrap_or(0.0);
        match ffmpeg_extract_frame(video, at, spec.width, spec.height, out_png).await {
            Ok(true) => return Ok(true),
            Ok(false) => logw(format!("No frame extracted for {}", spec.key)),
            Err(err) => logw(format!("Frame extraction for {} failed: {}", spec.key, err)),
        }
    }

    if let Some(image) = backdrop.filter(|p| p.exists()) {
        match ffmpeg_filter_image(image, &cover_scale_filter(spec.width, spec.height), out_png).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(err) => logw(format!("Backdrop scaling for {} failed: {}", spec.key, err)),
        }
    }

    write_gradient(spec.width, spec.height, out_png).await
}

pub struct ThumbnailRequest<'a> {
    pub master: Option<&'a Path>,
    pub backdrop: Option<&'a Path>,
    pub content: &'a ContentInfo,
    pub title: &'a str,
}

/// Title and platform lines for `textfile=` overlays; returns both paths
/// and the title's line count.
async fn write_overlay_texts(
    req: &ThumbnailRequest<'_>,
    spec: &ThumbnailSpec,
    dir: &Path,
) -> Result<(PathBuf, PathBuf, usize)> {
    let title_text = format_title_text(req.title, spec.width);
    let title_file = dir.join(format!("thumb_title_{}.txt", spec.key));
    let subtitle_file = dir.join(format!("thumb_subtitle_{}.txt", spec.key));
    tokio::fs::write(&title_file, &title_text)
        .await
        .with_context(|| format!("write {}", title_file.display()))?;
    tokio::fs::write(&subtitle_file, subtitle_text(req.content))
        .await
        .with_context(|| format!("write {}", subtitle_file.display()))?;
    Ok((title_file, subtitle_file, title_text.lines().count()))
}

/// Renders one thumbnail to `out`; `Ok(false)` when ffmpeg produced nothing.
pub async fn render(
    cfg: &Config,
    req: &ThumbnailRequest<'_>,
    spec: &ThumbnailSpec,
    scheme: &ColorScheme,
    out: &Path,
) -> Result<bool> {
    let dir = out.parent().unwrap_or_else(|| Path::new("."));
    let base = dir.join(format!("thumb_base_{}.png", spec.key));
    if !base_image(req.master, req.backdrop, spec, &base).await? {
        return Ok(false);
    }

    let (title_file, subtitle_file, lines) = write_overlay_texts(req, spec, dir).await?;
    let filter = overlay_filter(spec, scheme, &title_file, &subtitle_file, lines, cfg);
    let ok = ffmpeg_filter_image(&base, &filter, out).await?;

    for tmp in [&base, &title_file, &subtitle_file] {
        let _ = tokio::fs::remove_file(tmp).await;
    }
    Ok(ok)
}

pub fn parse_hex_rgb(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some([(value >> 16) as u8, (value >> 8) as u8, value as u8])
}

fn luma(p: &image::Rgb<u8>) -> f64 {
    0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64
}

/// Contrast, edge definition, colour variety and brand presence, 25 each.
pub fn score_rgb(img: &RgbImage, scheme: &ColorScheme) -> f64 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let n = (w as f64) * (h as f64);

    let lumas: Vec<f64> = img.pixels().map(luma).collect();
    let mean = lumas.iter().sum::<f64>() / n;
    let variance = lumas.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / n;
    let contrast = (variance.sqrt() / 128.0).min(1.0);

    let idx = |x: u32, y: u32| (y * w + x) as usize;
    let mut gx = 0.0;
    let mut gy = 0.0;
    for y in 0..h {
        for x in 0..w {
            if x + 1 < w {
                gx += (lumas[idx(x + 1, y)] - lumas[idx(x, y)]).abs();
            }
            if y + 1 < h {
                gy += (lumas[idx(x, y + 1)] - lumas[idx(x, y)]).abs();
            }
        }
    }
    let gx_mean = if w > 1 { gx / ((w - 1) as f64 * h as f64) } else { 0.0 };
    let gy_mean = if h > 1 { gy / (w as f64 * (h - 1) as f64) } else { 0.0 };
    let readability = (((gx_mean + gy_mean) / 2.0) / 50.0).min(1.0);

    let distinct: HashSet<[u8; 3]> = img.pixels().map(|p| p.0).collect();
    let composition = (distinct.len() as f64 / 1000.0).min(1.0);

    let brand: Vec<[u8; 3]> = [scheme.primary, scheme.secondary, scheme.background]
        .iter()
        .filter_map(|c| parse_hex_rgb(c))
        .collect();
    let branded = img
        .pixels()
        .filter(|p| {
            brand.iter().any(|b| {
                p.0.iter()
                    .zip(b.iter())
                    .all(|(c, bc)| (*c as i32 - *bc as i32).abs() < 30)
            })
        })
        .count();
    let branding = (branded as f64 / n * 10.0).min(1.0);

    ((contrast + readability + composition + branding) * 25.0).min(100.0)
}

pub fn score_image(path: &Path, scheme: &ColorScheme) -> Result<f64> {
    let img = image::open(path)
        .with_context(|| format!("Cannot open image '{}'", path.display()))?
        .to_rgb8();
    Ok(score_rgb(&img, scheme))
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedThumbnail {
    pub platform: String,
    pub image_path: PathBuf,
    pub spec: ThumbnailSpec,
    pub text_overlay: String,
    pub color_scheme: String,
    pub optimization_score: f64,
}

/// One thumbnail per spec; failures are logged and skipped.
pub async fn generate_all(
    cfg: &Config,
    req: &ThumbnailRequest<'_>,
    specs: &[ThumbnailSpec],
    scheme_key: &str,
    dir: &Path,
) -> Vec<GeneratedThumbnail> {
    if let Err(err) = tokio::fs::create_dir_all(dir).await {
        logw(format!("Cannot create {}: {}", dir.display(), err));
        return Vec::new();
    }
    let scheme = scheme_by_key(scheme_key);
    let slug = req.content.file_slug();

    let mut out = Vec::new();
    for spec in specs {
        logi(format!("Thumbnail {} ({}x{})", spec.platform, spec.width, spec.height));
        let path = dir.join(format!("thumbnail_{}_{}.jpg", slug, spec.key));
        match render(cfg, req, spec, &scheme, &path).await {
            Ok(true) => {}
            Ok(false) => {
                logw(format!("Thumbnail {} produced no file.", spec.key));
                continue;
            }
            Err(err) => {
                logw(format!("Thumbnail {} failed: {:#}", spec.key, err));
                continue;
            }
        }

        let scored = path.clone();
        let score = tokio::task::spawn_blocking(move || score_image(&scored, &scheme))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r)
            .unwrap_or_else(|err| {
                logw(format!("Scoring {} failed: {:#}", spec.key, err));
                50.0
            });

        logok(format!("Thumbnail {} scored {:.1}", spec.key, score));
        out.push(GeneratedThumbnail {
            platform: spec.key.to_string(),
            image_path: path,
            spec: *spec,
            text_overlay: req.title.to_string(),
            color_scheme: scheme.key.to_string(),
            optimization_score: score,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overlay_texts_carry_title_and_platform() {
        let dir = tempfile::tempdir().unwrap();
        let content = ContentInfo {
            title: "Grey's Anatomy".to_string(),
            platform: "Disney+".to_string(),
            content_type: ContentType::Tv,
            ..Default::default()
        };
        let req = ThumbnailRequest {
            master: None,
            backdrop: None,
            content: &content,
            title: "Grey's Anatomy",
        };
        let (title_file, subtitle_file, lines) =
            write_overlay_texts(&req, &THUMBNAILS[0], dir.path()).await.unwrap();
        assert_eq!(lines, 1);
        assert_eq!(std::fs::read_to_string(title_file).unwrap(), "Grey's Anatomy");
        assert_eq!(std::fs::read_to_string(subtitle_file).unwrap(), "Serie en Disney+");
    }

    #[test]
    fn title_wraps_on_estimated_width() {
        // (400-100)/20 = 15 chars per line
        let text = format_title_text("Dune Parte Dos la guerra santa comienza ya", 400);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Dune Parte Dos");
        assert!(lines.iter().all(|l| l.chars().count() * 20 <= 300));
        assert!(lines.len() <= 3);
    }

    #[test]
    fn title_keeps_three_lines_at_most() {
        let text = format_title_text("uno dos tres cuatro cinco seis siete", 200);
        assert_eq!(text.lines().count(), 3);
        assert_eq!(format_title_text("Barbie", 1280), "Barbie");
        assert_eq!(format_title_text("", 1280), "");
    }

    #[test]
    fn subtitle_names_kind_and_platform() {
        let mut content = ContentInfo {
            platform: "Netflix".to_string(),
            ..Default::default()
        };
        assert_eq!(subtitle_text(&content), "Película en Netflix");
        content.content_type = ContentType::Tv;
        assert_eq!(subtitle_text(&content), "Serie en Netflix");
        content.platform.clear();
        assert_eq!(subtitle_text(&content), "Contenido en streaming");
    }

    #[test]
    fn unknown_scheme_is_cinematic() {
        assert_eq!(scheme_by_key("mystery").primary, "#4B0082");
        assert_eq!(scheme_by_key("neon").key, "cinematic");
    }

    #[test]
    fn hex_colours_parse() {
        assert_eq!(parse_hex_rgb("#E50914"), Some([229, 9, 20]));
        assert_eq!(parse_hex_rgb("fff"), None);
    }

    #[test]
    fn flat_image_scores_only_branding() {
        let scheme = scheme_by_key("cinematic");
        let img = RgbImage::from_pixel(20, 10, image::Rgb([229, 9, 20]));
        let score = score_rgb(&img, &scheme);
        // no contrast, no edges, one colour, fully branded
        assert!((score - (25.0 + 25.0 / 1000.0)).abs() < 1e-6);

        let off_brand = RgbImage::from_pixel(20, 10, image::Rgb([0, 120, 255]));
        assert!(score_rgb(&off_brand, &scheme) < 1.0);
    }

    #[test]
    fn gradient_scores_contrast_and_stays_capped() {
        let img = gradient_image(64, 256);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(0, 255).0[0], 254);
        let score = score_rgb(&img, &scheme_by_key("cinematic"));
        assert!(score > 0.0 && score <= 100.0);
    }

    #[test]
    fn overlay_places_brand_and_subtitle() {
        let cfg = Config::default();
        let spec = THUMBNAILS[0];
        let f = overlay_filter(
            &spec,
            &scheme_by_key("dramatic"),
            Path::new("t.txt"),
            Path::new("s.txt"),
            1,
            &cfg,
        );
        assert!(f.starts_with("eq=contrast=1.3"));
        assert!(f.contains("textfile='t.txt'"));
        assert!(f.contains("textfile='s.txt'"));
        assert!(f.contains("text='CINE NORTE'"));
        assert!(f.contains("black@0.80"));
    }

    #[tokio::test]
    async fn gradient_fallback_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("g.png");
        assert!(write_gradient(32, 18, &out).await.unwrap());
        let score = score_image(&out, &scheme_by_key("cinematic")).unwrap();
        assert!(score > 0.0);
    }
}
