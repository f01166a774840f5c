//! Branded video composition: intro card, narrated main scene, outro card,
//! concatenated into the 16:9 master every export is cut from.

use crate::catalog::ContentInfo;
use crate::config::{Branding, Config};
use crate::error::MediaResult;
use crate::ffmpeg::{
    concat_list_entry, cover_scale_filter, ffmpeg_base_args, ffmpeg_color, ffmpeg_concat_videos,
    run_cmd,
};
use crate::optimizer::VisualElement;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MASTER_WIDTH: u32 = 1920;
pub const MASTER_HEIGHT: u32 = 1080;
pub const OUTRO_CTA: &str = "¡Suscríbete para más contenido!";
pub const INTRO_TAGLINE: &str = "Análisis cinematográfico";
const CARD_FADE_SECONDS: f64 = 0.5;
const AUDIO_RATE: u32 = 44_100;

/// Replaces `'` with `'\\\''`: close the quoted run, an escaped quote that
/// survives both filtergraph and option parsing, then reopen.
fn close_quotes(text: &str) -> String {
    text.replace('\'', "'\\\\\\''")
}

/// Escapes a literal for an inline `drawtext=text='...'` value.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | ':' | '%') {
            out.push('\\');
        }
        out.push(ch);
    }
    close_quotes(&out)
}

/// Escapes a path placed inside single quotes in a filtergraph.
pub fn escape_filter_path(path: &Path) -> String {
    let escaped = path
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace(':', "\\:");
    close_quotes(&escaped)
}

fn font_option(branding: &Branding) -> String {
    match branding.font_file.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(file) => format!("fontfile='{}'", escape_filter_path(Path::new(file))),
        None => "font='Sans'".to_string(),
    }
}

/// Text source for a `drawtext` filter.
pub enum DrawText<'a> {
    Inline(&'a str),
    File(&'a Path),
}

pub struct TextStyle<'a> {
    pub size: u32,
    pub color: String,
    pub x: &'a str,
    pub y: &'a str,
    pub shadow: u32,
}

/// One `drawtext` filter; file-backed text avoids escaping arbitrary titles.
pub fn drawtext_filter(text: DrawText<'_>, style: &TextStyle<'_>, branding: &Branding) -> String {
    let source = match text {
        DrawText::Inline(t) => format!("text='{}'", escape_drawtext(t)),
        DrawText::File(p) => format!("textfile='{}'", escape_filter_path(p)),
    };
    let mut filter = format!(
        "drawtext={}:{}:expansion=none:fontsize={}:fontcolor={}:x={}:y={}:line_spacing=8",
        font_option(branding),
        source,
        style.size,
        style.color,
        style.x,
        style.y
    );
    if style.shadow > 0 {
        filter.push_str(&format!(
            ":shadowcolor=black:shadowx={s}:shadowy={s}",
            s = style.shadow
        ));
    }
    filter
}

pub fn drawbox_filter(x: &str, y: &str, w: &str, h: &str, color: &str) -> String {
    format!("drawbox=x={}:y={}:w={}:h={}:color={}:t=fill", x, y, w, h, color)
}

/// libass style for burnt-in subtitles: silver text, black outline.
pub fn subtitle_force_style() -> &'static str {
    "Fontname=Sans,Fontsize=24,Outline=2,Shadow=1,PrimaryColour=&H00C0C0C0&,OutlineColour=&H00000000&,ShadowColour=&H80000000&,Alignment=2,MarginV=60"
}

pub fn subtitles_filter(srt: &Path) -> String {
    format!(
        "subtitles='{}':force_style='{}'",
        escape_filter_path(srt),
        subtitle_force_style()
    )
}

async fn write_text_file(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn encode_args(fps: u32, out: &Path) -> Vec<String> {
    vec![
        "-r".to_string(),
        fps.to_string(),
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
        "-ar".to_string(),
        AUDIO_RATE.to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out.display().to_string(),
    ]
}

pub struct CardSpec<'a> {
    pub text: &'a str,
    pub subtext: &'a str,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

pub fn card_filter(card: &CardSpec<'_>, title_file: &Path, sub_file: &Path, branding: &Branding) -> String {
    let title_size = (card.height / 9).max(24);
    let sub_size = (card.height / 27).max(16);
    let fade_out = (card.duration - CARD_FADE_SECONDS).max(0.0);

    [
        drawtext_filter(
            DrawText::File(title_file),
            &TextStyle {
                size: title_size,
                color: ffmpeg_color(&branding.primary, None),
                x: "(w-text_w)/2",
                y: "(h-text_h)/2-th*0.6",
                shadow: 5,
            },
            branding,
        ),
        drawbox_filter(
            "iw*0.3",
            "ih/2+ih*0.04",
            "iw*0.4",
            "4",
            &ffmpeg_color(&branding.accent, Some(0.9)),
        ),
        drawtext_filter(
            DrawText::File(sub_file),
            &TextStyle {
                size: sub_size,
                color: ffmpeg_color(&branding.accent, None),
                x: "(w-text_w)/2",
                y: "h/2+h*0.08",
                shadow: 2,
            },
            branding,
        ),
        format!(
            "fade=t=in:st=0:d={:.2},fade=t=out:st={:.3}:d={:.2}",
            CARD_FADE_SECONDS, fade_out, CARD_FADE_SECONDS
        ),
    ]
    .join(",")
}

/// Solid brand background with the name and a line of subtext.
pub async fn render_card(card: &CardSpec<'_>, branding: &Branding, out: &Path) -> Result<bool> {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "card".to_string());
    let dir = out.parent().unwrap_or_else(|| Path::new("."));
    let title_file = dir.join(format!("{}_title.txt", stem));
    let sub_file = dir.join(format!("{}_sub.txt", stem));
    write_text_file(&title_file, card.text).await?;
    write_text_file(&sub_file, card.subtext).await?;

    let mut args = ffmpeg_base_args();
    args.extend([
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!(
            "color=c={}:s={}x{}:d={:.3}:r={}",
            ffmpeg_color(&branding.secondary, None),
            card.width,
            card.height,
            card.duration,
            card.fps
        ),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("anullsrc=r={}:cl=stereo", AUDIO_RATE),
        "-vf".to_string(),
        card_filter(card, &title_file, &sub_file, branding),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-t".to_string(),
        format!("{:.3}", card.duration),
    ]);
    args.extend(encode_args(card.fps, out));

    run_cmd(&args).await?;
    Ok(out.exists())
}

pub struct MainScene<'a> {
    pub background: Option<&'a Path>,
    pub audio: Option<&'a Path>,
    pub subtitles: Option<&'a Path>,
    pub content: &'a ContentInfo,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

pub fn platform_line(content: &ContentInfo) -> String {
    format!("Disponible en {}", content.platform)
}

pub fn main_filter(
    scene: &MainScene<'_>,
    title_file: &Path,
    platform_file: &Path,
    branding: &Branding,
) -> String {
    let h = scene.height;
    let title_size = (h / 14).max(20);
    let platform_size = (h / 24).max(14);
    let tag_size = (h / 30).max(12);

    let mut chain = vec![
        cover_scale_filter(scene.width, scene.height),
        "eq=brightness=-0.12:saturation=0.9".to_string(),
        drawbox_filter("0", "0", "iw", "ih", "black@0.35"),
        drawtext_filter(
            DrawText::File(title_file),
            &TextStyle {
                size: title_size,
                color: ffmpeg_color(&branding.accent, None),
                x: "(w-text_w)/2",
                y: "h*0.12",
                shadow: 4,
            },
            branding,
        ),
        drawbox_filter(
            "0",
            "ih-ih/6",
            "iw",
            "ih/6",
            &ffmpeg_color(&branding.secondary, Some(0.75)),
        ),
        drawbox_filter("0", "ih-ih/6", "iw", "6", &ffmpeg_color(&branding.primary, None)),
        drawtext_filter(
            DrawText::File(platform_file),
            &TextStyle {
                size: platform_size,
                color: ffmpeg_color(&branding.primary, None),
                x: "40",
                y: "h-h/12-text_h/2",
                shadow: 1,
            },
            branding,
        ),
        drawtext_filter(
            DrawText::Inline(&branding.tag()),
            &TextStyle {
                size: tag_size,
                color: ffmpeg_color(&branding.accent, None),
                x: "w-text_w-40",
                y: "h-h/12-text_h/2",
                shadow: 1,
            },
            branding,
        ),
    ];
    if let Some(srt) = scene.subtitles {
        chain.push(subtitles_filter(srt));
    }
    chain.push("format=yuv420p".to_string());
    format!("[0:v]{}[v]", chain.join(","))
}

/// Backdrop (or brand colour) with title, platform lower third, burnt-in
/// subtitles and the narration.
pub async fn render_main(scene: &MainScene<'_>, branding: &Branding, out: &Path) -> Result<bool> {
    let dir = out.parent().unwrap_or_else(|| Path::new("."));
    let title_file = dir.join("main_title.txt");
    let platform_file = dir.join("main_platform.txt");
    write_text_file(&title_file, &scene.content.title).await?;
    write_text_file(&platform_file, &platform_line(scene.content)).await?;

    let mut args = ffmpeg_base_args();
    match scene.background.filter(|p| p.exists()) {
        Some(image) => args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            scene.fps.to_string(),
            "-t".to_string(),
            format!("{:.3}", scene.duration),
            "-i".to_string(),
            image.display().to_string(),
        ]),
        None => args.extend([
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!(
                "color=c={}:s={}x{}:d={:.3}:r={}",
                ffmpeg_color(&branding.secondary, None),
                scene.width,
                scene.height,
                scene.duration,
                scene.fps
            ),
        ]),
    }
    match scene.audio.filter(|p| p.exists()) {
        Some(audio) => args.extend(["-i".to_string(), audio.display().to_string()]),
        None => args.extend([
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!("anullsrc=r={}:cl=stereo", AUDIO_RATE),
        ]),
    }

    args.extend([
        "-filter_complex".to_string(),
        main_filter(scene, &title_file, &platform_file, branding),
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-t".to_string(),
        format!("{:.3}", scene.duration),
    ]);
    args.extend(encode_args(scene.fps, out));

    run_cmd(&args).await?;
    Ok(out.exists())
}

/// Layers `compose` draws into the master, as the optimizer sees them.
pub fn master_layers(has_backdrop: bool) -> Vec<VisualElement<'static>> {
    let background = if has_backdrop { "image" } else { "color" };
    vec![
        VisualElement { kind: "video", content: "intro card" },
        VisualElement { kind: background, content: "background" },
        VisualElement { kind: "text", content: "title" },
        VisualElement { kind: "overlay", content: "lower third" },
        VisualElement { kind: "text", content: "platform" },
        VisualElement { kind: "text", content: "logo tag" },
        VisualElement { kind: "subtitle", content: "burnt-in subtitles" },
        VisualElement { kind: "video", content: "outro card" },
    ]
}

pub struct ComposeInputs<'a> {
    pub content: &'a ContentInfo,
    pub background: Option<&'a Path>,
    pub narration: Option<&'a Path>,
    pub subtitles: Option<&'a Path>,
    pub narration_duration: f64,
}

async fn concat_parts(parts: &[PathBuf], work_dir: &Path, out: &Path) -> MediaResult<bool> {
    let list: String = parts.iter().map(|p| concat_list_entry(p)).collect();
    let list_path = work_dir.join("compose_concat.txt");
    if let Err(err) = fs::write(&list_path, list).await {
        logw(format!("Cannot write {}: {}", list_path.display(), err));
        return Ok(false);
    }
    ffmpeg_concat_videos(&list_path, out).await
}

/// Renders intro, main and outro into `work_dir` and joins them into
/// `master.mp4`. `Ok(None)` when any part fails to render.
pub async fn compose(cfg: &Config, inputs: &ComposeInputs<'_>, work_dir: &Path) -> Result<Option<PathBuf>> {
    fs::create_dir_all(work_dir)
        .await
        .with_context(|| format!("Failed to create dir {}", work_dir.display()))?;

    let fps = cfg.video.fps;
    let branding = &cfg.branding;
    let tag = branding.tag();
    let max_main = (cfg.video.max_duration as f64
        - cfg.video.intro_duration
        - cfg.video.outro_duration)
        .max(5.0);
    let main_duration = inputs.narration_duration.clamp(1.0, max_main);

    logi(format!(
        "Composing master for '{}' ({:.1} s narration)",
        inputs.content.title, main_duration
    ));

    let intro = work_dir.join("intro.mp4");
    let main = work_dir.join("main.mp4");
    let outro = work_dir.join("outro.mp4");

    let intro_card = CardSpec {
        text: &tag,
        subtext: INTRO_TAGLINE,
        duration: cfg.video.intro_duration,
        width: MASTER_WIDTH,
        height: MASTER_HEIGHT,
        fps,
    };
    if !render_card(&intro_card, branding, &intro).await? {
        logw("Intro card was not rendered.");
        return Ok(None);
    }

    let scene = MainScene {
        background: inputs.background,
        audio: inputs.narration,
        subtitles: inputs.subtitles,
        content: inputs.content,
        duration: main_duration,
        width: MASTER_WIDTH,
        height: MASTER_HEIGHT,
        fps,
    };
    if !render_main(&scene, branding, &main).await? {
        logw("Main scene was not rendered.");
        return Ok(None);
    }

    let outro_card = CardSpec {
        text: &tag,
        subtext: OUTRO_CTA,
        duration: cfg.video.outro_duration,
        width: MASTER_WIDTH,
        height: MASTER_HEIGHT,
        fps,
    };
    if !render_card(&outro_card, branding, &outro).await? {
        logw("Outro card was not rendered.");
        return Ok(None);
    }

    let master = work_dir.join("master.mp4");
    if !concat_parts(&[intro, main, outro], work_dir, &master).await? {
        logw("Master concat produced no file.");
        return Ok(None);
    }

    logok(format!("Master ready: {}", master.display()));
    Ok(Some(master))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ffmpeg's `av_get_token`: quoted runs are literal, `\` escapes the
    /// next char outside quotes, stops at any char of `term`.
    fn get_token<'a>(buf: &'a str, term: &str) -> (String, &'a str) {
        let buf = buf.trim_start_matches([' ', '\n', '\t', '\r']);
        let mut out = String::new();
        let mut end = 0;
        let mut rest = "";
        let mut chars = buf.char_indices();
        while let Some((i, c)) = chars.next() {
            if term.contains(c) {
                rest = &buf[i..];
                break;
            }
            match c {
                '\\' => match chars.next() {
                    Some((_, next)) => {
                        out.push(next);
                        end = out.len();
                    }
                    None => out.push('\\'),
                },
                '\'' => {
                    let mut closed = false;
                    for (_, q) in chars.by_ref() {
                        if q == '\'' {
                            closed = true;
                            break;
                        }
                        out.push(q);
                    }
                    if closed {
                        end = out.len();
                    }
                }
                _ => out.push(c),
            }
        }
        let keep = out.trim_end_matches([' ', '\n', '\t', '\r']).len().max(end);
        out.truncate(keep);
        (out, rest)
    }

    /// Option values of one filter as ffmpeg sees them: graph-level
    /// unescaping first, then option-level.
    fn filter_values(filter: &str) -> Vec<String> {
        let (_, args) = filter.split_once('=').unwrap();
        let (args, _) = get_token(args, "[],;");
        let mut values = Vec::new();
        let mut rest: &str = &args;
        loop {
            let (value, tail) = get_token(rest, ":");
            values.push(value);
            match tail.strip_prefix(':') {
                Some(t) => rest = t,
                None => break,
            }
        }
        values
    }

    #[test]
    fn drawtext_escapes_special_characters() {
        assert_eq!(escape_drawtext("100% real: it's"), r"100\% real\: it'\\\''s");
        assert_eq!(escape_drawtext("a\\b"), "a\\\\b");
        assert_eq!(escape_drawtext("CINE NORTE"), "CINE NORTE");
    }

    #[test]
    fn filter_paths_escape_colons_and_quotes() {
        assert_eq!(
            escape_filter_path(Path::new("C:/it's/subs.srt")),
            r"C\:/it'\\\''s/subs.srt"
        );
    }

    #[test]
    fn subtitle_paths_with_quotes_reach_ffmpeg_intact() {
        for path in [
            "projects/20261019_Grey's_Anatomy/subtitles_es.srt",
            r"C:\films\it's, here [1].srt",
            "plain/subtitles_es.srt",
        ] {
            let values = filter_values(&subtitles_filter(Path::new(path)));
            assert_eq!(values[0], path);
            assert!(values[1].starts_with("force_style=Fontname=Sans,Fontsize=24"));
            assert_eq!(values.len(), 2);
        }
    }

    #[test]
    fn drawtext_values_with_quotes_reach_ffmpeg_intact() {
        let branding = Branding {
            font_file: Some("/fonts/O'Neil:Bold.ttf".to_string()),
            ..Branding::default()
        };
        let style = TextStyle {
            size: 48,
            color: "white".to_string(),
            x: "(w-text_w)/2",
            y: "h-100",
            shadow: 2,
        };
        let title = r"Grey's Anatomy: 100% \ real, 'season' 1";
        let values = filter_values(&drawtext_filter(DrawText::Inline(title), &style, &branding));
        assert_eq!(values[0], "fontfile=/fonts/O'Neil:Bold.ttf");
        assert_eq!(values[1], format!("text={}", title));
        assert!(values.contains(&"expansion=none".to_string()));

        let file = Path::new("/tmp/20261019_Grey's_Anatomy/title.txt");
        let values = filter_values(&drawtext_filter(DrawText::File(file), &style, &branding));
        assert_eq!(values[1], "textfile=/tmp/20261019_Grey's_Anatomy/title.txt");
    }

    #[test]
    fn main_filter_layers_overlays_and_subtitles() {
        let content = ContentInfo {
            title: "Oppenheimer".to_string(),
            platform: "Netflix".to_string(),
            ..Default::default()
        };
        let branding = Branding::default();
        let srt = PathBuf::from("/tmp/p/subtitles_es.srt");
        let scene = MainScene {
            background: None,
            audio: None,
            subtitles: Some(&srt),
            content: &content,
            duration: 20.0,
            width: 1920,
            height: 1080,
            fps: 30,
        };
        let f = main_filter(&scene, Path::new("/tmp/p/t.txt"), Path::new("/tmp/p/pl.txt"), &branding);
        assert!(f.starts_with("[0:v]scale=1920:1080"));
        assert!(f.ends_with("format=yuv420p[v]"));
        assert!(f.contains("textfile='/tmp/p/t.txt'"));
        assert!(f.contains("fontcolor=0xC0C0C0"));
        assert!(f.contains("text='CINE NORTE'"));
        assert!(f.contains("subtitles='/tmp/p/subtitles_es.srt':force_style='Fontname=Sans"));
        assert!(f.contains("PrimaryColour=&H00C0C0C0&"));

        let no_subs = MainScene {
            subtitles: None,
            ..scene
        };
        let f = main_filter(&no_subs, Path::new("t.txt"), Path::new("p.txt"), &branding);
        assert!(!f.contains("subtitles="));
    }

    #[test]
    fn card_filter_fades_both_ends() {
        let branding = Branding {
            font_file: Some("/fonts/Inter.ttf".to_string()),
            ..Branding::default()
        };
        let card = CardSpec {
            text: "CINE NORTE",
            subtext: OUTRO_CTA,
            duration: 3.0,
            width: 1920,
            height: 1080,
            fps: 30,
        };
        let f = card_filter(&card, Path::new("a.txt"), Path::new("b.txt"), &branding);
        assert!(f.contains("fontfile='/fonts/Inter.ttf'"));
        assert!(f.contains("fontcolor=0xE50914"));
        assert!(f.contains("fade=t=out:st=2.500:d=0.50"));
    }

    #[test]
    fn platform_line_names_service() {
        let content = ContentInfo {
            platform: "HBO Max".to_string(),
            ..Default::default()
        };
        assert_eq!(platform_line(&content), "Disponible en HBO Max");
    }

    #[test]
    fn master_layers_satisfy_the_visual_checks() {
        let layers = master_layers(true);
        assert_eq!(layers[1].kind, "image");
        assert_eq!(master_layers(false)[1].kind, "color");
        let input = crate::optimizer::SuggestionInput {
            title: "",
            text: "",
            sections: 0,
            duration: 0.0,
            elements: &layers,
        };
        assert!(
            crate::optimizer::suggestions(&input)
                .iter()
                .all(|s| s.kind != "visual")
        );
    }
}
