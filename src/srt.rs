use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub style: String,
}

fn split_millis(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    (total_s / 3600, (total_s % 3600) / 60, total_s % 60, ms)
}

pub fn format_srt_timestamp(secs: f64) -> String {
    let (h, m, s, ms) = split_millis(secs);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

pub fn format_vtt_timestamp(secs: f64) -> String {
    let (h, m, s, ms) = split_millis(secs);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

/// Accepts `HH:MM:SS,mmm`, `HH:MM:SS.mmm` and `MM:SS.mmm`.
fn timestamp_to_seconds(ts: &str) -> Option<f64> {
    let (clock, millis) = match ts.split_once([',', '.']) {
        Some((clock, ms)) => (clock, ms),
        None => (ts, "0"),
    };
    let fields: Vec<&str> = clock.split(':').collect();
    let (hh, mm, ss) = match fields.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, s.parse::<u64>().ok()?),
        [m, s] => (0, m.parse::<u64>().ok()?, s.parse::<u64>().ok()?),
        _ => return None,
    };
    let ms: u64 = millis.parse().ok()?;
    let frac = ms as f64 / 10f64.powi(millis.len() as i32);
    Some((hh * 3600 + mm * 60 + ss) as f64 + frac)
}

pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_timestamp(cue.start),
            format_srt_timestamp(cue.end),
            cue.text.trim()
        ));
    }
    out
}

pub fn render_vtt(cues: &[SubtitleCue]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for cue in cues {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_timestamp(cue.start),
            format_vtt_timestamp(cue.end),
            cue.text.trim()
        ));
    }
    out
}

async fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    let mut out = fs::File::create(path)
        .await
        .with_context(|| format!("create subtitle output: {}", path.display()))?;
    out.write_all(text.as_bytes()).await?;
    out.flush().await.ok();
    Ok(())
}

pub async fn write_srt(cues: &[SubtitleCue], path: &Path) -> Result<()> {
    write_text(path, &render_srt(cues)).await
}

pub async fn write_vtt(cues: &[SubtitleCue], path: &Path) -> Result<()> {
    write_text(path, &render_vtt(cues)).await
}

/// Parses SRT text; italics tags are dropped and styles come back as `default`.
pub fn parse_srt(input: &str) -> Vec<SubtitleCue> {
    let cleaned = input
        .replace("\r\n", "\n")
        .replace("<i>", "")
        .replace("</i>", "");

    let mut cues = Vec::new();
    for block in cleaned.split("\n\n") {
        let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());
        let mut timing = match lines.next() {
            Some(l) => l,
            None => continue,
        };
        if !timing.contains("-->") {
            timing = match lines.next() {
                Some(l) => l,
                None => continue,
            };
        }

        let mut parts = timing.split_whitespace();
        let (Some(a), Some(arrow), Some(b)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        if arrow != "-->" {
            continue;
        }
        let (Some(start), Some(end)) = (timestamp_to_seconds(a), timestamp_to_seconds(b)) else {
            continue;
        };

        let text = lines.collect::<Vec<_>>().join("\n");
        cues.push(SubtitleCue {
            start,
            end,
            text,
            style: "default".to_string(),
        });
    }
    cues
}

pub async fn read_srt(path: &Path) -> Result<Vec<SubtitleCue>> {
    let input = fs::read_to_string(path)
        .await
        .with_context(|| format!("read srt: {}", path.display()))?;
    Ok(parse_srt(&input))
}
