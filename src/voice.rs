use crate::api::elevenlabs::{VoiceSettings, elevenlabs_tts_to_mp3};
use crate::config::Config;
use crate::ffmpeg::{
    clamp_atempo, concat_list_entry, ffmpeg_adjust_voice, ffmpeg_concat_audio,
    ffmpeg_master_audio, ffmpeg_silence, ffmpeg_silent_track, ffprobe_duration_seconds,
};
use crate::script::GeneratedScript;
use crate::sections::{Emotion, SectionKind};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const LEAD_IN_SECONDS: f64 = 0.5;
pub const TAIL_SECONDS: f64 = 1.0;
pub const SUSPENSE_GAP_SECONDS: f64 = 0.5;
pub const DEFAULT_GAP_SECONDS: f64 = 0.2;
const MIN_SILENT_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub key: String,
    pub name: String,
    pub speed: f64,
    pub volume: f64,
}

impl VoiceProfile {
    fn preset(key: &str, name: &str, speed: f64, volume: f64) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            speed,
            volume,
        }
    }

    pub fn presets() -> Vec<VoiceProfile> {
        vec![
            Self::preset("cinenorte_male", "Cine Norte Masculino", 0.9, 1.0),
            Self::preset("cinenorte_female", "Cine Norte Femenino", 0.95, 1.0),
            Self::preset("dramatic", "Dramático", 0.8, 1.1),
            Self::preset("energetic", "Energético", 1.1, 1.0),
        ]
    }

    /// Unknown keys fall back to `cinenorte_male`.
    pub fn by_key(key: &str) -> VoiceProfile {
        let mut presets = Self::presets();
        match presets.iter().position(|p| p.key == key) {
            Some(i) => presets.swap_remove(i),
            None => presets.swap_remove(0),
        }
    }

    /// Tempo factor and gain in dB for one section.
    pub fn adjustment(&self, emotion: Emotion) -> (f64, f64) {
        let mut tempo = self.speed;
        let mut gain_db = (self.volume - 1.0) * 20.0;
        match emotion {
            Emotion::Excitement => {
                tempo *= 1.05;
                gain_db += 2.0;
            }
            Emotion::Suspense => {
                tempo *= 0.95;
                gain_db -= 1.0;
            }
            Emotion::Drama => tempo *= 0.9,
            Emotion::Neutral | Emotion::Comedy => {}
        }
        (clamp_atempo(tempo), gain_db)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSegment {
    pub index: usize,
    pub kind: SectionKind,
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub emotion: Emotion,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceTrack {
    pub audio_path: Option<PathBuf>,
    pub segments: Vec<VoiceSegment>,
    pub duration: f64,
    pub silent: bool,
}

/// Sentence punctuation first, then clause punctuation.
fn pause_patterns() -> Result<&'static [Regex]> {
    static PAUSES: OnceCell<Vec<Regex>> = OnceCell::new();
    PAUSES
        .get_or_try_init(|| {
            [r"([.!?])\s+", r"([,;:])\s+"]
                .iter()
                .map(|p| Regex::new(p).context("failed to compile pause pattern"))
                .collect()
        })
        .map(Vec::as_slice)
}

/// Adds spoken pauses after sentence and clause punctuation.
pub fn prepare_text_for_synthesis(text: &str) -> String {
    let mut out = text.trim().to_string();
    match pause_patterns() {
        Ok(patterns) => {
            for re in patterns {
                out = re.replace_all(&out, "$1... ").into_owned();
            }
        }
        Err(err) => logw(format!("{:#}", err)),
    }
    out
}

pub fn gap_before(emotion: Emotion) -> f64 {
    if emotion == Emotion::Suspense {
        SUSPENSE_GAP_SECONDS
    } else {
        DEFAULT_GAP_SECONDS
    }
}

/// Start times for measured sections plus the total track length.
pub fn plan_timeline(clips: &[(f64, Emotion)]) -> (Vec<f64>, f64) {
    let mut starts = Vec::with_capacity(clips.len());
    let mut cursor = LEAD_IN_SECONDS;
    for (i, (duration, emotion)) in clips.iter().enumerate() {
        if i > 0 {
            cursor += gap_before(*emotion);
        }
        starts.push(cursor);
        cursor += duration;
    }
    (starts, cursor + TAIL_SECONDS)
}

/// Timing used when no narration could be synthesised.
pub fn silent_plan(script: &GeneratedScript) -> VoiceTrack {
    let mut segments = Vec::with_capacity(script.sections.len());
    let mut cursor = 0.0;
    for (index, section) in script.sections.iter().enumerate() {
        let duration = section.duration_seconds as f64;
        segments.push(VoiceSegment {
            index,
            kind: section.kind,
            text: section.content.clone(),
            start: cursor,
            end: cursor + duration,
            duration,
            emotion: section.emotion,
        });
        cursor += duration;
    }
    VoiceTrack {
        audio_path: None,
        segments,
        duration: (script.total_duration as f64).max(MIN_SILENT_SECONDS),
        silent: true,
    }
}

async fn silent_track(cfg: &Config, script: &GeneratedScript, work_dir: &Path) -> VoiceTrack {
    let mut track = silent_plan(script);
    let out = work_dir.join("narration.m4a");
    match ffmpeg_silent_track(track.duration, cfg.audio.sample_rate, &cfg.audio.bitrate, &out).await {
        Ok(true) => track.audio_path = Some(out),
        Ok(false) => logw("Silent narration track was not written."),
        Err(err) => logw(format!("Silent narration track failed: {}", err)),
    }
    track
}

struct MeasuredSection {
    index: usize,
    wav: PathBuf,
    duration: f64,
}

async fn synthesize_section(
    client: &Client,
    cfg: &Config,
    profile: &VoiceProfile,
    index: usize,
    text: &str,
    emotion: Emotion,
    work_dir: &Path,
) -> Result<Option<MeasuredSection>> {
    let mp3 = work_dir.join(format!("section_{}.mp3", index));
    let wav = work_dir.join(format!("section_{}.wav", index));

    let prepared = prepare_text_for_synthesis(text);
    if !elevenlabs_tts_to_mp3(client, cfg, &prepared, &VoiceSettings::default(), &mp3).await? {
        return Ok(None);
    }

    let (tempo, gain_db) = profile.adjustment(emotion);
    if !ffmpeg_adjust_voice(&mp3, tempo, gain_db, cfg.audio.sample_rate, &wav).await? {
        return Ok(None);
    }

    let duration = ffprobe_duration_seconds(&wav).await?;
    Ok(Some(MeasuredSection {
        index,
        wav,
        duration,
    }))
}

async fn assemble_narration(
    cfg: &Config,
    measured: &[MeasuredSection],
    emotions: &[Emotion],
    total: f64,
    work_dir: &Path,
) -> Result<PathBuf> {
    let rate = cfg.audio.sample_rate;
    let lead = work_dir.join("silence_lead.wav");
    let short_gap = work_dir.join("silence_gap_short.wav");
    let long_gap = work_dir.join("silence_gap_long.wav");
    let tail = work_dir.join("silence_tail.wav");

    ffmpeg_silence(LEAD_IN_SECONDS, rate, &lead).await?;
    ffmpeg_silence(DEFAULT_GAP_SECONDS, rate, &short_gap).await?;
    ffmpeg_silence(SUSPENSE_GAP_SECONDS, rate, &long_gap).await?;
    ffmpeg_silence(TAIL_SECONDS, rate, &tail).await?;

    let mut list = concat_list_entry(&lead);
    for (i, section) in measured.iter().enumerate() {
        if i > 0 {
            let gap = if emotions[i] == Emotion::Suspense {
                &long_gap
            } else {
                &short_gap
            };
            list.push_str(&concat_list_entry(gap));
        }
        list.push_str(&concat_list_entry(&section.wav));
    }
    list.push_str(&concat_list_entry(&tail));

    let list_path = work_dir.join("voice_concat.txt");
    fs::write(&list_path, list)
        .await
        .with_context(|| format!("Failed to write {}", list_path.display()))?;

    let raw = work_dir.join("narration_raw.wav");
    if !ffmpeg_concat_audio(&list_path, &raw).await? {
        anyhow::bail!("narration concat produced no file");
    }

    let out = work_dir.join("narration.m4a");
    if !ffmpeg_master_audio(&raw, total, cfg.audio.target_lufs, &cfg.audio.bitrate, &out).await? {
        anyhow::bail!("narration mastering produced no file");
    }
    Ok(out)
}

pub async fn synthesize_script(
    client: &Client,
    cfg: &Config,
    script: &GeneratedScript,
    profile: &VoiceProfile,
    work_dir: &Path,
) -> VoiceTrack {
    if let Err(err) = fs::create_dir_all(work_dir).await {
        logw(format!("Cannot create {}: {}", work_dir.display(), err));
    }

    if !cfg.has_elevenlabs() {
        logw("ELEVENLABS_API_KEY missing; using a silent narration track.");
        return silent_track(cfg, script, work_dir).await;
    }

    logi(format!(
        "Synthesising {} sections with profile '{}'",
        script.sections.len(),
        profile.name
    ));

    let mut measured = Vec::new();
    for (index, section) in script.sections.iter().enumerate() {
        match synthesize_section(
            client,
            cfg,
            profile,
            index,
            &section.content,
            section.emotion,
            work_dir,
        )
        .await
        {
            Ok(Some(m)) => measured.push(m),
            Ok(None) => logw(format!("Section {} produced no audio; skipped.", index + 1)),
            Err(err) => logw(format!("Section {} failed: {:#}", index + 1, err)),
        }
    }

    if measured.is_empty() {
        logw("No section was synthesised; using a silent narration track.");
        return silent_track(cfg, script, work_dir).await;
    }

    let emotions: Vec<Emotion> = measured
        .iter()
        .map(|m| script.sections[m.index].emotion)
        .collect();
    let clips: Vec<(f64, Emotion)> = measured
        .iter()
        .zip(&emotions)
        .map(|(m, e)| (m.duration, *e))
        .collect();
    let (starts, total) = plan_timeline(&clips);

    let audio_path = match assemble_narration(cfg, &measured, &emotions, total, work_dir).await {
        Ok(path) => path,
        Err(err) => {
            logw(format!("Narration assembly failed: {:#}", err));
            return silent_track(cfg, script, work_dir).await;
        }
    };

    let segments = measured
        .iter()
        .zip(starts)
        .map(|(m, start)| {
            let section = &script.sections[m.index];
            VoiceSegment {
                index: m.index,
                kind: section.kind,
                text: section.content.clone(),
                start,
                end: start + m.duration,
                duration: m.duration,
                emotion: section.emotion,
            }
        })
        .collect();

    logok(format!("Narration ready: {:.1} s", total));
    VoiceTrack {
        audio_path: Some(audio_path),
        segments,
        duration: total,
        silent: false,
    }
}
