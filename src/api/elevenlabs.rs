use crate::config::Config;
use crate::logw;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

pub fn tts_request_body(cfg: &Config, text: &str, settings: &VoiceSettings) -> serde_json::Value {
    serde_json::json!({
        "text": text,
        "model_id": cfg.api.elevenlabs_model_id,
        "voice_settings": settings,
    })
}

pub async fn elevenlabs_tts_to_mp3(
    client: &Client,
    cfg: &Config,
    text: &str,
    settings: &VoiceSettings,
    out_mp3_path: &Path,
) -> Result<bool> {
    if !cfg.has_elevenlabs() {
        return Ok(false);
    }

    let url = format!(
        "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=mp3_44100_128",
        cfg.api.elevenlabs_voice_id
    );

    let resp = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("xi-api-key", &cfg.api.elevenlabs_api_key)
        .json(&tts_request_body(cfg, text, settings))
        .timeout(std::time::Duration::from_secs(300))
        .send()
        .await
        .context("ElevenLabs request failed")?;

    if !resp.status().is_success() {
        logw(format!("ElevenLabs TTS failed HTTP {}", resp.status().as_u16()));
        return Ok(false);
    }

    let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
    if bytes.is_empty() {
        logw("ElevenLabs returned an empty body.");
        return Ok(false);
    }
    if let Some(parent) = out_mp3_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    fs::write(out_mp3_path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", out_mp3_path.display()))?;

    Ok(fs::metadata(out_mp3_path).await.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_voice_settings() {
        let cfg = Config::default();
        let body = tts_request_body(&cfg, "Hola", &VoiceSettings::default());
        assert_eq!(body["model_id"], "eleven_multilingual_v2");
        assert_eq!(body["voice_settings"]["stability"], 0.5);
        assert_eq!(body["voice_settings"]["similarity_boost"], 0.75);
        assert_eq!(body["voice_settings"]["use_speaker_boost"], true);
    }

    #[tokio::test]
    async fn no_key_means_no_audio() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.mp3");
        let ok = elevenlabs_tts_to_mp3(
            &Client::new(),
            &Config::default(),
            "Hola",
            &VoiceSettings::default(),
            &out,
        )
        .await
        .unwrap();
        assert!(!ok);
        assert!(!out.exists());
    }
}
