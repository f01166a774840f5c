use crate::logw;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub project: ProjectConfig,
    pub branding: Branding,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub content: ContentConfig,
    pub seo: SeoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub openai_api_key: String,
    pub openai_model: String,
    pub tmdb_api_key: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_voice_id: String,
    pub elevenlabs_model_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            tmdb_api_key: String::new(),
            elevenlabs_api_key: String::new(),
            elevenlabs_voice_id: "pNInz6obpgDQGcFmaJgB".to_string(),
            elevenlabs_model_id: "eleven_multilingual_v2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub region: String,
    pub language: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            region: "MX".to_string(),
            language: "es-ES".to_string(),
        }
    }
}

/// Brand identity burnt into every card, overlay and thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub name: String,
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub font_file: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            name: "Cine Norte".to_string(),
            primary: "#E50914".to_string(),
            secondary: "#0A0A0A".to_string(),
            accent: "#C0C0C0".to_string(),
            font_file: None,
        }
    }
}

impl Branding {
    pub fn tag(&self) -> String {
        self.name.to_uppercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub fps: u32,
    pub bitrate: String,
    pub max_duration: u32,
    pub intro_duration: f64,
    pub outro_duration: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            bitrate: "5000k".to_string(),
            max_duration: 180,
            intro_duration: 3.0,
            outro_duration: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub bitrate: String,
    pub target_lufs: f64,
    pub background_music: bool,
    pub music_volume: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bitrate: "192k".to_string(),
            target_lufs: -16.0,
            background_music: true,
            music_volume: 0.12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub min_script_words: usize,
    pub max_script_words: usize,
    pub target_duration: u32,
    pub hashtags_base: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_script_words: 100,
            max_script_words: 500,
            target_duration: 120,
            hashtags_base: vec![
                "#CineNorte".to_string(),
                "#Cine".to_string(),
                "#Peliculas".to_string(),
                "#Series".to_string(),
                "#Streaming".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeoConfig {
    pub max_hashtags: usize,
    pub title_max_length: usize,
    pub description_max_length: usize,
    pub keywords: Vec<String>,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            max_hashtags: 10,
            title_max_length: 60,
            description_max_length: 160,
            keywords: [
                "cine",
                "películas",
                "series",
                "netflix",
                "streaming",
                "resumen",
                "análisis",
                "cine norte",
                "entretenimiento",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let _ = dotenvy::dotenv();

        let mut config = match fs::read_to_string(path).await {
            Ok(content) => Self::from_json(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                logw(format!(
                    "Config {} not found; using defaults and environment keys.",
                    path.display()
                ));
                Config::default()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read config: {}", path.display()));
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, slot: &mut String| {
            if let Some(value) = lookup(key) {
                if !value.trim().is_empty() {
                    *slot = value.trim().to_string();
                }
            }
        };
        pick("OPENAI_API_KEY", &mut self.api.openai_api_key);
        pick("TMDB_API_KEY", &mut self.api.tmdb_api_key);
        pick("ELEVENLABS_API_KEY", &mut self.api.elevenlabs_api_key);
    }

    pub fn has_openai(&self) -> bool {
        !self.api.openai_api_key.is_empty()
    }

    pub fn has_tmdb(&self) -> bool {
        !self.api.tmdb_api_key.is_empty()
    }

    pub fn has_elevenlabs(&self) -> bool {
        !self.api.elevenlabs_api_key.is_empty()
    }
}
