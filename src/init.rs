use crate::config::Config;
use crate::logi;
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tokio::fs;

pub const REQUIRED_DIRS: &[&str] = &[
    "projects",
    "exports",
    "assets/music",
    "assets/logos",
    "assets/stock",
    "prompts",
    "logs",
];

pub async fn ensure_directories_in(root: &Path) -> Result<()> {
    for dir in REQUIRED_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            fs::create_dir_all(&path).await?;
            logi(format!("Created directory: {}", path.display()));
        }
    }
    Ok(())
}

async fn tool_runs(program: &str) -> bool {
    match tokio::process::Command::new(program)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

pub async fn check_ffmpeg() -> bool {
    tool_runs("ffmpeg").await
}

pub async fn check_ffprobe() -> bool {
    tool_runs("ffprobe").await
}

/// Tools, API keys and workspace layout, as printed by `--status`.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub timestamp: String,
    pub ffmpeg: bool,
    pub ffprobe: bool,
    pub openai: bool,
    pub tmdb: bool,
    pub elevenlabs: bool,
    pub missing_dirs: Vec<String>,
}

impl SystemStatus {
    /// Whether a full run can produce video.
    pub fn media_ready(&self) -> bool {
        self.ffmpeg && self.ffprobe
    }
}

fn mark(ok: bool) -> &'static str {
    if ok { "✅" } else { "⚠️" }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Estado del sistema ({})", self.timestamp)?;
        let tool = |ok: bool| if ok { "disponible" } else { "no encontrado" };
        writeln!(f, "  {} ffmpeg: {}", mark(self.ffmpeg), tool(self.ffmpeg))?;
        writeln!(f, "  {} ffprobe: {}", mark(self.ffprobe), tool(self.ffprobe))?;
        let keys = [
            ("OPENAI_API_KEY", self.openai, "guiones y SEO desde plantillas"),
            ("TMDB_API_KEY", self.tmdb, "catálogo de ejemplo"),
            ("ELEVENLABS_API_KEY", self.elevenlabs, "narración silenciosa"),
        ];
        for (key, ok, fallback) in keys {
            if ok {
                writeln!(f, "  {} {} configurada", mark(ok), key)?;
            } else {
                writeln!(f, "  {} {} no configurada: {}", mark(ok), key, fallback)?;
            }
        }
        if self.missing_dirs.is_empty() {
            write!(f, "  {} directorios listos", mark(true))
        } else {
            write!(
                f,
                "  {} directorios faltantes: {}",
                mark(false),
                self.missing_dirs.join(", ")
            )
        }
    }
}

pub fn missing_directories(root: &Path) -> Vec<String> {
    REQUIRED_DIRS
        .iter()
        .filter(|d| !root.join(d).is_dir())
        .map(|d| d.to_string())
        .collect()
}

pub async fn system_status(cfg: &Config, root: &Path) -> SystemStatus {
    SystemStatus {
        timestamp: chrono::Local::now().to_rfc3339(),
        ffmpeg: check_ffmpeg().await,
        ffprobe: check_ffprobe().await,
        openai: cfg.has_openai(),
        tmdb: cfg.has_tmdb(),
        elevenlabs: cfg.has_elevenlabs(),
        missing_dirs: missing_directories(root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_every_required_directory() {
        let root = tempfile::tempdir().unwrap();
        ensure_directories_in(root.path()).await.unwrap();
        for dir in REQUIRED_DIRS {
            assert!(root.path().join(dir).is_dir(), "missing {dir}");
        }
        // second pass is a no-op
        ensure_directories_in(root.path()).await.unwrap();
    }

    #[tokio::test]
    async fn status_reports_keys_and_missing_dirs() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.api.tmdb_api_key = "k".to_string();

        let status = system_status(&cfg, root.path()).await;
        assert!(status.tmdb);
        assert!(!status.openai);
        assert_eq!(status.missing_dirs.len(), REQUIRED_DIRS.len());

        let text = status.to_string();
        assert!(text.contains("TMDB_API_KEY configurada"));
        assert!(text.contains("OPENAI_API_KEY no configurada"));
        assert!(text.contains("directorios faltantes: projects"));

        ensure_directories_in(root.path()).await.unwrap();
        assert!(missing_directories(root.path()).is_empty());
    }

    #[test]
    fn media_needs_both_tools() {
        let status = SystemStatus {
            timestamp: String::new(),
            ffmpeg: true,
            ffprobe: false,
            openai: false,
            tmdb: false,
            elevenlabs: false,
            missing_dirs: Vec::new(),
        };
        assert!(!status.media_ready());
        assert!(status.to_string().ends_with("directorios listos"));
    }
}
