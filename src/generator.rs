use crate::api::tmdb::{TmdbCatalog, download_image};
use crate::catalog::{
    CatalogKind, CatalogSource, ContentInfo, SampleCatalog, SelectionCriteria, analyze_viability,
    select_content,
};
use crate::compose::{ComposeInputs, compose, master_layers};
use crate::config::Config;
use crate::ffmpeg;
use crate::formats::{GeneratedFormat, export_all, format_keys, resolve_formats};
use crate::init::{check_ffmpeg, check_ffprobe, ensure_directories_in};
use crate::optimizer::{self, SuggestionInput};
use crate::script::{GeneratedScript, export_txt, generate_script, script_from_reply};
use crate::seo::{build_seo_data, generate_seo_content};
use crate::srt::{write_srt, write_vtt};
use crate::subtitle::align;
use crate::thumbnail::{GeneratedThumbnail, THUMBNAILS, ThumbnailRequest, generate_all};
use crate::voice::{VoiceProfile, VoiceTrack, silent_plan, synthesize_script};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use walkdir::WalkDir;

const MUSIC_EXTENSIONS: [&str; 4] = ["mp3", "m4a", "wav", "ogg"];
const MIN_MUSIC_SECONDS: f64 = 10.0;
const HTTP_TIMEOUT_SECS: u64 = 120;
const SUGGESTIONS_FILE: &str = "optimization_suggestions.json";
const UNTITLED_SCRIPT: &str = "Contenido a optimizar";

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn ensure_dir(path: &Path) -> Result<()> {
    if !dir_exists(path).await {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create dir {}", path.display()))?;
    }
    Ok(())
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Config,
    pub root: PathBuf,
    pub query: Option<String>,
    pub platform: Option<String>,
    pub genre: Option<String>,
    pub kind: CatalogKind,
    pub limit: usize,
    pub target_platform: String,
    pub style: String,
    pub voice_profile: String,
    pub thumbnail_scheme: String,
    pub formats: Vec<String>,
    pub skip_video: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config: Config::default(),
            root: PathBuf::from("."),
            query: None,
            platform: None,
            genre: None,
            kind: CatalogKind::All,
            limit: 1,
            target_platform: "youtube".to_string(),
            style: "dynamic".to_string(),
            voice_profile: "cinenorte_male".to_string(),
            thumbnail_scheme: "cinematic".to_string(),
            formats: format_keys(),
            skip_video: false,
        }
    }
}

impl RunOptions {
    fn criteria(&self) -> SelectionCriteria {
        SelectionCriteria {
            query: self.query.clone(),
            platform: self.platform.clone(),
            genre: self.genre.clone(),
            kind: self.kind,
            limit: self.limit.max(1),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub reports: Vec<PathBuf>,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        if self.processed > 0 { 0 } else { 1 }
    }
}

/// `{YYYYMMDD}_{Title_With_Underscores}`.
pub fn project_name(content: &ContentInfo, date: chrono::NaiveDate) -> String {
    format!("{}_{}", date.format("%Y%m%d"), content.file_slug())
}

/// Path relative to the project dir, for the report.
fn rel(path: &Path, base: &Path) -> String {
    pathdiff::diff_paths(path, base)
        .unwrap_or_else(|| path.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}

async fn list_music(dir: &Path) -> Vec<PathBuf> {
    if !dir_exists(dir).await {
        return Vec::new();
    }
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(OsStr::to_str)
                .map(|ext| MUSIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect()
}

/// Random track long enough to sit under the narration; tracks whose
/// duration cannot be read are dropped from the draw.
async fn pick_background_music(dir: &Path) -> Option<PathBuf> {
    let mut songs = list_music(dir).await;
    if songs.is_empty() {
        logi(format!("No background music in {}", dir.display()));
        return None;
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
    while !songs.is_empty() {
        let idx = rng.gen_range(0..songs.len());
        let song = songs.swap_remove(idx);
        match ffmpeg::ffprobe_duration_seconds(&song).await {
            Ok(d) if d >= MIN_MUSIC_SECONDS => return Some(song),
            Ok(d) => logw(format!("Skipping short track {} ({:.1} s)", song.display(), d)),
            Err(err) => logw(format!("Skipping {}: {}", song.display(), err)),
        }
    }
    None
}

/// Mixes a random track under the master in place. Leaves the master
/// untouched when no track is usable or the mix fails.
async fn add_background_music(cfg: &Config, root: &Path, master: &Path) -> Result<bool> {
    let Some(song) = pick_background_music(&root.join("assets/music")).await else {
        return Ok(false);
    };
    let mixed = master.with_file_name("master_bgm.mp4");
    logi(format!("Mixing background music {}", song.display()));
    match ffmpeg::ffmpeg_mix_bgm(master, &song, cfg.audio.music_volume, &mixed).await {
        Ok(true) => {
            fs::rename(&mixed, master)
                .await
                .with_context(|| format!("replace {}", master.display()))?;
            logok("Background music mixed.");
            Ok(true)
        }
        Ok(false) => {
            logw("BGM mix produced no file; keeping narration-only master.");
            Ok(false)
        }
        Err(err) => {
            logw(format!("BGM mix failed: {}", err));
            Ok(false)
        }
    }
}

#[derive(Debug, Serialize)]
struct FormatEntry {
    key: String,
    video_path: String,
    thumbnail_path: Option<String>,
    optimization_score: f64,
    metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ThumbnailEntry {
    platform: String,
    image_path: String,
    color_scheme: String,
    optimization_score: f64,
}

struct Pipeline<'a> {
    client: &'a reqwest::Client,
    opts: &'a RunOptions,
    has_ffmpeg: bool,
}

impl Pipeline<'_> {
    fn cfg(&self) -> &Config {
        &self.opts.config
    }

    async fn script(&self, content: &ContentInfo, project_dir: &Path) -> Result<GeneratedScript> {
        let cfg = self.cfg();
        let script = generate_script(
            self.client,
            cfg,
            content,
            &self.opts.target_platform,
            cfg.content.target_duration,
            &self.opts.style,
        )
        .await;
        export_txt(&script, &project_dir.join("script.txt")).await?;
        write_json(&project_dir.join("script.json"), &script).await?;
        Ok(script)
    }

    /// Without ffmpeg no audio can be written; subtitles still follow the
    /// planned timing.
    async fn narration(&self, script: &GeneratedScript, project_dir: &Path) -> VoiceTrack {
        if !self.has_ffmpeg {
            logw("ffmpeg not found; narration timing only.");
            return silent_plan(script);
        }
        let profile = VoiceProfile::by_key(&self.opts.voice_profile);
        synthesize_script(
            self.client,
            self.cfg(),
            script,
            &profile,
            &project_dir.join("audio"),
        )
        .await
    }

    /// Only ffmpeg stages consume the backdrop.
    async fn backdrop(&self, content: &ContentInfo, project_dir: &Path) -> Option<PathBuf> {
        if !self.has_ffmpeg {
            return None;
        }
        let out = project_dir.join("backdrop.jpg");
        let url = if content.backdrop_url.is_empty() {
            &content.poster_url
        } else {
            &content.backdrop_url
        };
        match download_image(self.client, url, &out).await {
            Ok(true) => Some(out),
            Ok(false) => None,
            Err(err) => {
                logw(format!("Backdrop download failed: {:#}", err));
                None
            }
        }
    }

    async fn master(
        &self,
        content: &ContentInfo,
        track: &VoiceTrack,
        backdrop: Option<&Path>,
        subtitles: &Path,
        project_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        if self.opts.skip_video {
            logi("Video composition skipped.");
            return Ok(None);
        }
        if !self.has_ffmpeg {
            logw("ffmpeg not found; video composition skipped.");
            return Ok(None);
        }

        let inputs = ComposeInputs {
            content,
            background: backdrop,
            narration: track.audio_path.as_deref(),
            subtitles: Some(subtitles),
            narration_duration: track.duration,
        };
        let master = match compose(self.cfg(), &inputs, &project_dir.join("video")).await {
            Ok(Some(master)) => master,
            Ok(None) => return Ok(None),
            Err(err) => {
                logw(format!("Composition failed: {:#}", err));
                return Ok(None);
            }
        };

        if self.cfg().audio.background_music {
            add_background_music(self.cfg(), &self.opts.root, &master).await?;
        }
        Ok(Some(master))
    }

    async fn process_content(&self, content: ContentInfo) -> Result<PathBuf> {
        let root = &self.opts.root;
        let today = chrono::Local::now().date_naive();
        let name = project_name(&content, today);
        let project_dir = root.join("projects").join(&name);
        let export_dir = root.join("exports").join(&name);
        ensure_dir(&project_dir).await?;
        ensure_dir(&export_dir).await?;

        let script = self.script(&content, &project_dir).await?;

        let track = self.narration(&script, &project_dir).await;

        let cues = align(&script, &track);
        let srt_path = project_dir.join("subtitles_es.srt");
        let vtt_path = project_dir.join("subtitles_es.vtt");
        write_srt(&cues, &srt_path).await?;
        write_vtt(&cues, &vtt_path).await?;
        logok(format!("Subtitles: {} cues", cues.len()));

        let seo_content = generate_seo_content(self.client, self.cfg(), &content, root).await;
        let seo_data = build_seo_data(self.cfg(), &script);

        let backdrop = self.backdrop(&content, &project_dir).await;
        let master = self
            .master(&content, &track, backdrop.as_deref(), &srt_path, &project_dir)
            .await?;

        let formats: Vec<GeneratedFormat> = match &master {
            Some(master) => {
                let specs = resolve_formats(&self.opts.formats);
                export_all(master, &specs, &export_dir, &content, &self.cfg().branding).await
            }
            None => Vec::new(),
        };

        let thumbnails: Vec<GeneratedThumbnail> = if self.has_ffmpeg {
            let req = ThumbnailRequest {
                master: master.as_deref(),
                backdrop: backdrop.as_deref(),
                content: &content,
                title: &script.title,
            };
            generate_all(
                self.cfg(),
                &req,
                &THUMBNAILS,
                &self.opts.thumbnail_scheme,
                &export_dir.join("thumbnails"),
            )
            .await
        } else {
            logw("ffmpeg not found; thumbnails skipped.");
            Vec::new()
        };

        let thumb_scores: Vec<f64> = thumbnails.iter().map(|t| t.optimization_score).collect();
        let analysis = if script.sections.is_empty() {
            logw("Script has no sections; using neutral scores.");
            optimizer::fallback_analysis()
        } else {
            optimizer::analyze(&script, &track, &thumb_scores, today)
        };
        let viability = analyze_viability(&content);
        let layers = match &master {
            Some(_) => master_layers(backdrop.is_some()),
            None => Vec::new(),
        };
        let suggestions = optimizer::suggestions(&SuggestionInput {
            title: &script.title,
            text: &script.full_text(),
            sections: script.sections.len(),
            duration: track.duration,
            elements: &layers,
        });

        let report = serde_json::json!({
            "generated_at": chrono::Local::now().to_rfc3339(),
            "project": name,
            "content": content,
            "target_platform": self.opts.target_platform,
            "artifacts": {
                "script": "script.txt",
                "script_json": "script.json",
                "narration": track.audio_path.as_deref().map(|p| rel(p, &project_dir)),
                "narration_silent": track.silent,
                "narration_seconds": track.duration,
                "subtitles_srt": rel(&srt_path, &project_dir),
                "subtitles_vtt": rel(&vtt_path, &project_dir),
                "backdrop": backdrop.as_deref().map(|p| rel(p, &project_dir)),
                "master": master.as_deref().map(|p| rel(p, &project_dir)),
            },
            "script": {
                "title": script.title,
                "sections": script.sections.len(),
                "total_duration": script.total_duration,
                "word_count": script.word_count,
                "visual_style": script.visual_style,
                "music_suggestion": script.music_suggestion,
            },
            "seo": {
                "generated": seo_content,
                "data": seo_data,
            },
            "analysis": analysis,
            "suggestions": suggestions,
            "viability": viability,
            "formats": formats
                .iter()
                .map(|f| FormatEntry {
                    key: f.key.clone(),
                    video_path: rel(&f.video_path, &project_dir),
                    thumbnail_path: f.thumbnail_path.as_deref().map(|p| rel(p, &project_dir)),
                    optimization_score: f.optimization_score,
                    metadata: f.metadata.clone(),
                })
                .collect::<Vec<_>>(),
            "thumbnails": thumbnails
                .iter()
                .map(|t| ThumbnailEntry {
                    platform: t.platform.clone(),
                    image_path: rel(&t.image_path, &project_dir),
                    color_scheme: t.color_scheme.clone(),
                    optimization_score: t.optimization_score,
                })
                .collect::<Vec<_>>(),
        });

        let report_path = project_dir.join("report.json");
        write_json(&report_path, &report).await?;
        logok(format!(
            "Report written: {} (overall {:.1}, {} formats)",
            report_path.display(),
            analysis.overall_score,
            formats.len()
        ));
        Ok(report_path)
    }
}

pub async fn run_generation(opts: &RunOptions) -> Result<RunSummary> {
    let cfg = &opts.config;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .context("Failed to build HTTP client")?;

    let has_ffmpeg = check_ffmpeg().await;
    if !has_ffmpeg {
        logw("ffmpeg is not available; audio, video and thumbnails will be skipped.");
    } else if !check_ffprobe().await {
        logw("ffprobe is not available; format scores and music checks will degrade.");
    }

    let source: Box<dyn CatalogSource> = if cfg.has_tmdb() {
        Box::new(TmdbCatalog::new(client.clone(), cfg))
    } else {
        logw("TMDB_API_KEY missing; using the built-in sample catalog.");
        Box::new(SampleCatalog)
    };

    run_with_source(opts, &client, source.as_ref(), has_ffmpeg).await
}

/// Runs the pipeline over titles from `source`. Media stages run only when
/// `has_ffmpeg` is set.
pub async fn run_with_source(
    opts: &RunOptions,
    client: &reqwest::Client,
    source: &dyn CatalogSource,
    has_ffmpeg: bool,
) -> Result<RunSummary> {
    ensure_directories_in(&opts.root).await?;

    let selected = select_content(source, &opts.criteria()).await;
    logi(format!("Selected {} title(s) from '{}'", selected.len(), source.name()));

    let pipeline = Pipeline {
        client,
        opts,
        has_ffmpeg,
    };

    let mut summary = RunSummary::default();
    for content in selected {
        let title = content.title.clone();
        logi(format!("=== Processing: {} ===", title));
        match pipeline.process_content(content).await {
            Ok(report) => {
                summary.processed += 1;
                summary.reports.push(report);
                logok(format!("DONE: {}", title));
            }
            Err(err) => {
                summary.failed += 1;
                logw(format!("FAILED: {}: {:#}", title, err));
            }
        }
    }

    logi(format!(
        "All done. Processed: {}, failed: {}",
        summary.processed, summary.failed
    ));
    Ok(summary)
}

fn script_title(text: &str) -> String {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("Título:"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED_SCRIPT)
        .to_string()
}

/// Scores an existing script file and writes
/// `exports/optimization_suggestions.json` under `root`.
pub async fn optimize_existing_script(cfg: &Config, root: &Path, script_path: &Path) -> Result<PathBuf> {
    let text = fs::read_to_string(script_path)
        .await
        .with_context(|| format!("Failed to read script {}", script_path.display()))?;
    if text.trim().is_empty() {
        anyhow::bail!("Script {} is empty", script_path.display());
    }

    let title = script_title(&text);
    logi(format!("Optimizing existing script '{}'", title));
    let content = ContentInfo {
        title: title.clone(),
        ..Default::default()
    };
    let script = script_from_reply(cfg, &content, "youtube", &text)
        .with_context(|| format!("No script sections in {}", script_path.display()))?;
    let track = silent_plan(&script);

    let today = chrono::Local::now().date_naive();
    let analysis = optimizer::analyze(&script, &track, &[], today);
    let suggestions = optimizer::suggestions(&SuggestionInput {
        title: &title,
        text: &text,
        sections: script.sections.len(),
        duration: track.duration,
        elements: &[],
    });

    let export_dir = root.join("exports");
    ensure_dir(&export_dir).await?;
    let out = export_dir.join(SUGGESTIONS_FILE);
    let doc = serde_json::json!({
        "script": script_path.display().to_string(),
        "title": title,
        "analysis": analysis,
        "suggestions": suggestions,
    });
    write_json(&out, &doc).await?;
    logok(format!(
        "Optimization: overall {:.1}, {} suggestions -> {}",
        analysis.overall_score,
        suggestions.len(),
        out.display()
    ));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_names_use_date_and_slug() {
        let content = ContentInfo {
            title: "Dune: Parte Dos".to_string(),
            ..Default::default()
        };
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(project_name(&content, date), "20240301_Dune_Parte_Dos");
    }

    #[test]
    fn relative_paths_for_report() {
        let base = Path::new("/w/projects/x");
        assert_eq!(rel(Path::new("/w/projects/x/video/master.mp4"), base), "video/master.mp4");
        assert_eq!(rel(Path::new("/w/exports/x/a.mp4"), base), "../../exports/x/a.mp4");
    }

    #[test]
    fn exit_code_follows_processed_count() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.exit_code(), 1);
        summary.processed = 1;
        assert_eq!(summary.exit_code(), 0);
    }

    #[tokio::test]
    async fn music_listing_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("sub/b.M4A"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let mut found = list_music(dir.path()).await;
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(list_music(&dir.path().join("missing")).await.is_empty());
    }

    /// Serves fixed titles from memory; no poster URLs.
    struct LocalCatalog(Vec<ContentInfo>);

    #[async_trait::async_trait]
    impl CatalogSource for LocalCatalog {
        fn name(&self) -> &'static str {
            "local"
        }

        async fn trending(
            &self,
            _kind: CatalogKind,
            _window: crate::catalog::TimeWindow,
        ) -> Result<Vec<ContentInfo>> {
            Ok(self.0.clone())
        }

        async fn search_type(
            &self,
            query: &str,
            content_type: crate::catalog::ContentType,
        ) -> Result<Vec<ContentInfo>> {
            Ok(self
                .0
                .iter()
                .filter(|c| c.content_type == content_type && c.title.contains(query))
                .cloned()
                .collect())
        }
    }

    fn local_title() -> ContentInfo {
        ContentInfo {
            id: 7,
            title: "Grey's Anatomy".to_string(),
            overview: "Residentes de cirugía en Seattle.".to_string(),
            release_date: "2005-03-27".to_string(),
            genres: vec!["Drama".to_string()],
            rating: 8.2,
            popularity: 90.0,
            platform: "Disney+".to_string(),
            content_type: crate::catalog::ContentType::Tv,
            language: "en".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn offline_run_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let opts = RunOptions {
            root: dir.path().to_path_buf(),
            query: Some("Grey".to_string()),
            ..RunOptions::default()
        };
        let client = reqwest::Client::new();
        let source = LocalCatalog(vec![local_title()]);

        let summary = run_with_source(&opts, &client, &source, false).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.exit_code(), 0);

        let report_path = &summary.reports[0];
        let project = report_path.parent().unwrap();
        assert!(project.file_name().unwrap().to_string_lossy().ends_with("_Greys_Anatomy"));
        assert!(project.join("script.txt").exists());
        assert!(project.join("subtitles_es.srt").exists());
        assert!(project.join("subtitles_es.vtt").exists());
        assert!(!project.join("backdrop.jpg").exists());
        assert!(dir.path().join("assets/music").is_dir());

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report["content"]["title"], "Grey's Anatomy");
        assert_eq!(report["artifacts"]["subtitles_srt"], "subtitles_es.srt");
        assert!(report["artifacts"]["narration"].is_null());
        assert!(report["artifacts"]["master"].is_null());
        assert!(report["formats"].as_array().unwrap().is_empty());
        assert!(report["thumbnails"].as_array().unwrap().is_empty());
        assert!(report["seo"]["data"]["title"].as_str().unwrap().contains("Análisis"));
        let overall = report["analysis"]["overall_score"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&overall));
        let suggestions = report["suggestions"].as_array().unwrap();
        assert!(!suggestions.is_empty() && suggestions.len() <= 10);
        assert!(report["viability"]["total_score"].as_f64().is_some());
    }

    #[tokio::test]
    async fn empty_selection_exits_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        let opts = RunOptions {
            root: dir.path().to_path_buf(),
            query: Some("Nada".to_string()),
            platform: Some("Plataforma Inexistente".to_string()),
            ..RunOptions::default()
        };
        let client = reqwest::Client::new();
        let summary = run_with_source(&opts, &client, &LocalCatalog(Vec::new()), false)
            .await
            .unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn script_titles_come_from_the_header() {
        assert_eq!(script_title("GUION\nTítulo:  Barbie \nPlataforma: youtube"), "Barbie");
        assert_eq!(script_title("Título:\nalgo"), UNTITLED_SCRIPT);
        assert_eq!(script_title("solo texto"), UNTITLED_SCRIPT);
    }

    #[tokio::test]
    async fn existing_script_gets_suggestions_file() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("guion.txt");
        std::fs::write(
            &script_path,
            "Título: Barbie\n\nUna muñeca descubre el mundo real. ¿Quién decide quién es?",
        )
        .unwrap();

        let out = optimize_existing_script(&Config::default(), dir.path(), &script_path)
            .await
            .unwrap();
        assert_eq!(out, dir.path().join("exports").join(SUGGESTIONS_FILE));

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(doc["title"], "Barbie");
        assert!(doc["analysis"]["overall_score"].as_f64().is_some());
        let kinds: Vec<&str> = doc["suggestions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["type"].as_str().unwrap())
            .collect();
        assert!(kinds.contains(&"script"));
        assert_eq!(doc["suggestions"][0]["priority"], "high");
    }

    #[tokio::test]
    async fn empty_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("vacio.txt");
        std::fs::write(&script_path, "  \n").unwrap();
        assert!(
            optimize_existing_script(&Config::default(), dir.path(), &script_path)
                .await
                .is_err()
        );
        assert!(
            optimize_existing_script(&Config::default(), dir.path(), &dir.path().join("missing.txt"))
                .await
                .is_err()
        );
    }
}
