use anyhow::{Context, Result};
use cine_norte::catalog::CatalogKind;
use cine_norte::config::Config;
use cine_norte::formats::{format_keys, format_table};
use cine_norte::generator::{RunOptions, optimize_existing_script, run_generation};
use cine_norte::init;
use cine_norte::{GeneratorLogHook, set_log_hook};
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "logs/cine_norte.log";

#[derive(Debug, Parser)]
#[command(name = "cine-norte", version, about = "Genera análisis de cine listos para publicar")]
struct Args {
    /// JSON config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Workspace holding projects/, exports/, assets/, prompts/ and logs/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Title to search for
    #[arg(long)]
    query: Option<String>,

    /// Streaming platform filter (Netflix, Prime Video, ...)
    #[arg(long)]
    platform: Option<String>,

    #[arg(long)]
    genre: Option<String>,

    /// movie, tv or all
    #[arg(long, default_value = "all")]
    kind: String,

    #[arg(long, default_value_t = 1)]
    limit: usize,

    /// Platform the script is written for
    #[arg(long, default_value = "youtube")]
    target: String,

    #[arg(long, default_value = "dynamic")]
    style: String,

    /// Voice profile key
    #[arg(long, default_value = "cinenorte_male")]
    voice: String,

    /// Export formats, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    formats: Vec<String>,

    /// Stop after script, audio, subtitles and thumbnails
    #[arg(long)]
    skip_video: bool,

    /// Print the export formats and exit
    #[arg(long)]
    list_formats: bool,

    /// Print tool and API key status and exit
    #[arg(long)]
    status: bool,

    /// Score an existing script file and write optimization suggestions
    #[arg(long, value_name = "SCRIPT")]
    optimize: Option<PathBuf>,
}

fn file_log_hook(path: &Path) -> Result<GeneratorLogHook> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    Ok(Arc::new(Mutex::new(move |line: &str| {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(&file, "{} {}", stamp, line);
    })))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.list_formats {
        println!("{}", format_table());
        return Ok(());
    }

    let _ = dotenvy::dotenv();
    let config = Config::load(&args.config).await?;

    if args.status {
        let status = init::system_status(&config, &args.root).await;
        println!("{}", status);
        if !status.media_ready() {
            tracing::warn!("Video stages need both ffmpeg and ffprobe.");
        }
        return Ok(());
    }

    init::ensure_directories_in(&args.root).await?;
    match file_log_hook(&args.root.join(LOG_FILE)) {
        Ok(hook) => set_log_hook(Some(hook)),
        Err(err) => eprintln!("[WARNING] {:#}", err),
    }

    if let Some(script) = &args.optimize {
        let out = optimize_existing_script(&config, &args.root, script).await?;
        println!("{}", out.display());
        set_log_hook(None);
        return Ok(());
    }

    let kind: CatalogKind = args.kind.parse()?;
    let opts = RunOptions {
        config,
        root: args.root,
        query: args.query,
        platform: args.platform,
        genre: args.genre,
        kind,
        limit: args.limit,
        target_platform: args.target,
        style: args.style,
        voice_profile: args.voice,
        formats: if args.formats.is_empty() {
            format_keys()
        } else {
            args.formats
        },
        skip_video: args.skip_video,
        ..RunOptions::default()
    };

    let summary = run_generation(&opts).await?;
    set_log_hook(None);
    std::process::exit(summary.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_hook_appends_under_root() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join(LOG_FILE);
        let hook = file_log_hook(&path).unwrap();
        {
            let callback = hook.lock().unwrap();
            callback("[INFO] primera");
            callback("[OK] segunda");
        }
        drop(hook);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] primera"));
    }

    #[test]
    fn flags_parse() {
        let args = Args::parse_from(["cine-norte", "--root", "/tmp/w", "--optimize", "g.txt"]);
        assert_eq!(args.root, PathBuf::from("/tmp/w"));
        assert_eq!(args.optimize, Some(PathBuf::from("g.txt")));
        assert!(!args.status);

        let args = Args::parse_from(["cine-norte", "--formats", "tiktok,youtube"]);
        assert_eq!(args.formats, vec!["tiktok", "youtube"]);
        assert_eq!(args.root, PathBuf::from("."));
    }
}
