use crate::api::openai::{CompletionRequest, openai_complete};
use crate::catalog::{ContentInfo, ContentType};
use crate::config::Config;
use crate::script::GeneratedScript;
use crate::sections::SectionKind;
use crate::{logi, logok, logw};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SEO_PROMPT_FILE: &str = "prompts/02_seo_titles_hashtags.txt";
const TITLE_PAD_BELOW: usize = 50;
const TITLE_SUFFIX: &str = " - Análisis Cinematográfico";
const DESCRIPTION_SUFFIX: &str = " ¡Suscríbete para más análisis cinematográficos!";
const DESCRIPTION_CTA: &str = " ¡No olvides suscribirte y dar like!";
const MAX_KEYWORDS: usize = 20;
const MAX_TAGS: usize = 15;
const GENERAL_TAGS: [&str; 3] = ["#CineNorte", "#AnálisisCinematográfico", "#Entretenimiento"];

const BUILTIN_SEO_PROMPT: &str = "Genera contenido SEO para un video de Cine Norte sobre \"{title}\", \
disponible en {platform} (géneros: {genres}).\n\n\
Responde exactamente con este formato:\n\
Títulos:\n\
1) ...\n\
2) ...\n\
3) ...\n\
4) ...\n\
5) ...\n\
Hashtags:\n\
#...\n\
(entre 10 y 15 hashtags, uno por línea)";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoContent {
    pub titles: Vec<String>,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoData {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub tags: Vec<String>,
    pub category: String,
    pub language: String,
}

fn no_spaces(s: &str) -> String {
    s.split_whitespace().collect()
}

pub fn fallback_seo_content(content: &ContentInfo) -> SeoContent {
    SeoContent {
        titles: vec![
            format!("{} - {}", content.title, content.platform),
            format!("Nueva en {}: {}", content.platform, content.title),
        ],
        hashtags: vec![
            "#CineNorte".to_string(),
            format!("#{}", no_spaces(&content.platform)),
            format!("#{}", no_spaces(content.primary_genre())),
            "#Estrenos".to_string(),
        ],
    }
}

/// Fills `{title}`, `{platform}` and `{genres}`.
pub fn render_seo_prompt(template: &str, content: &ContentInfo) -> String {
    template
        .replace("{title}", &content.title)
        .replace("{platform}", &content.platform)
        .replace("{genres}", &content.genres.join(", "))
}

/// Prompt override location under the workspace `root`.
pub fn seo_prompt_path(root: &Path) -> PathBuf {
    root.join(SEO_PROMPT_FILE)
}

/// The template under `prompts/` when present, else the built-in one.
pub async fn load_seo_template(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if !text.trim().is_empty() => text,
        _ => BUILTIN_SEO_PROMPT.to_string(),
    }
}

/// Numbered lines under `Títulos:` (text after `)` or `.`) and `#` lines
/// under `Hashtags:`.
pub fn parse_seo_reply(reply: &str) -> SeoContent {
    let mut out = SeoContent::default();
    let mut in_titles = false;
    let mut in_hashtags = false;

    for raw in reply.lines() {
        let line = raw.trim().trim_start_matches(['*', '-']).trim();
        let lower = line.to_lowercase();
        if lower.starts_with("títulos:") || lower.starts_with("titulos:") {
            in_titles = true;
            in_hashtags = false;
            continue;
        }
        if lower.starts_with("hashtags:") {
            in_titles = false;
            in_hashtags = true;
            let inline: Vec<String> = line
                .get("hashtags:".len()..)
                .unwrap_or("")
                .split_whitespace()
                .filter(|t| t.starts_with('#') && t.len() > 1)
                .map(str::to_string)
                .collect();
            out.hashtags.extend(inline);
            continue;
        }
        if line.is_empty() {
            continue;
        }

        if in_titles && line.starts_with(|c: char| c.is_ascii_digit()) {
            let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
            if let Some(title) = rest.strip_prefix([')', '.']) {
                let title = title.trim().trim_matches('"');
                if !title.is_empty() {
                    out.titles.push(title.to_string());
                }
            }
        } else if in_hashtags && line.starts_with('#') {
            out.hashtags
                .extend(line.split_whitespace().filter(|t| t.len() > 1).map(str::to_string));
        }
    }
    out
}

pub async fn generate_seo_content(
    client: &Client,
    cfg: &Config,
    content: &ContentInfo,
    root: &Path,
) -> SeoContent {
    if !cfg.has_openai() {
        return fallback_seo_content(content);
    }

    logi(format!("Generating SEO titles for '{}'", content.title));
    let template = load_seo_template(&seo_prompt_path(root)).await;
    let user = render_seo_prompt(&template, content);
    let request = CompletionRequest {
        system: "Eres un especialista en SEO para videos de cine en redes sociales.",
        user: &user,
        json_mode: false,
        max_output_tokens: 500,
        temperature: 0.7,
    };

    match openai_complete(client, cfg, &request).await {
        Ok(Some(reply)) => {
            let parsed = parse_seo_reply(&reply);
            if parsed.titles.is_empty() && parsed.hashtags.is_empty() {
                logw("SEO reply had no titles or hashtags; using templates.");
                return fallback_seo_content(content);
            }
            logok(format!(
                "SEO ready: {} titles, {} hashtags",
                parsed.titles.len(),
                parsed.hashtags.len()
            ));
            parsed
        }
        Ok(None) => fallback_seo_content(content),
        Err(err) => {
            logw(format!("SEO generation failed: {:#}", err));
            fallback_seo_content(content)
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Pads short titles, truncates long ones and makes sure "análisis" appears.
pub fn optimize_title(title: &str, max_len: usize) -> String {
    let mut title = title.trim().to_string();
    if title.chars().count() < TITLE_PAD_BELOW {
        title.push_str(TITLE_SUFFIX);
    }
    title = truncate_chars(&title, max_len);
    if !title.to_lowercase().contains("análisis") {
        title = format!("Análisis: {}", title);
    }
    title
}

pub fn optimize_description(text: &str, max_len: usize) -> String {
    let mut description = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let len = description.chars().count();
    if len < max_len.saturating_sub(10) {
        description.push_str(DESCRIPTION_SUFFIX);
    } else if len > max_len {
        description = truncate_chars(&description, max_len);
    }
    if !description.to_lowercase().contains("suscríbete") {
        description.push_str(DESCRIPTION_CTA);
    }
    description.trim().to_string()
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !item.is_empty() && !list.iter().any(|k| k.to_lowercase() == item.to_lowercase()) {
        list.push(item);
    }
}

pub fn seo_keywords(cfg: &Config, script: &GeneratedScript) -> Vec<String> {
    let content = &script.content;
    let mut keywords = Vec::new();
    for genre in &content.genres {
        push_unique(&mut keywords, genre.to_lowercase());
    }
    push_unique(&mut keywords, content.content_type.as_str().to_string());
    for word in script.title.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.chars().count() > 3 {
            push_unique(&mut keywords, word);
        }
    }
    for kw in &cfg.seo.keywords {
        push_unique(&mut keywords, kw.to_lowercase());
    }
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

pub fn seo_tags(content: &ContentInfo) -> Vec<String> {
    let mut tags = Vec::new();
    for genre in &content.genres {
        push_unique(&mut tags, format!("#{}", no_spaces(genre)));
    }
    if !content.platform.trim().is_empty() {
        push_unique(
            &mut tags,
            format!("#{}", no_spaces(&content.platform).replace('+', "Plus")),
        );
    }
    for tag in GENERAL_TAGS {
        push_unique(&mut tags, tag.to_string());
    }
    tags.truncate(MAX_TAGS);
    tags
}

pub fn category(content: &ContentInfo) -> &'static str {
    match content.content_type {
        ContentType::Movie => "Películas",
        ContentType::Tv => "Series",
    }
}

pub fn build_seo_data(cfg: &Config, script: &GeneratedScript) -> SeoData {
    let base_description = script
        .section(SectionKind::Plot)
        .map(|s| s.content.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| script.content.overview.clone());

    let mut hashtags = script.hashtags.clone();
    hashtags.truncate(cfg.seo.max_hashtags);

    SeoData {
        title: optimize_title(&script.title, cfg.seo.title_max_length),
        description: optimize_description(&base_description, cfg.seo.description_max_length),
        keywords: seo_keywords(cfg, script),
        hashtags,
        tags: seo_tags(&script.content),
        category: category(&script.content).to_string(),
        language: "es".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SampleCatalog;
    use crate::script::fallback_script;

    fn oppenheimer() -> ContentInfo {
        SampleCatalog::entries()
            .into_iter()
            .find(|c| c.title == "Oppenheimer")
            .unwrap()
    }

    #[test]
    fn reply_blocks_are_collected() {
        let reply = "Aquí tienes:\n\
                     Títulos:\n\
                     1) Oppenheimer: la bomba que cambió todo\n\
                     2. Lo que nadie te dijo de Oppenheimer\n\
                     Sin número\n\
                     Hashtags:\n\
                     #Oppenheimer\n\
                     #Nolan #Cine\n\
                     texto suelto\n";
        let seo = parse_seo_reply(reply);
        assert_eq!(
            seo.titles,
            vec![
                "Oppenheimer: la bomba que cambió todo",
                "Lo que nadie te dijo de Oppenheimer"
            ]
        );
        assert_eq!(seo.hashtags, vec!["#Oppenheimer", "#Nolan", "#Cine"]);
    }

    #[test]
    fn hashtags_on_header_line_are_kept() {
        let seo = parse_seo_reply("Hashtags: #A #B no\n");
        assert_eq!(seo.hashtags, vec!["#A", "#B"]);
        assert!(seo.titles.is_empty());
    }

    #[test]
    fn fallback_uses_title_and_platform() {
        let mut content = oppenheimer();
        content.platform = "Apple TV+".to_string();
        let seo = fallback_seo_content(&content);
        assert_eq!(seo.titles[0], "Oppenheimer - Apple TV+");
        assert_eq!(seo.titles[1], "Nueva en Apple TV+: Oppenheimer");
        assert_eq!(seo.hashtags[0], "#CineNorte");
        assert_eq!(seo.hashtags[1], "#AppleTV+");
        assert_eq!(seo.hashtags[3], "#Estrenos");
    }

    #[tokio::test]
    async fn without_key_generation_falls_back() {
        let cfg = Config::default();
        let seo = generate_seo_content(&Client::new(), &cfg, &oppenheimer(), Path::new(".")).await;
        assert_eq!(seo, fallback_seo_content(&oppenheimer()));
    }

    #[test]
    fn prompt_placeholders_are_filled() {
        let prompt = render_seo_prompt(BUILTIN_SEO_PROMPT, &oppenheimer());
        assert!(prompt.contains("\"Oppenheimer\""));
        assert!(prompt.contains("Netflix"));
        assert!(!prompt.contains("{genres}"));
    }

    #[tokio::test]
    async fn template_file_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seo.txt");
        assert_eq!(load_seo_template(&path).await, BUILTIN_SEO_PROMPT);
        std::fs::write(&path, "Títulos para {title}").unwrap();
        assert_eq!(load_seo_template(&path).await, "Títulos para {title}");
    }

    #[tokio::test]
    async fn prompt_override_resolves_under_root() {
        let root = tempfile::tempdir().unwrap();
        let path = seo_prompt_path(root.path());
        assert_eq!(path, root.path().join("prompts/02_seo_titles_hashtags.txt"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "Hashtags para {title}").unwrap();
        assert_eq!(load_seo_template(&path).await, "Hashtags para {title}");
        assert_eq!(
            load_seo_template(&seo_prompt_path(&root.path().join("otro"))).await,
            BUILTIN_SEO_PROMPT
        );
    }

    #[test]
    fn title_rules() {
        assert_eq!(
            optimize_title("Análisis de Barbie", 60),
            "Análisis de Barbie - Análisis Cinematográfico"
        );
        let long = "x".repeat(80);
        let t = optimize_title(&long, 60);
        assert!(t.starts_with("Análisis: "));
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), "Análisis: ".chars().count() + 60);
    }

    #[test]
    fn description_rules() {
        let short = optimize_description("Una historia breve.", 160);
        assert!(short.ends_with("¡Suscríbete para más análisis cinematográficos!"));

        let long = optimize_description(&"palabra ".repeat(40), 160);
        assert!(long.contains("..."));
        assert!(long.ends_with("¡No olvides suscribirte y dar like!"));
    }

    #[test]
    fn seo_data_from_fallback_script() {
        let cfg = Config::default();
        let script = fallback_script(&cfg, &oppenheimer(), "youtube");
        let seo = build_seo_data(&cfg, &script);
        assert!(seo.title.to_lowercase().contains("análisis"));
        assert!(seo.title.chars().count() <= cfg.seo.title_max_length + 10);
        assert!(seo.keywords.contains(&"movie".to_string()));
        assert!(seo.keywords.contains(&"oppenheimer".to_string()));
        assert!(seo.keywords.len() <= 20);
        assert!(seo.tags.contains(&"#Netflix".to_string()));
        assert!(seo.tags.contains(&"#CineNorte".to_string()));
        assert!(seo.hashtags.len() <= cfg.seo.max_hashtags);
        assert_eq!(seo.category, "Películas");
        assert_eq!(seo.language, "es");
    }

    #[test]
    fn platform_plus_becomes_word() {
        let content = ContentInfo {
            platform: "Disney+".to_string(),
            genres: vec!["Ciencia Ficción".to_string()],
            content_type: ContentType::Tv,
            ..Default::default()
        };
        let tags = seo_tags(&content);
        assert_eq!(tags[0], "#CienciaFicción");
        assert_eq!(tags[1], "#DisneyPlus");
        assert_eq!(category(&content), "Series");
    }
}
