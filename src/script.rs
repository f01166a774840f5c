use crate::api::openai::{CompletionRequest, openai_complete};
use crate::catalog::ContentInfo;
use crate::config::Config;
use crate::sections::{Emotion, ScriptSection, SectionKind, parse_sections};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

const MAX_HASHTAGS: usize = 15;
const MAX_GENRE_TAGS: usize = 3;
const FALLBACK_OVERVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub title: String,
    pub content: ContentInfo,
    pub sections: Vec<ScriptSection>,
    pub total_duration: u32,
    pub word_count: usize,
    pub target_platform: String,
    pub hashtags: Vec<String>,
    pub title_suggestions: Vec<String>,
    pub visual_style: String,
    pub music_suggestion: String,
    pub raw_text: String,
}

impl GeneratedScript {
    pub fn section(&self, kind: SectionKind) -> Option<&ScriptSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn full_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn system_prompt(cfg: &Config) -> String {
    let b = &cfg.branding;
    format!(
        "Eres un experto editor audiovisual y creador de contenido para {name}, \
una marca especializada en análisis cinematográfico para redes sociales.\n\
Tu misión es crear guiones dinámicos, atractivos y optimizados para engagement \
que mantengan la identidad de marca de {name}.\n\n\
Características de {name}:\n\
- Paleta de colores: Rojo {primary}, Negro {secondary}, Plateado {accent}\n\
- Estilo: Cinematográfico, profesional, con toque de misterio\n\
- Audiencia: Cinéfilos, amantes del entretenimiento, usuarios de redes sociales\n\
- Duración: Máximo 3 minutos por video\n\n\
Reglas importantes:\n\
1. NO reveles spoilers importantes de la trama\n\
2. Mantén un tono dinámico y emocionante\n\
3. Incluye elementos visuales y de audio específicos\n\
4. Optimiza para la plataforma objetivo\n\
5. Usa lenguaje natural y conversacional\n\
6. Incluye call-to-actions para engagement",
        name = b.name,
        primary = b.primary,
        secondary = b.secondary,
        accent = b.accent,
    )
}

fn platform_instructions(platform: &str) -> &'static str {
    match platform {
        "youtube" => {
            "Optimizado para YouTube: guion más largo, análisis detallado, intros/outros elaborados"
        }
        "tiktok" => {
            "Optimizado para TikTok: guion corto y directo, hooks inmediatos, ritmo acelerado"
        }
        p if p.starts_with("instagram") => {
            "Optimizado para Instagram: visual, estético, historias en highlights"
        }
        _ => "General",
    }
}

fn style_instructions(style: &str) -> &'static str {
    match style {
        "dynamic" => "Estilo dinámico: ritmo rápido, cortes frecuentes, mucha energía",
        "dramatic" => "Estilo dramático: pausas estratégicas, énfasis emocional, tensión",
        "comedic" => "Estilo cómico: humor sutil, comentarios ingeniosos, tono ligero",
        "analytical" => "Estilo analítico: enfoque en técnica, dirección, actuaciones",
        _ => "Dinámico",
    }
}

pub fn build_prompt(content: &ContentInfo, platform: &str, duration_target: u32, style: &str) -> String {
    format!(
        "Crea un guion para un video de Cine Norte sobre:\n\n\
TÍTULO: {title}\n\
TIPO: {kind}\n\
GÉNERO: {genres}\n\
PLATAFORMA: {platform_name}\n\
RATING: {rating:.1}/10\n\
SINOPSIS: {overview}\n\
FECHA DE ESTRENO: {date}\n\
DURACIÓN OBJETIVO: {duration} segundos\n\n\
INSTRUCCIONES ESPECÍFICAS:\n\
- Plataforma: {pi}\n\
- Estilo: {si}\n\
- Duración máxima: 3 minutos\n\
- Idioma: Español (México)\n\
- Sin spoilers importantes\n\n\
ESTRUCTURA REQUERIDA:\n\
1. INTRO (5-10 seg): Hook inmediato + presentación Cine Norte\n\
2. HOOK (10-15 seg): Elemento más atractivo sin spoilers\n\
3. PLOT (60-90 seg): Resumen de trama con análisis\n\
4. ANÁLISIS (30-45 seg): Aspectos técnicos o temáticos\n\
5. OUTRO (10-15 seg): Call-to-action + despedida\n\n\
Para cada sección incluye el texto del guion, la duración estimada en segundos, \
indicaciones visuales específicas, palabras clave para énfasis y la emoción objetivo.\n\n\
Responde SOLO con JSON con esta forma:\n\
{{\"sections\":[{{\"type\":\"intro|hook|plot|analysis|outro\",\"content\":\"...\",\
\"duration_seconds\":10,\"visual_cues\":[\"...\"],\
\"emotion\":\"excitement|suspense|drama|neutral|comedy\",\"emphasis_words\":[\"...\"]}}]}}\n",
        title = content.title,
        kind = content.content_type.as_str().to_uppercase(),
        genres = content.genres.join(", "),
        platform_name = content.platform,
        rating = content.rating,
        overview = content.overview,
        date = content.release_date,
        duration = duration_target,
        pi = platform_instructions(platform),
        si = style_instructions(style),
    )
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if tag.len() > 1 && !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
        tags.push(tag);
    }
}

fn as_hashtag(text: &str) -> String {
    format!("#{}", text.split_whitespace().collect::<String>())
}

pub fn hashtags(cfg: &Config, content: &ContentInfo, platform: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for base in &cfg.content.hashtags_base {
        push_unique(&mut tags, base.clone());
    }

    push_unique(&mut tags, as_hashtag(&content.title));
    push_unique(&mut tags, as_hashtag(&content.platform));
    push_unique(&mut tags, format!("#{}", content.content_type.as_str().to_uppercase()));

    for genre in content.genres.iter().take(MAX_GENRE_TAGS) {
        push_unique(&mut tags, as_hashtag(genre));
    }

    let platform_tags: &[&str] = match platform {
        "youtube" => &["#YouTube", "#CineNorte", "#AnálisisCinematográfico"],
        "tiktok" => &["#TikTok", "#FYP", "#CineTok"],
        p if p.starts_with("instagram") => &["#Instagram", "#Reels", "#CineNorte"],
        _ => &[],
    };
    for tag in platform_tags {
        push_unique(&mut tags, tag.to_string());
    }

    tags.truncate(MAX_HASHTAGS);
    tags
}

pub fn title_suggestions(content: &ContentInfo, platform: &str) -> Vec<String> {
    let t = &content.title;
    if platform == "tiktok" {
        return vec![
            format!("{} en 60 segundos", t),
            format!("Mi veredicto: {}", t),
            format!("{} - ¿Sí o no?", t),
            format!("Todo sobre {}", t),
            format!("{} - Sin spoilers", t),
        ];
    }
    vec![
        format!("¿Vale la pena ver {}? | Análisis Cine Norte", t),
        format!("{}: Todo lo que necesitas saber", t),
        format!("Mi opinión sobre {} | Sin spoilers", t),
        format!("{} - Reseña completa en 3 minutos", t),
        format!("¿{} es tan buena como dicen? | Cine Norte", t),
    ]
}

pub fn visual_style(content: &ContentInfo) -> &'static str {
    let has = |g: &str| content.genres.iter().any(|x| x == g);
    if has("Acción") || has("Ciencia Ficción") {
        "high_energy"
    } else if has("Drama") || has("Romance") {
        "cinematic"
    } else if has("Terror") || has("Suspenso") {
        "dark_mysterious"
    } else if has("Comedia") {
        "bright_playful"
    } else {
        "professional"
    }
}

pub fn music_suggestion(content: &ContentInfo) -> &'static str {
    let has = |g: &str| content.genres.iter().any(|x| x == g);
    if has("Acción") {
        "epic_action"
    } else if has("Drama") {
        "emotional_drama"
    } else if has("Terror") {
        "tense_horror"
    } else if has("Comedia") {
        "light_comedy"
    } else {
        "cinematic_ambient"
    }
}

fn assemble(
    cfg: &Config,
    content: &ContentInfo,
    platform: &str,
    sections: Vec<ScriptSection>,
    raw_text: String,
) -> GeneratedScript {
    GeneratedScript {
        title: content.title.clone(),
        content: content.clone(),
        total_duration: sections.iter().map(|s| s.duration_seconds).sum(),
        word_count: raw_text.split_whitespace().count(),
        target_platform: platform.to_string(),
        hashtags: hashtags(cfg, content, platform),
        title_suggestions: title_suggestions(content, platform),
        visual_style: visual_style(content).to_string(),
        music_suggestion: music_suggestion(content).to_string(),
        sections,
        raw_text,
    }
}

pub fn fallback_script(cfg: &Config, content: &ContentInfo, platform: &str) -> GeneratedScript {
    let intro = format!(
        "¡Hola cinéfilos! Bienvenidos a {}. Hoy analizamos {}.",
        cfg.branding.name, content.title
    );
    let overview: String = content.overview.chars().take(FALLBACK_OVERVIEW_CHARS).collect();
    let plot = format!("{}...", overview.trim_end());
    let outro = format!(
        "¿Qué opinas de esta {}? Déjanos tu comentario y suscríbete para más análisis.",
        content.content_type.label_es().to_lowercase()
    );

    let section = |kind: SectionKind, text: &str, secs: u32, cue: &str, emotion: Emotion, emphasis: &[&str]| {
        ScriptSection {
            kind,
            content: text.to_string(),
            duration_seconds: secs,
            visual_cues: vec![cue.to_string()],
            emotion,
            emphasis_words: emphasis.iter().map(|s| s.to_string()).collect(),
        }
    };
    let sections = vec![
        section(SectionKind::Intro, &intro, 10, "Logo Cine Norte", Emotion::Excitement, &["cinéfilos"]),
        section(SectionKind::Plot, &plot, 60, "Montaje de escenas", Emotion::Drama, &[]),
        section(SectionKind::Outro, &outro, 15, "Call-to-action", Emotion::Excitement, &["comentario"]),
    ];
    let raw_text = format!("{}\n\n{}\n\n{}", intro, plot, outro);

    let mut script = assemble(cfg, content, platform, sections, raw_text);
    script.hashtags = cfg.content.hashtags_base.iter().take(10).cloned().collect();
    script.title_suggestions = vec![format!("Análisis de {}", content.title)];
    script.visual_style = "professional".to_string();
    script.music_suggestion = "cinematic_ambient".to_string();
    script
}

/// Builds the script from a model reply; `None` when nothing usable was parsed.
pub fn script_from_reply(
    cfg: &Config,
    content: &ContentInfo,
    platform: &str,
    reply: &str,
) -> Option<GeneratedScript> {
    let sections = parse_sections(reply);
    if sections.is_empty() {
        return None;
    }
    Some(assemble(cfg, content, platform, sections, reply.trim().to_string()))
}

pub async fn generate_script(
    client: &Client,
    cfg: &Config,
    content: &ContentInfo,
    platform: &str,
    duration_target: u32,
    style: &str,
) -> GeneratedScript {
    if !cfg.has_openai() {
        logw("OPENAI_API_KEY missing; using template script.");
        return fallback_script(cfg, content, platform);
    }

    logi(format!("Generating script for '{}' ({})", content.title, platform));
    let system = system_prompt(cfg);
    let user = build_prompt(content, platform, duration_target, style);
    let request = CompletionRequest {
        system: &system,
        user: &user,
        json_mode: true,
        max_output_tokens: 2000,
        temperature: 0.7,
    };

    let reply = match openai_complete(client, cfg, &request).await {
        Ok(Some(text)) => text,
        Ok(None) => return fallback_script(cfg, content, platform),
        Err(err) => {
            logw(format!("Script generation failed: {:#}", err));
            return fallback_script(cfg, content, platform);
        }
    };

    match script_from_reply(cfg, content, platform, &reply) {
        Some(script) => {
            logok(format!(
                "Script ready: {} sections, {} s",
                script.sections.len(),
                script.total_duration
            ));
            script
        }
        None => {
            logw("Script reply had no sections; using template script.");
            fallback_script(cfg, content, platform)
        }
    }
}

pub fn render_txt(script: &GeneratedScript) -> String {
    let mut out = String::new();
    out.push_str("GUION CINE NORTE\n================\n");
    out.push_str(&format!("Título: {}\n", script.title));
    out.push_str(&format!("Plataforma: {}\n", script.target_platform));
    out.push_str(&format!("Duración: {} segundos\n", script.total_duration));
    out.push_str(&format!("Palabras: {}\n\n", script.word_count));
    out.push_str(&format!("HASHTAGS:\n{}\n\n", script.hashtags.join(", ")));
    out.push_str("TÍTULOS SUGERIDOS:\n");
    for t in &script.title_suggestions {
        out.push_str(&format!("- {}\n", t));
    }
    out.push_str(&format!("\nESTILO VISUAL: {}\n", script.visual_style));
    out.push_str(&format!("MÚSICA: {}\n\nGUION:\n======\n", script.music_suggestion));

    for (i, section) in script.sections.iter().enumerate() {
        out.push_str(&format!(
            "\nSECCIÓN {}: {}\nDuración: {}s\nEmoción: {}\nIndicaciones visuales: {}\n\n{}\n",
            i + 1,
            section.kind.as_str().to_uppercase(),
            section.duration_seconds,
            section.emotion.as_str(),
            section.visual_cues.join(", "),
            section.content
        ));
    }
    out
}

pub async fn export_txt(script: &GeneratedScript, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    fs::write(path, render_txt(script))
        .await
        .with_context(|| format!("Failed to write script {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ContentType;

    fn sample() -> ContentInfo {
        ContentInfo {
            title: "The Boys".to_string(),
            platform: "Amazon Prime".to_string(),
            content_type: ContentType::Tv,
            genres: vec![
                "Acción".to_string(),
                "Ciencia Ficción".to_string(),
                "Drama".to_string(),
                "Comedia".to_string(),
            ],
            overview: "x".repeat(300),
            rating: 8.5,
            ..Default::default()
        }
    }

    #[test]
    fn fallback_has_three_sections_of_85_seconds() {
        let cfg = Config::default();
        let s = fallback_script(&cfg, &sample(), "youtube");
        assert_eq!(s.sections.len(), 3);
        assert_eq!(s.total_duration, 85);
        assert!(s.sections[1].content.ends_with("..."));
        assert_eq!(s.sections[1].content.chars().count(), FALLBACK_OVERVIEW_CHARS + 3);
        assert_eq!(s.word_count, s.raw_text.split_whitespace().count());
        assert!(s.sections[2].content.contains("serie"));
    }

    #[test]
    fn hashtags_are_deduplicated_and_capped() {
        let cfg = Config::default();
        let tags = hashtags(&cfg, &sample(), "youtube");
        assert!(tags.len() <= MAX_HASHTAGS);
        assert_eq!(&tags[..5], &cfg.content.hashtags_base[..]);
        assert!(tags.contains(&"#TheBoys".to_string()));
        assert!(tags.contains(&"#AmazonPrime".to_string()));
        assert!(tags.contains(&"#TV".to_string()));
        assert!(tags.contains(&"#CienciaFicción".to_string()));
        assert!(!tags.contains(&"#Comedia".to_string()));
        assert_eq!(tags.iter().filter(|t| *t == "#CineNorte").count(), 1);
    }

    #[test]
    fn tiktok_titles_are_short_variants() {
        let titles = title_suggestions(&sample(), "tiktok");
        assert_eq!(titles.len(), 5);
        assert_eq!(titles[0], "The Boys en 60 segundos");
        assert_eq!(title_suggestions(&sample(), "youtube").len(), 5);
    }

    #[test]
    fn genre_lookups() {
        assert_eq!(visual_style(&sample()), "high_energy");
        assert_eq!(music_suggestion(&sample()), "epic_action");
        assert_eq!(visual_style(&ContentInfo::default()), "professional");
    }

    #[test]
    fn prompt_names_title_and_json_shape() {
        let p = build_prompt(&sample(), "tiktok", 60, "dramatic");
        assert!(p.contains("TÍTULO: The Boys"));
        assert!(p.contains("TIPO: TV"));
        assert!(p.contains("hooks inmediatos"));
        assert!(p.contains("pausas estratégicas"));
        assert!(p.contains("\"sections\""));
    }

    #[test]
    fn reply_becomes_script_totals() {
        let cfg = Config::default();
        let reply = r#"{"sections":[{"type":"intro","content":"Hola","duration_seconds":10},
                        {"type":"plot","content":"Trama","duration_seconds":50}]}"#;
        let s = script_from_reply(&cfg, &sample(), "youtube", reply).unwrap();
        assert_eq!(s.total_duration, 60);
        assert!(s.section(SectionKind::Plot).is_some());
        assert!(script_from_reply(&cfg, &sample(), "youtube", "  ").is_none());
    }

    #[tokio::test]
    async fn no_key_uses_fallback_and_exports() {
        let cfg = Config::default();
        let s = generate_script(&Client::new(), &cfg, &sample(), "youtube", 120, "dynamic").await;
        assert_eq!(s.total_duration, 85);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/script.txt");
        export_txt(&s, &path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("SECCIÓN 1: INTRO"));
        assert!(text.contains("Título: The Boys"));
    }
}
