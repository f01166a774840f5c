//! Heuristic scores for a finished title: content, engagement, virality,
//! SEO, visuals and audio, each 0..=100.

use crate::catalog::ContentInfo;
use crate::script::GeneratedScript;
use crate::voice::VoiceTrack;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const EMOTIONAL_WORDS: [&str; 13] = [
    "increíble",
    "espectacular",
    "impresionante",
    "sorprendente",
    "emocionante",
    "intenso",
    "dramático",
    "épico",
    "genial",
    "fantástico",
    "excelente",
    "maravilloso",
    "asombroso",
];
const CTA_WORDS: [&str; 4] = ["suscríbete", "comenta", "like", "comparte"];
const TRENDING_WORDS: [&str; 10] = [
    "netflix", "disney", "marvel", "dc", "streaming", "película", "serie", "tráiler", "estreno",
    "nuevo",
];
const CONTROVERSY_WORDS: [&str; 8] = [
    "polémico",
    "debate",
    "discutido",
    "controversial",
    "divisivo",
    "opinión",
    "crítico",
    "revisión",
];
const SHARE_WORDS: [&str; 8] = [
    "comparte",
    "compartir",
    "viral",
    "tendencia",
    "recomienda",
    "recomendación",
    "debe ver",
    "no te pierdas",
];
const TITLE_EMOTIONAL: [&str; 5] = ["increíble", "sorprendente", "épico", "mejor", "peor"];
const TITLE_ACTION: [&str; 5] = ["descubre", "mira", "conoce", "aprende", "revela"];
const TRENDING_HASHTAGS: [&str; 5] = ["#viral", "#tendencia", "#nuevo", "#estreno", "#netflix"];
const DESCRIPTION_CTA: [&str; 5] = ["suscríbete", "comenta", "comparte", "like", "síguenos"];

const HIGH_IMPACT_WORDS: [&str; 14] = [
    "increíble",
    "espectacular",
    "sorprendente",
    "impactante",
    "brillante",
    "genial",
    "perfecto",
    "excelente",
    "magnífico",
    "terrible",
    "decepcionante",
    "aburrido",
    "confuso",
    "revelador",
];
const TRENDING_KEYWORDS: [&str; 20] = [
    "netflix", "disney", "hbo", "prime video", "streaming", "película", "serie", "análisis",
    "reseña", "spoiler", "acción", "drama", "comedia", "terror", "ciencia ficción", "marvel", "dc",
    "anime", "documental", "thriller",
];
const MAX_SUGGESTIONS: usize = 10;

const STOPWORDS: [&str; 60] = [
    "que", "los", "las", "del", "por", "con", "una", "uno", "para", "como", "más", "pero", "sus",
    "este", "esta", "esto", "ese", "esa", "son", "fue", "han", "hay", "muy", "sin", "sobre", "entre",
    "cuando", "donde", "también", "todo", "todos", "nos", "les", "ella", "ellos", "desde", "hasta",
    "porque", "qué", "cómo", "tiene", "tienen", "ser", "está", "están", "era", "puede", "cada",
    "otro", "otra", "solo", "sólo", "así", "aquí", "nuestro", "nuestra", "vez", "hace", "the",
    "and",
];

pub const VOLUME_CONSISTENCY: f64 = 75.0;
pub const SPEECH_CLARITY: f64 = 80.0;
pub const MUSIC_BALANCE: f64 = 70.0;
const LONG_SILENCE_SECONDS: f64 = 1.0;
const RECOMMEND_BELOW: f64 = 70.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationAnalysis {
    pub content_score: f64,
    pub engagement_potential: f64,
    pub viral_probability: f64,
    pub seo_score: f64,
    pub visual_impact: f64,
    pub audio_quality: f64,
    pub overall_score: f64,
    pub recommendations: Vec<String>,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeoBreakdown {
    pub overall_score: f64,
    pub keywords: Vec<String>,
    pub keyword_density: BTreeMap<String, f64>,
    pub title_score: f64,
    pub hashtag_score: f64,
    pub description_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub volume_consistency: f64,
    pub speech_clarity: f64,
    pub music_balance: f64,
    pub silences: Vec<(f64, f64)>,
    pub adjustments: Vec<String>,
}

impl AudioAnalysis {
    pub fn score(&self) -> f64 {
        (self.volume_consistency + self.speech_clarity) / 2.0
    }
}

fn clamp100(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

fn count_present(text_lower: &str, words: &[&str]) -> usize {
    words.iter().filter(|w| text_lower.contains(*w)).count()
}

fn tiered(value: f64, best: (f64, f64), ok: (f64, f64), scores: (f64, f64, f64)) -> f64 {
    if value >= best.0 && value <= best.1 {
        scores.0
    } else if value >= ok.0 && value <= ok.1 {
        scores.1
    } else {
        scores.2
    }
}

pub fn content_quality(script: &GeneratedScript) -> f64 {
    let content = &script.content;
    let words = tiered(script.word_count as f64, (100.0, 500.0), (50.0, 800.0), (20.0, 15.0, 10.0));
    let sections = tiered(script.sections.len() as f64, (3.0, 6.0), (2.0, 8.0), (20.0, 15.0, 10.0));
    let duration = tiered(
        script.total_duration as f64,
        (60.0, 180.0),
        (30.0, 240.0),
        (20.0, 15.0, 10.0),
    );
    let popularity = (content.popularity / 100.0).min(1.0) * 20.0;
    let rating = content.rating / 10.0 * 20.0;
    clamp100(words + sections + duration + popularity + rating)
}

fn hook_patterns() -> Result<&'static [Regex]> {
    static HOOKS: OnceCell<Vec<Regex>> = OnceCell::new();
    HOOKS
        .get_or_try_init(|| {
            [
                r"¿[^\n]*?\?",
                r"¡[^\n]*?!",
                r"(?i)\b(nunca|siempre|definitivamente|absolutamente)\b",
                r"(?i)\b(descubre|conoce|aprende|mira)\b",
                r"(?i)\b(spoiler|revelación|sorpresa)\b",
            ]
            .iter()
            .map(|p| Regex::new(p).context("failed to compile hook pattern"))
            .collect()
        })
        .map(Vec::as_slice)
}

pub fn count_hooks(text: &str) -> usize {
    match hook_patterns() {
        Ok(patterns) => patterns.iter().map(|re| re.find_iter(text).count()).sum(),
        Err(_) => 0,
    }
}

pub fn engagement_potential(script: &GeneratedScript) -> f64 {
    let text = &script.raw_text;
    let lower = text.to_lowercase();

    let emotional: usize = EMOTIONAL_WORDS.iter().map(|w| count_occurrences(&lower, w)).sum();
    let questions = text.matches('?').count();
    let ctas: usize = CTA_WORDS.iter().map(|w| count_occurrences(&lower, w)).sum();
    let hooks = count_hooks(text);
    let emotions: BTreeSet<&str> = script.sections.iter().map(|s| s.emotion.as_str()).collect();

    let score = (emotional as f64 / 10.0).min(1.0) * 25.0
        + ((questions + ctas) as f64 / 5.0).min(1.0) * 25.0
        + (hooks as f64 / 3.0).min(1.0) * 25.0
        + (emotions.len() as f64 / 4.0).min(1.0) * 25.0;
    clamp100(score)
}

/// 1.0 fresh, decaying with age; 0.5 when the date is unknown.
pub fn timing_relevance(content: &ContentInfo, today: NaiveDate) -> f64 {
    let Some(released) = content.release() else {
        return 0.5;
    };
    let days = (today - released).num_days();
    match days {
        d if d <= 30 => 1.0,
        d if d <= 90 => 0.8,
        d if d <= 365 => 0.6,
        _ => 0.4,
    }
}

pub fn viral_probability(script: &GeneratedScript, today: NaiveDate) -> f64 {
    let lower = script.raw_text.to_lowercase();
    let trending = count_present(&lower, &TRENDING_WORDS) as f64 / TRENDING_WORDS.len() as f64;
    let controversy = (count_present(&lower, &CONTROVERSY_WORDS) as f64 / 5.0).min(1.0);
    let share = (count_present(&lower, &SHARE_WORDS) as f64 / 3.0).min(1.0);
    let timing = timing_relevance(&script.content, today);
    clamp100(trending.min(1.0) * 30.0 + controversy * 20.0 + share * 25.0 + timing * 25.0)
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Most frequent non-stopword terms of three or more letters; ties sort
/// alphabetically.
pub fn extract_keywords(text: &str, n: usize) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for word in tokens(text) {
        if word.chars().count() < 3
            || word.chars().all(|c| c.is_ascii_digit())
            || STOPWORDS.contains(&word.as_str())
        {
            continue;
        }
        *freq.entry(word).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(w, _)| w).collect()
}

/// Occurrences per keyword as a percentage of all words.
pub fn keyword_density(text: &str, keywords: &[String]) -> BTreeMap<String, f64> {
    let words = tokens(text);
    let total = words.len();
    keywords
        .iter()
        .map(|kw| {
            let kw_lower = kw.to_lowercase();
            let count = words.iter().filter(|w| **w == kw_lower).count();
            let density = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            };
            (kw.clone(), density)
        })
        .collect()
}

pub fn title_score(titles: &[String]) -> f64 {
    if titles.is_empty() {
        return 0.0;
    }
    let total: f64 = titles
        .iter()
        .map(|title| {
            let lower = title.to_lowercase();
            let len = title.chars().count() as f64;
            let mut score = tiered(len, (50.0, 60.0), (40.0, 70.0), (30.0, 20.0, 10.0));
            score += (count_present(&lower, &TITLE_EMOTIONAL) as f64 * 10.0).min(30.0);
            if title.chars().any(|c| c.is_ascii_digit()) {
                score += 10.0;
            }
            if title.contains(['!', '?']) {
                score += 10.0;
            }
            score += (count_present(&lower, &TITLE_ACTION) as f64 * 10.0).min(20.0);
            score.min(100.0)
        })
        .sum();
    total / titles.len() as f64
}

pub fn hashtag_score(hashtags: &[String]) -> f64 {
    if hashtags.is_empty() {
        return 0.0;
    }
    let n = hashtags.len() as f64;
    let mut score = tiered(n, (5.0, 15.0), (3.0, 20.0), (30.0, 20.0, 10.0));

    let unique: BTreeSet<&str> = hashtags.iter().map(String::as_str).collect();
    score += (unique.len() as f64 / n).min(1.0) * 20.0;

    let trending = hashtags
        .iter()
        .filter(|t| TRENDING_HASHTAGS.contains(&t.to_lowercase().as_str()))
        .count();
    score += (trending as f64 * 10.0).min(30.0);

    let avg_len = hashtags.iter().map(|t| t.chars().count()).sum::<usize>() as f64 / n;
    score += if (5.0..=15.0).contains(&avg_len) { 20.0 } else { 10.0 };
    score.min(100.0)
}

pub fn description_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let len = text.chars().count() as f64;
    let mut score = tiered(len, (150.0, 300.0), (100.0, 400.0), (30.0, 20.0, 10.0));
    score += (count_present(&lower, &DESCRIPTION_CTA) as f64 * 15.0).min(30.0);

    let whitespace_words = text.split_whitespace().count();
    let ratio = if whitespace_words == 0 {
        0.0
    } else {
        tokens(text).len() as f64 / whitespace_words as f64
    };
    score += if (0.1..=0.3).contains(&ratio) { 20.0 } else { 10.0 };

    let symbols = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && *c != '_')
        .count();
    score += if (1..=5).contains(&symbols) { 20.0 } else { 10.0 };
    score.min(100.0)
}

pub fn seo_breakdown(script: &GeneratedScript) -> SeoBreakdown {
    let keywords = extract_keywords(&script.raw_text, 10);
    let keyword_density = keyword_density(&script.raw_text, &keywords);
    let title = title_score(&script.title_suggestions);
    let hashtags = hashtag_score(&script.hashtags);
    let description = description_score(&script.raw_text);
    SeoBreakdown {
        overall_score: clamp100((title + hashtags + description) / 3.0),
        keywords,
        keyword_density,
        title_score: title,
        hashtag_score: hashtags,
        description_score: description,
    }
}

/// Spans with no narration longer than a second.
pub fn find_silences(track: &VoiceTrack) -> Vec<(f64, f64)> {
    if track.silent || track.segments.is_empty() {
        return if track.duration > 0.0 {
            vec![(0.0, track.duration)]
        } else {
            Vec::new()
        };
    }
    let mut out = Vec::new();
    let mut cursor = 0.0;
    for seg in &track.segments {
        if seg.start - cursor > LONG_SILENCE_SECONDS {
            out.push((cursor, seg.start));
        }
        cursor = cursor.max(seg.end);
    }
    if track.duration - cursor > LONG_SILENCE_SECONDS {
        out.push((cursor, track.duration));
    }
    out
}

pub fn analyze_audio(track: &VoiceTrack) -> AudioAnalysis {
    let mut adjustments = Vec::new();
    if VOLUME_CONSISTENCY < RECOMMEND_BELOW {
        adjustments.push("Aumentar volumen general".to_string());
    }
    if SPEECH_CLARITY < RECOMMEND_BELOW {
        adjustments.push("Mejorar claridad del habla".to_string());
    }
    if MUSIC_BALANCE < RECOMMEND_BELOW {
        adjustments.push("Ajustar balance musical".to_string());
    }
    AudioAnalysis {
        volume_consistency: VOLUME_CONSISTENCY,
        speech_clarity: SPEECH_CLARITY,
        music_balance: MUSIC_BALANCE,
        silences: find_silences(track),
        adjustments,
    }
}

pub fn overall_score(
    content: f64,
    engagement: f64,
    viral: f64,
    seo: f64,
    visual: f64,
    audio: f64,
) -> f64 {
    clamp100(content * 0.25 + engagement * 0.25 + viral * 0.20 + seo * 0.15 + visual * 0.10 + audio * 0.05)
}

struct Scores {
    content: f64,
    engagement: f64,
    viral: f64,
    seo: f64,
    visual: Option<f64>,
    volume: f64,
}

fn recommendations(s: &Scores) -> Vec<String> {
    let mut out = Vec::new();
    let mut add = |cond: bool, a: &str, b: &str| {
        if cond {
            out.push(a.to_string());
            out.push(b.to_string());
        }
    };
    add(
        s.content < RECOMMEND_BELOW,
        "Mejora la estructura del guion con más secciones definidas",
        "Ajusta la duración para estar entre 60-180 segundos",
    );
    add(
        s.engagement < RECOMMEND_BELOW,
        "Agrega más preguntas y call-to-actions",
        "Incluye más palabras emocionales y hooks",
    );
    add(
        s.viral < RECOMMEND_BELOW,
        "Incorpora más keywords trending",
        "Aumenta el potencial de controversia sin spoilers",
    );
    add(
        s.seo < RECOMMEND_BELOW,
        "Optimiza títulos con más palabras clave emocionales",
        "Mejora la diversidad y relevancia de hashtags",
    );
    add(
        s.visual.is_some_and(|v| v < RECOMMEND_BELOW),
        "Mejora la composición visual del video",
        "Agrega más elementos visuales llamativos",
    );
    add(
        s.volume < RECOMMEND_BELOW,
        "Normaliza el volumen del audio",
        "Mejora la claridad del habla",
    );
    out
}

fn improvements(script: &GeneratedScript, audio: &AudioAnalysis) -> Vec<String> {
    let mut out = Vec::new();
    if script.word_count < 100 {
        out.push("Expandir el guion con más detalles y análisis".to_string());
    } else if script.word_count > 500 {
        out.push("Condensar el guion para mayor impacto".to_string());
    }
    if script.sections.len() < 3 {
        out.push("Agregar más secciones para mejor estructura".to_string());
    }
    if script.total_duration < 60 {
        out.push("Extender la duración para mayor engagement".to_string());
    } else if script.total_duration > 180 {
        out.push("Reducir la duración para mantener atención".to_string());
    }
    if !audio.silences.is_empty() {
        out.push("Reducir silencios largos en el audio".to_string());
    }
    out
}

/// Scores one title. `thumbnail_scores` feed the visual term, which is 0
/// when no thumbnail was produced.
pub fn analyze(
    script: &GeneratedScript,
    track: &VoiceTrack,
    thumbnail_scores: &[f64],
    today: NaiveDate,
) -> OptimizationAnalysis {
    let content = content_quality(script);
    let engagement = engagement_potential(script);
    let viral = viral_probability(script, today);
    let seo = seo_breakdown(script).overall_score;
    let visual = if thumbnail_scores.is_empty() {
        None
    } else {
        Some(clamp100(
            thumbnail_scores.iter().sum::<f64>() / thumbnail_scores.len() as f64,
        ))
    };
    let audio = analyze_audio(track);

    let scores = Scores {
        content,
        engagement,
        viral,
        seo,
        visual,
        volume: audio.volume_consistency,
    };

    OptimizationAnalysis {
        content_score: content,
        engagement_potential: engagement,
        viral_probability: viral,
        seo_score: seo,
        visual_impact: visual.unwrap_or(0.0),
        audio_quality: audio.volume_consistency,
        overall_score: overall_score(
            content,
            engagement,
            viral,
            seo,
            visual.unwrap_or(0.0),
            audio.score(),
        ),
        recommendations: recommendations(&scores),
        improvements: improvements(script, &audio),
    }
}

pub fn fallback_analysis() -> OptimizationAnalysis {
    OptimizationAnalysis {
        content_score: 50.0,
        engagement_potential: 50.0,
        viral_probability: 50.0,
        seo_score: 50.0,
        visual_impact: 50.0,
        audio_quality: 50.0,
        overall_score: 50.0,
        recommendations: vec![
            "Revisar configuración de IA".to_string(),
            "Verificar calidad del contenido".to_string(),
        ],
        improvements: vec![
            "Optimizar configuración".to_string(),
            "Mejorar calidad general".to_string(),
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    /// `title`, `script`, `timing` or `visual`.
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: Priority,
    pub description: String,
    /// 0..=1
    pub impact: f64,
    pub implementation: String,
}

/// One layer of the composed video, e.g. `("text", "logo CINE NORTE")`.
#[derive(Debug, Clone, Copy)]
pub struct VisualElement<'a> {
    pub kind: &'a str,
    pub content: &'a str,
}

pub struct SuggestionInput<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub sections: usize,
    pub duration: f64,
    pub elements: &'a [VisualElement<'a>],
}

fn suggestion(
    kind: &str,
    priority: Priority,
    description: &str,
    impact: f64,
    implementation: &str,
) -> OptimizationSuggestion {
    OptimizationSuggestion {
        kind: kind.to_string(),
        priority,
        description: description.to_string(),
        impact,
        implementation: implementation.to_string(),
    }
}

fn title_suggestions(title: &str) -> Vec<OptimizationSuggestion> {
    let lower = title.to_lowercase();
    let mut out = Vec::new();
    if !HIGH_IMPACT_WORDS.iter().any(|w| lower.contains(w)) {
        out.push(suggestion(
            "title",
            Priority::High,
            "Añade palabras de alto impacto al título",
            0.8,
            "Incluye palabras como 'increíble', 'espectacular', 'sorprendente'",
        ));
    }
    let len = title.chars().count();
    if len < 50 {
        out.push(suggestion(
            "title",
            Priority::Medium,
            "El título es muy corto para SEO",
            0.6,
            "Extiende el título a 50-60 caracteres",
        ));
    } else if len > 70 {
        out.push(suggestion(
            "title",
            Priority::Medium,
            "El título es muy largo",
            0.5,
            "Acorta el título a 50-60 caracteres",
        ));
    }
    if !TRENDING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        out.push(suggestion(
            "title",
            Priority::High,
            "Incluye palabras clave trending",
            0.7,
            "Añade keywords como 'streaming', 'análisis', 'reseña'",
        ));
    }
    out
}

fn script_suggestions(text: &str) -> Vec<OptimizationSuggestion> {
    let mut out = Vec::new();
    let words = text.split_whitespace().count();
    if words < 200 {
        out.push(suggestion(
            "script",
            Priority::High,
            "El guion es muy corto",
            0.7,
            "Extiende el contenido a 200-500 palabras",
        ));
    } else if words > 600 {
        out.push(suggestion(
            "script",
            Priority::Medium,
            "El guion es muy largo",
            0.5,
            "Condensa el contenido a 200-500 palabras",
        ));
    }
    if text.matches('?').count() < 2 {
        out.push(suggestion(
            "script",
            Priority::Medium,
            "Añade más preguntas retóricas",
            0.6,
            "Incluye 2-3 preguntas para aumentar engagement",
        ));
    }
    let lower = text.to_lowercase();
    if HIGH_IMPACT_WORDS.iter().filter(|w| lower.contains(*w)).count() < 3 {
        out.push(suggestion(
            "script",
            Priority::Medium,
            "Incluye más palabras de impacto",
            0.5,
            "Añade palabras como 'increíble', 'espectacular', 'sorprendente'",
        ));
    }
    out
}

fn timing_suggestions(duration: f64, sections: usize) -> Vec<OptimizationSuggestion> {
    let mut out = Vec::new();
    if duration < 120.0 {
        out.push(suggestion(
            "timing",
            Priority::High,
            "El video es muy corto",
            0.8,
            "Extiende a 2-3 minutos para mejor engagement",
        ));
    } else if duration > 240.0 {
        out.push(suggestion(
            "timing",
            Priority::Medium,
            "El video es muy largo",
            0.6,
            "Acorta a 2-3 minutos para mantener atención",
        ));
    }
    if sections < 3 {
        out.push(suggestion(
            "timing",
            Priority::Medium,
            "Muy pocos segmentos",
            0.5,
            "Divide el contenido en 3-6 segmentos",
        ));
    } else if sections > 8 {
        out.push(suggestion(
            "timing",
            Priority::Low,
            "Demasiados segmentos",
            0.3,
            "Consolida en 3-6 segmentos principales",
        ));
    }
    out
}

fn visual_suggestions(elements: &[VisualElement<'_>]) -> Vec<OptimizationSuggestion> {
    let mut out = Vec::new();
    if elements.len() < 5 {
        out.push(suggestion(
            "visual",
            Priority::High,
            "Faltan elementos visuales",
            0.7,
            "Añade más elementos visuales variados",
        ));
    }
    let kinds: BTreeSet<&str> = elements.iter().map(|e| e.kind).collect();
    if kinds.len() < 2 {
        out.push(suggestion(
            "visual",
            Priority::Medium,
            "Poca variedad en elementos visuales",
            0.5,
            "Incluye texto, imágenes y overlays",
        ));
    }
    if !elements.iter().any(|e| e.content.to_lowercase().contains("logo")) {
        out.push(suggestion(
            "visual",
            Priority::High,
            "Falta logo de Cine Norte",
            0.8,
            "Incluye el logo de Cine Norte en el video",
        ));
    }
    out
}

/// Concrete fixes, high priority first then by impact, ten at most.
pub fn suggestions(input: &SuggestionInput<'_>) -> Vec<OptimizationSuggestion> {
    let mut out = title_suggestions(input.title);
    out.extend(script_suggestions(input.text));
    out.extend(timing_suggestions(input.duration, input.sections));
    out.extend(visual_suggestions(input.elements));

    out.sort_by(|a, b| {
        let high = |s: &OptimizationSuggestion| s.priority == Priority::High;
        high(b)
            .cmp(&high(a))
            .then(b.impact.partial_cmp(&a.impact).unwrap_or(std::cmp::Ordering::Equal))
    });
    out.truncate(MAX_SUGGESTIONS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SampleCatalog;
    use crate::config::Config;
    use crate::script::fallback_script;
    use crate::sections::{Emotion, SectionKind};
    use crate::voice::VoiceSegment;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_script() -> GeneratedScript {
        let content = SampleCatalog::entries().into_iter().next().unwrap();
        fallback_script(&Config::default(), &content, "youtube")
    }

    fn segment(start: f64, end: f64) -> VoiceSegment {
        VoiceSegment {
            index: 0,
            kind: SectionKind::Plot,
            text: "x".to_string(),
            start,
            end,
            duration: end - start,
            emotion: Emotion::Drama,
        }
    }

    #[test]
    fn content_quality_tiers() {
        let mut script = sample_script();
        script.word_count = 300;
        script.total_duration = 120;
        script.content.popularity = 250.0;
        script.content.rating = 5.0;
        // 20 words + 20 sections (3) + 20 duration + 20 popularity + 10 rating
        assert!((content_quality(&script) - 90.0).abs() < 1e-9);

        script.word_count = 900;
        script.sections.truncate(1);
        script.total_duration = 20;
        script.content.popularity = 0.0;
        script.content.rating = 0.0;
        assert!((content_quality(&script) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn engagement_counts_signals() {
        let mut script = sample_script();
        script.raw_text = "¿Increíble? ¡Épico! Nunca viste algo así. Comenta y comparte. \
                           ¿Listo? Descubre más."
            .to_string();
        let score = engagement_potential(&script);
        assert!(score > 40.0 && score <= 100.0);

        script.raw_text.clear();
        script.sections.clear();
        assert_eq!(engagement_potential(&script), 0.0);
    }

    #[test]
    fn timing_decays_with_age() {
        let mut content = ContentInfo::default();
        assert_eq!(timing_relevance(&content, day("2024-01-01")), 0.5);
        content.release_date = "2024-01-01".to_string();
        assert_eq!(timing_relevance(&content, day("2024-01-20")), 1.0);
        assert_eq!(timing_relevance(&content, day("2024-03-01")), 0.8);
        assert_eq!(timing_relevance(&content, day("2024-10-01")), 0.6);
        assert_eq!(timing_relevance(&content, day("2026-01-01")), 0.4);
    }

    #[test]
    fn keywords_rank_by_frequency_then_alphabet() {
        let text = "Dune dune arena. Arena especia, especia gusano y los que para.";
        let kws = extract_keywords(text, 3);
        assert_eq!(kws, vec!["arena", "dune", "especia"]);
        let density = keyword_density(text, &kws);
        assert!((density["arena"] - 2.0 / 11.0 * 100.0).abs() < 1e-9);
        assert!(keyword_density("", &kws).values().all(|d| *d == 0.0));
    }

    #[test]
    fn title_and_hashtag_scores() {
        assert_eq!(title_score(&[]), 0.0);
        let titles = vec!["¡Descubre el mejor final de 2024!".to_string()];
        // 33 chars -> 10, emotional 10, digit 10, punct 10, action 10
        assert!((title_score(&titles) - 50.0).abs() < 1e-9);

        let tags: Vec<String> = ["#Netflix", "#Estreno", "#Cine", "#Drama", "#CineNorte"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // 30 count + 20 diversity + 20 trending + 20 length
        assert!((hashtag_score(&tags) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn silences_from_track() {
        let track = VoiceTrack {
            audio_path: None,
            segments: vec![segment(0.5, 10.0), segment(12.5, 20.0)],
            duration: 21.0,
            silent: false,
        };
        assert_eq!(find_silences(&track), vec![(10.0, 12.5)]);

        let silent = VoiceTrack {
            duration: 30.0,
            silent: true,
            ..Default::default()
        };
        assert_eq!(find_silences(&silent), vec![(0.0, 30.0)]);
    }

    #[test]
    fn analysis_scores_are_bounded() {
        let script = sample_script();
        let track = VoiceTrack {
            duration: 85.0,
            silent: true,
            ..Default::default()
        };
        let a = analyze(&script, &track, &[], day("2026-10-19"));
        for v in [
            a.content_score,
            a.engagement_potential,
            a.viral_probability,
            a.seo_score,
            a.visual_impact,
            a.audio_quality,
            a.overall_score,
        ] {
            assert!((0.0..=100.0).contains(&v));
        }
        assert_eq!(a.visual_impact, 0.0);
        assert_eq!(a.audio_quality, 75.0);
        assert!(a.improvements.iter().any(|i| i.contains("silencios")));
        assert_eq!(a.recommendations.len() % 2, 0);

        let with_thumbs = analyze(&script, &track, &[60.0, 80.0], day("2026-10-19"));
        assert_eq!(with_thumbs.visual_impact, 70.0);
        assert!(with_thumbs.overall_score > a.overall_score);
    }

    #[test]
    fn overall_weights() {
        assert!((overall_score(100.0, 100.0, 100.0, 100.0, 100.0, 100.0) - 100.0).abs() < 1e-9);
        assert!((overall_score(80.0, 0.0, 0.0, 0.0, 0.0, 77.5) - (20.0 + 3.875)).abs() < 1e-9);
        let fb = fallback_analysis();
        assert_eq!(fb.overall_score, 50.0);
        assert_eq!(fb.visual_impact, 50.0);
    }

    #[test]
    fn bare_script_gets_ranked_suggestions() {
        let input = SuggestionInput {
            title: "Barbie",
            text: "Una muñeca sale al mundo real.",
            sections: 1,
            duration: 30.0,
            elements: &[],
        };
        let out = suggestions(&input);
        assert_eq!(out.len(), MAX_SUGGESTIONS);
        assert_eq!(out[0].priority, Priority::High);
        assert_eq!(out[0].impact, 0.8);
        let first_other = out.iter().position(|s| s.priority != Priority::High).unwrap();
        assert!(out[first_other..].iter().all(|s| s.priority != Priority::High));
        for pair in out[..first_other].windows(2) {
            assert!(pair[0].impact >= pair[1].impact);
        }
        assert!(out.iter().any(|s| s.description == "Falta logo de Cine Norte"));
    }

    #[test]
    fn polished_script_gets_few_suggestions() {
        let title = "Análisis increíble de Barbie en streaming: la película que sorprende";
        let mut text = String::from("¿Qué pasa? ¿Por qué importa? increíble espectacular sorprendente ");
        text.push_str(&"palabra ".repeat(250));
        let elements = [
            VisualElement { kind: "video", content: "backdrop" },
            VisualElement { kind: "text", content: "logo CINE NORTE" },
            VisualElement { kind: "text", content: "title" },
            VisualElement { kind: "subtitle", content: "subtitles_es.srt" },
            VisualElement { kind: "audio", content: "narration" },
        ];
        let input = SuggestionInput {
            title,
            text: &text,
            sections: 5,
            duration: 180.0,
            elements: &elements,
        };
        assert!(suggestions(&input).is_empty());

        let long = SuggestionInput { duration: 300.0, sections: 9, ..input };
        let kinds: Vec<(Priority, f64)> =
            suggestions(&long).iter().map(|s| (s.priority, s.impact)).collect();
        assert_eq!(kinds, vec![(Priority::Medium, 0.6), (Priority::Low, 0.3)]);
    }

    #[test]
    fn suggestion_serializes_type_and_priority() {
        let s = suggestion("title", Priority::High, "d", 0.8, "i");
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["type"], "title");
        assert_eq!(v["priority"], "high");
    }
}
