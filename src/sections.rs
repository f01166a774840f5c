use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

const WORDS_PER_MINUTE: f64 = 150.0;
const MIN_SECTION_SECONDS: u32 = 10;
const JSON_DEFAULT_SECONDS: u32 = 30;
const MAX_EMPHASIS: usize = 5;
const MAX_HEADER_WORDS: usize = 6;

const EMPHASIS_WORDS: &[&str] = &[
    "increíble",
    "espectacular",
    "impresionante",
    "sorprendente",
    "nunca",
    "siempre",
    "definitivamente",
    "absolutamente",
    "más",
    "mejor",
    "peor",
    "único",
    "especial",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Intro,
    Hook,
    #[default]
    Plot,
    Analysis,
    Outro,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Intro => "intro",
            SectionKind::Hook => "hook",
            SectionKind::Plot => "plot",
            SectionKind::Analysis => "analysis",
            SectionKind::Outro => "outro",
        }
    }

    /// Lenient mapping for model output and header keywords.
    pub fn parse(label: &str) -> Self {
        let l = label.trim().to_lowercase();
        match l.as_str() {
            "intro" | "introducción" | "introduccion" => SectionKind::Intro,
            "hook" | "gancho" => SectionKind::Hook,
            "analysis" | "análisis" | "analisis" => SectionKind::Analysis,
            "outro" | "cierre" | "conclusión" | "conclusion" => SectionKind::Outro,
            _ => SectionKind::Plot,
        }
    }

    pub fn emotion(&self) -> Emotion {
        match self {
            SectionKind::Intro | SectionKind::Outro => Emotion::Excitement,
            SectionKind::Hook => Emotion::Suspense,
            SectionKind::Plot => Emotion::Drama,
            SectionKind::Analysis => Emotion::Neutral,
        }
    }

    pub fn visual_cues(&self) -> Vec<String> {
        let cues: &[&str] = match self {
            SectionKind::Intro => &[
                "Logo Cine Norte animado",
                "Efecto de luces de reflector",
                "Transición dinámica",
            ],
            SectionKind::Hook => &[
                "Clip más impactante del tráiler",
                "Texto en pantalla con título",
                "Efecto de zoom dramático",
            ],
            SectionKind::Plot => &[
                "Montaje de escenas clave",
                "Texto descriptivo superpuesto",
                "Transiciones suaves",
            ],
            SectionKind::Analysis => &[
                "Split screen con comparaciones",
                "Gráficos informativos",
                "Efectos de partículas",
            ],
            SectionKind::Outro => &[
                "Logo Cine Norte final",
                "Call-to-action visual",
                "Fade out elegante",
            ],
        };
        cues.iter().map(|s| s.to_string()).collect()
    }

    pub fn subtitle_style(&self) -> String {
        format!("{}_style", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Excitement,
    Suspense,
    Drama,
    #[default]
    Neutral,
    Comedy,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Excitement => "excitement",
            Emotion::Suspense => "suspense",
            Emotion::Drama => "drama",
            Emotion::Neutral => "neutral",
            Emotion::Comedy => "comedy",
        }
    }

    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "excitement" | "emoción" | "emocion" => Emotion::Excitement,
            "suspense" | "suspenso" => Emotion::Suspense,
            "drama" => Emotion::Drama,
            "comedy" | "comedia" => Emotion::Comedy,
            _ => Emotion::Neutral,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSection {
    pub kind: SectionKind,
    pub content: String,
    pub duration_seconds: u32,
    pub visual_cues: Vec<String>,
    pub emotion: Emotion,
    pub emphasis_words: Vec<String>,
}

impl ScriptSection {
    /// Builds a section from plain text, estimating timing at 150 wpm.
    pub fn from_text(kind: SectionKind, content: &str) -> Self {
        let content = content.trim().to_string();
        Self {
            kind,
            duration_seconds: estimate_duration(&content),
            visual_cues: kind.visual_cues(),
            emotion: kind.emotion(),
            emphasis_words: extract_emphasis_words(&content),
            content,
        }
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

pub fn estimate_duration(text: &str) -> u32 {
    let words = text.split_whitespace().count() as f64;
    let secs = (words / WORDS_PER_MINUTE * 60.0) as u32;
    secs.max(MIN_SECTION_SECONDS)
}

/// Fixed-vocabulary emphasis words, first occurrence order, at most five.
pub fn extract_emphasis_words(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for raw in text.split_whitespace() {
        let word = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if EMPHASIS_WORDS.contains(&word.as_str()) && !found.contains(&word) {
            found.push(word);
            if found.len() == MAX_EMPHASIS {
                break;
            }
        }
    }
    found
}

#[derive(Debug, Deserialize)]
struct SectionsRoot {
    #[serde(default)]
    sections: Vec<RawSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSection {
    #[serde(rename = "type", alias = "kind")]
    kind: Option<String>,
    #[serde(alias = "text")]
    content: Option<String>,
    #[serde(alias = "duration")]
    duration_seconds: Option<f64>,
    visual_cues: Vec<String>,
    emotion: Option<String>,
    emphasis_words: Vec<String>,
}

impl From<RawSection> for ScriptSection {
    fn from(raw: RawSection) -> Self {
        let duration = raw
            .duration_seconds
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u32)
            .unwrap_or(JSON_DEFAULT_SECONDS);
        ScriptSection {
            kind: raw.kind.as_deref().map(SectionKind::parse).unwrap_or_default(),
            content: raw.content.unwrap_or_default().trim().to_string(),
            duration_seconds: duration,
            visual_cues: raw.visual_cues,
            emotion: raw.emotion.as_deref().map(Emotion::parse).unwrap_or_default(),
            emphasis_words: raw.emphasis_words,
        }
    }
}

/// Reads `{"sections":[...]}` from the outermost braces found in `text`.
pub fn sections_from_json(text: &str) -> Result<Vec<ScriptSection>> {
    let start = text.find('{').context("no JSON object in reply")?;
    let end = text.rfind('}').context("no JSON object in reply")?;
    if end <= start {
        anyhow::bail!("no JSON object in reply");
    }
    let root: SectionsRoot = serde_json::from_str(&text[start..=end])
        .with_context(|| "Failed to parse sections JSON")?;
    Ok(root
        .sections
        .into_iter()
        .map(ScriptSection::from)
        .filter(|s| !s.content.is_empty())
        .collect())
}

fn header_regex() -> Result<&'static Regex> {
    static HEADER_RE: OnceCell<Regex> = OnceCell::new();
    HEADER_RE.get_or_try_init(|| {
        Regex::new(
            r"(?i)^[\s#*\-\d.)\[]*(introducci[óo]n|intro|hook|gancho|plot|trama|sinopsis|an[áa]lisis|outro|cierre|conclusi[óo]n)\b(.*)$",
        )
        .context("failed to compile section header regex")
    })
}

/// Returns the section kind and any inline text when `line` is a header.
fn match_header(re: &Regex, line: &str) -> Option<(SectionKind, String)> {
    let caps = re.captures(line)?;
    let keyword = caps.get(1)?.as_str();
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let (label, inline) = match rest.split_once(':') {
        Some((label, inline)) => (label, inline.trim()),
        None => (rest, ""),
    };
    let label_words = 1 + label.split_whitespace().count();
    if label_words > MAX_HEADER_WORDS {
        return None;
    }

    let inline = inline.trim_matches(|c: char| c == '*' || c.is_whitespace());
    Some((SectionKind::parse(keyword), inline.to_string()))
}

/// Splits free text on header lines; text before the first header is plot.
pub fn sections_from_text(text: &str) -> Vec<ScriptSection> {
    let re = match header_regex() {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    let mut sections = Vec::new();
    let mut current = SectionKind::Plot;
    let mut buffer: Vec<String> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match match_header(re, line) {
            Some((kind, inline)) => {
                if !buffer.is_empty() {
                    sections.push(ScriptSection::from_text(current, &buffer.join("\n")));
                    buffer.clear();
                }
                current = kind;
                if !inline.is_empty() {
                    buffer.push(inline);
                }
            }
            None => buffer.push(line.to_string()),
        }
    }

    if !buffer.is_empty() {
        sections.push(ScriptSection::from_text(current, &buffer.join("\n")));
    }
    sections
}

/// JSON first, then headers, then the whole reply as one plot section.
pub fn parse_sections(text: &str) -> Vec<ScriptSection> {
    if let Ok(sections) = sections_from_json(text) {
        if !sections.is_empty() {
            return sections;
        }
    }

    let sections = sections_from_text(text);
    if !sections.is_empty() {
        return sections;
    }

    if text.trim().is_empty() {
        return Vec::new();
    }
    vec![ScriptSection::from_text(SectionKind::Plot, text)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sections_with_defaults() {
        let reply = r#"Aquí está el guion:
        {"sections": [
            {"type": "intro", "content": "¡Hola cinéfilos!", "duration_seconds": 8, "emotion": "excitement"},
            {"content": "La trama sigue a un físico."},
            {"type": "outro", "content": "   "}
        ]}
        ¡Listo!"#;
        let sections = parse_sections(reply);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].kind, SectionKind::Intro);
        assert_eq!(sections[0].duration_seconds, 8);
        assert_eq!(sections[0].emotion, Emotion::Excitement);
        assert_eq!(sections[1].kind, SectionKind::Plot);
        assert_eq!(sections[1].duration_seconds, 30);
        assert_eq!(sections[1].emotion, Emotion::Neutral);
    }

    #[test]
    fn plain_text_splits_on_headers() {
        let reply = "Texto suelto antes.\n\
                     INTRO (5-10 seg): ¡Bienvenidos a Cine Norte!\n\
                     **GANCHO**\n\
                     Nunca viste algo tan increíble.\n\
                     ANÁLISIS:\n\
                     La dirección es espectacular y la fotografía es la mejor del año.\n\
                     CIERRE\n\
                     Suscríbete.";
        let sections = parse_sections(reply);
        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Plot,
                SectionKind::Intro,
                SectionKind::Hook,
                SectionKind::Analysis,
                SectionKind::Outro
            ]
        );
        assert_eq!(sections[1].content, "¡Bienvenidos a Cine Norte!");
        assert_eq!(sections[2].emotion, Emotion::Suspense);
        assert_eq!(sections[2].emphasis_words, vec!["nunca", "increíble"]);
        assert!(sections.iter().all(|s| s.duration_seconds >= MIN_SECTION_SECONDS));
        assert_eq!(sections[3].visual_cues.len(), 3);
    }

    #[test]
    fn long_lines_mentioning_keywords_are_not_headers() {
        let reply = "La trama de esta película gira alrededor de un robo perfecto en Madrid.";
        let sections = parse_sections(reply);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Plot);
        assert_eq!(sections[0].content, reply);
    }

    #[test]
    fn duration_follows_speaking_rate() {
        let text = vec!["palabra"; 300].join(" ");
        assert_eq!(estimate_duration(&text), 120);
        assert_eq!(estimate_duration("muy corto"), MIN_SECTION_SECONDS);
    }

    #[test]
    fn emphasis_is_capped_and_distinct() {
        let text = "Más, más! Increíble, espectacular, impresionante, sorprendente y único.";
        let words = extract_emphasis_words(text);
        assert_eq!(words.len(), MAX_EMPHASIS);
        assert_eq!(words[0], "más");
        assert_eq!(words[1], "increíble");
    }

    #[test]
    fn empty_reply_has_no_sections() {
        assert!(parse_sections("   \n ").is_empty());
    }
}
