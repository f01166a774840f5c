use crate::{logi, logw};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const DEFAULT_PLATFORM: &str = "Múltiples plataformas";
const HIGH_IMPACT_GENRES: &[&str] = &[
    "Acción",
    "Ciencia Ficción",
    "Terror",
    "Suspenso",
    "Aventura",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Movie,
    Tv,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Tv => "tv",
        }
    }

    /// Spanish noun used in prompts, cards and metadata.
    pub fn label_es(&self) -> &'static str {
        match self {
            ContentType::Movie => "Película",
            ContentType::Tv => "Serie",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogKind {
    #[default]
    All,
    Movie,
    Tv,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::All => "all",
            CatalogKind::Movie => "movie",
            CatalogKind::Tv => "tv",
        }
    }

    pub fn admits(&self, content_type: ContentType) -> bool {
        match self {
            CatalogKind::All => true,
            CatalogKind::Movie => content_type == ContentType::Movie,
            CatalogKind::Tv => content_type == ContentType::Tv,
        }
    }
}

impl FromStr for CatalogKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(CatalogKind::All),
            "movie" => Ok(CatalogKind::Movie),
            "tv" => Ok(CatalogKind::Tv),
            other => Err(anyhow::anyhow!(
                "content kind must be 'movie', 'tv' or 'all' (got '{}')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Day,
    Week,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentInfo {
    pub id: u64,
    pub title: String,
    pub original_title: String,
    pub overview: String,
    pub release_date: String,
    pub genres: Vec<String>,
    pub rating: f64,
    pub popularity: f64,
    pub poster_url: String,
    pub backdrop_url: String,
    pub trailer_url: Option<String>,
    pub platform: String,
    pub content_type: ContentType,
    pub runtime: Option<u32>,
    pub cast: Vec<String>,
    pub directors: Vec<String>,
    pub keywords: Vec<String>,
    pub language: String,
    pub country: String,
}

impl ContentInfo {
    pub fn release(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.release_date.trim(), "%Y-%m-%d").ok()
    }

    pub fn year(&self) -> Option<i32> {
        self.release_date
            .get(..4)
            .and_then(|y| y.parse::<i32>().ok())
    }

    pub fn primary_genre(&self) -> &str {
        self.genres.first().map(String::as_str).unwrap_or("Cine")
    }

    pub fn has_genre(&self, genre: &str) -> bool {
        let wanted = genre.to_lowercase();
        self.genres.iter().any(|g| g.to_lowercase() == wanted)
    }

    /// Title with spaces as underscores, safe as a file or directory name
    /// and inside quoted filtergraph values.
    pub fn file_slug(&self) -> String {
        let slug: String = self
            .title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .chars()
            .filter(|c| !matches!(*c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\''))
            .collect();
        if slug.is_empty() {
            "untitled".to_string()
        } else {
            slug
        }
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn trending(&self, kind: CatalogKind, window: TimeWindow) -> Result<Vec<ContentInfo>>;

    /// Titles of one content type matching `query`.
    async fn search_type(&self, query: &str, content_type: ContentType) -> Result<Vec<ContentInfo>>;

    /// Movie matches first, then tv matches.
    async fn search(&self, query: &str, kind: CatalogKind) -> Result<Vec<ContentInfo>> {
        let mut out = Vec::new();
        for content_type in [ContentType::Movie, ContentType::Tv] {
            if kind.admits(content_type) {
                out.extend(self.search_type(query, content_type).await?);
            }
        }
        Ok(out)
    }

    /// Fills cast, crew, keywords and trailer for a chosen title.
    async fn enrich(&self, content: ContentInfo) -> ContentInfo {
        content
    }
}

/// Built-in titles used when TMDB is not configured or unreachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleCatalog;

pub const SAMPLE_CATALOG_NAME: &str = "sample";

fn sample_entry(
    id: u64,
    title: &str,
    date: &str,
    content_type: ContentType,
    platform: &str,
    genres: &[&str],
    overview: &str,
    keywords: &[&str],
    rating: f64,
    popularity: f64,
) -> ContentInfo {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    ContentInfo {
        id,
        title: title.to_string(),
        original_title: title.to_string(),
        overview: overview.to_string(),
        release_date: date.to_string(),
        genres: strings(genres),
        rating,
        popularity,
        platform: platform.to_string(),
        content_type,
        keywords: strings(keywords),
        language: "es".to_string(),
        ..ContentInfo::default()
    }
}

impl SampleCatalog {
    pub fn entries() -> Vec<ContentInfo> {
        vec![
            ContentInfo {
                poster_url: "https://image.tmdb.org/t/p/w500/8Gxv8gSFCU0XGDykEGv7zR1n2ua.jpg"
                    .to_string(),
                runtime: Some(180),
                directors: vec!["Christopher Nolan".to_string()],
                cast: vec![
                    "Cillian Murphy".to_string(),
                    "Emily Blunt".to_string(),
                    "Robert Downey Jr.".to_string(),
                ],
                ..sample_entry(
                    1,
                    "Oppenheimer",
                    "2023-07-21",
                    ContentType::Movie,
                    "Netflix",
                    &["Drama", "Historia"],
                    "La historia de J. Robert Oppenheimer y el desarrollo de la bomba atómica durante la Segunda Guerra Mundial, y el peso moral que cargó después.",
                    &["historia", "ciencia", "guerra", "moral"],
                    8.1,
                    95.0,
                )
            },
            ContentInfo {
                poster_url: "https://image.tmdb.org/t/p/w500/iuFNMS8U5cb6xfzi51Dbkovj7vM.jpg"
                    .to_string(),
                runtime: Some(114),
                directors: vec!["Greta Gerwig".to_string()],
                cast: vec!["Margot Robbie".to_string(), "Ryan Gosling".to_string()],
                ..sample_entry(
                    2,
                    "Barbie",
                    "2023-07-21",
                    ContentType::Movie,
                    "HBO Max",
                    &["Comedia", "Aventura"],
                    "Barbie vive en Barbieland hasta que es expulsada al mundo real, donde descubre que la perfección no es lo que parecía.",
                    &["comedia", "aventura", "feminismo", "color"],
                    7.0,
                    88.0,
                )
            },
            sample_entry(
                3,
                "Stranger Things",
                "2016-07-15",
                ContentType::Tv,
                "Netflix",
                &["Ciencia Ficción", "Misterio", "Drama"],
                "Cuando un niño desaparece en un pequeño pueblo, sus amigos, su familia y la policía se enfrentan a fuerzas sobrenaturales para traerlo de vuelta.",
                &["sobrenatural", "amistad", "años 80"],
                8.6,
                110.0,
            ),
            sample_entry(
                4,
                "The Boys",
                "2019-07-25",
                ContentType::Tv,
                "Amazon Prime",
                &["Acción", "Ciencia Ficción"],
                "Un grupo de vigilantes se propone derribar a superhéroes corruptos que abusan de sus poderes.",
                &["superhéroes", "sátira", "corrupción"],
                8.5,
                76.0,
            ),
            sample_entry(
                5,
                "Dune: Parte Dos",
                "2024-02-28",
                ContentType::Movie,
                "HBO Max",
                &["Ciencia Ficción", "Aventura"],
                "Paul Atreides se une a Chani y a los Fremen en una guerra de venganza contra quienes destruyeron a su familia.",
                &["desierto", "profecía", "imperio"],
                8.2,
                90.0,
            ),
        ]
    }
}

#[async_trait]
impl CatalogSource for SampleCatalog {
    fn name(&self) -> &'static str {
        SAMPLE_CATALOG_NAME
    }

    async fn trending(&self, kind: CatalogKind, _window: TimeWindow) -> Result<Vec<ContentInfo>> {
        Ok(Self::entries()
            .into_iter()
            .filter(|c| kind.admits(c.content_type))
            .collect())
    }

    async fn search_type(&self, query: &str, content_type: ContentType) -> Result<Vec<ContentInfo>> {
        let needle = query.trim().to_lowercase();
        Ok(Self::entries()
            .into_iter()
            .filter(|c| c.content_type == content_type)
            .filter(|c| {
                c.title.to_lowercase().contains(&needle)
                    || c.original_title.to_lowercase().contains(&needle)
            })
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    pub query: Option<String>,
    pub platform: Option<String>,
    pub genre: Option<String>,
    pub kind: CatalogKind,
    pub limit: usize,
}

pub fn filter_content(items: Vec<ContentInfo>, criteria: &SelectionCriteria) -> Vec<ContentInfo> {
    items
        .into_iter()
        .filter(|c| match criteria.platform.as_deref() {
            Some(p) => c.platform == p,
            None => true,
        })
        .filter(|c| match criteria.genre.as_deref() {
            Some(g) => c.has_genre(g),
            None => true,
        })
        .collect()
}

fn sort_by_appeal(items: &mut [ContentInfo]) {
    items.sort_by(|a, b| {
        let sa = a.popularity * a.rating;
        let sb = b.popularity * b.rating;
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });
}

async fn recommended(
    source: &dyn CatalogSource,
    criteria: &SelectionCriteria,
) -> Result<Vec<ContentInfo>> {
    let half = (criteria.limit / 2).max(1);
    let mut all = Vec::new();

    if criteria.kind != CatalogKind::Tv {
        let movies = source.trending(CatalogKind::Movie, TimeWindow::Week).await?;
        all.extend(movies.into_iter().take(half));
    }
    if criteria.kind != CatalogKind::Movie {
        let shows = source.trending(CatalogKind::Tv, TimeWindow::Week).await?;
        all.extend(shows.into_iter().take(half));
    }

    sort_by_appeal(&mut all);
    Ok(all)
}

async fn candidates(
    source: &dyn CatalogSource,
    criteria: &SelectionCriteria,
) -> Result<Vec<ContentInfo>> {
    let found = match criteria.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => source.search(query, criteria.kind).await?,
        None => recommended(source, criteria).await?,
    };
    Ok(filter_content(found, criteria))
}

/// Picks up to `criteria.limit` titles. Falls back to [`SampleCatalog`]
/// when the source fails or yields nothing.
pub async fn select_content(
    source: &dyn CatalogSource,
    criteria: &SelectionCriteria,
) -> Vec<ContentInfo> {
    let limit = criteria.limit.max(1);

    let mut picked = match candidates(source, criteria).await {
        Ok(items) => items,
        Err(err) => {
            logw(format!("Catalog '{}' failed: {:#}", source.name(), err));
            Vec::new()
        }
    };

    let mut from_source = !picked.is_empty();
    if picked.is_empty() && source.name() != SAMPLE_CATALOG_NAME {
        logw("No catalog results; using the built-in sample catalog.");
        let sample = SampleCatalog;
        picked = candidates(&sample, criteria).await.unwrap_or_default();
    }
    if picked.is_empty() && criteria.query.is_some() {
        logw("Query matched nothing; using recommended sample titles.");
        let relaxed = SelectionCriteria {
            query: None,
            ..criteria.clone()
        };
        picked = candidates(&SampleCatalog, &relaxed).await.unwrap_or_default();
    }

    picked.truncate(limit);

    from_source &= source.name() != SAMPLE_CATALOG_NAME;
    if !from_source {
        logi(format!("Selected {} sample title(s)", picked.len()));
        return picked;
    }

    let mut enriched = Vec::with_capacity(picked.len());
    for item in picked {
        enriched.push(source.enrich(item).await);
    }
    logi(format!("Selected {} title(s)", enriched.len()));
    enriched
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viability {
    pub total_score: f64,
    pub viability: String,
    pub factors: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
}

pub fn viability_label(score: f64) -> &'static str {
    if score >= 80.0 {
        "Excelente"
    } else if score >= 60.0 {
        "Buena"
    } else if score >= 40.0 {
        "Regular"
    } else {
        "Baja"
    }
}

pub fn analyze_viability(content: &ContentInfo) -> Viability {
    let mut factors = BTreeMap::new();

    let popularity = (content.popularity / 100.0).min(1.0) * 30.0;
    let rating = (content.rating / 10.0) * 25.0;
    let trailer = if content.trailer_url.is_some() { 20.0 } else { 0.0 };
    let overview = (content.overview.chars().count() as f64 / 200.0).min(1.0) * 15.0;
    let genre = if content
        .genres
        .iter()
        .any(|g| HIGH_IMPACT_GENRES.contains(&g.as_str()))
    {
        10.0
    } else {
        5.0
    };

    factors.insert("popularity".to_string(), popularity);
    factors.insert("rating".to_string(), rating);
    factors.insert("trailer_available".to_string(), trailer);
    factors.insert("overview_quality".to_string(), overview);
    factors.insert("genre_impact".to_string(), genre);

    let score = popularity + rating + trailer + overview + genre;

    let mut recommendations = Vec::new();
    if score < 40.0 {
        recommendations.push("Considera buscar contenido más popular o reciente".to_string());
    }
    if content.trailer_url.is_none() {
        recommendations.push("Busca tráileres alternativos o clips oficiales".to_string());
    }
    if content.overview.chars().count() < 100 {
        recommendations.push("Investiga más detalles de la trama".to_string());
    }
    if !content
        .genres
        .iter()
        .any(|g| HIGH_IMPACT_GENRES[..4].contains(&g.as_str()))
    {
        recommendations.push("Enfócate en aspectos emocionales o dramáticos".to_string());
    }

    Viability {
        total_score: (score * 100.0).round() / 100.0,
        viability: viability_label(score).to_string(),
        factors,
        recommendations,
    }
}
