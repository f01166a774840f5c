use crate::catalog::{
    CatalogKind, CatalogSource, ContentInfo, ContentType, DEFAULT_PLATFORM, TimeWindow,
};
use crate::config::Config;
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/w1280";
const MAX_CAST: usize = 5;
const MAX_KEYWORDS: usize = 10;

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<ListItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListItem {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    original_title: Option<String>,
    original_name: Option<String>,
    overview: String,
    release_date: Option<String>,
    first_air_date: Option<String>,
    genre_ids: Vec<u32>,
    vote_average: f64,
    popularity: f64,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    original_language: Option<String>,
    media_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Detail {
    runtime: Option<u32>,
    episode_run_time: Vec<u32>,
    production_countries: Vec<Named>,
    credits: Option<Credits>,
    keywords: Option<Keywords>,
    videos: Option<Videos>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Credits {
    cast: Vec<Named>,
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    job: Option<String>,
    name: String,
}

/// Movies list keywords under `keywords`, shows under `results`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Keywords {
    keywords: Vec<Named>,
    results: Vec<Named>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Videos {
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    site: String,
    #[serde(rename = "type")]
    video_type: String,
    key: String,
}

pub fn genre_name(id: u32) -> &'static str {
    match id {
        28 => "Acción",
        12 => "Aventura",
        16 => "Animación",
        35 => "Comedia",
        80 => "Crimen",
        99 => "Documental",
        18 => "Drama",
        10751 => "Familia",
        14 => "Fantasía",
        36 => "Historia",
        27 => "Terror",
        10402 => "Música",
        9648 => "Misterio",
        10749 => "Romance",
        878 => "Ciencia Ficción",
        10770 => "Película de TV",
        53 => "Suspenso",
        10752 => "Guerra",
        37 => "Western",
        10759 => "Acción y Aventura",
        10765 => "Ciencia Ficción y Fantasía",
        _ => "Desconocido",
    }
}

/// Keyword guess; TMDB list endpoints carry no provider data.
pub fn detect_platform(title: &str) -> &'static str {
    let t = title.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| t.contains(w));
    if has(&["netflix", "stranger things", "the crown"]) {
        "Netflix"
    } else if has(&["amazon", "prime", "the boys"]) {
        "Amazon Prime"
    } else if has(&["disney", "marvel", "star wars"]) {
        "Disney+"
    } else if has(&["hbo", "max", "game of thrones"]) {
        "HBO Max"
    } else {
        DEFAULT_PLATFORM
    }
}

fn image_url(base: &str, path: &Option<String>) -> String {
    match path.as_deref().filter(|p| !p.is_empty()) {
        Some(p) => format!("{}{}", base, p),
        None => String::new(),
    }
}

fn content_from_item(item: ListItem, fallback: ContentType) -> ContentInfo {
    let content_type = match item.media_type.as_deref() {
        Some("tv") => ContentType::Tv,
        Some("movie") => ContentType::Movie,
        _ => fallback,
    };
    let title = item.title.or(item.name).unwrap_or_default();
    let original_title = item
        .original_title
        .or(item.original_name)
        .unwrap_or_else(|| title.clone());

    ContentInfo {
        id: item.id,
        platform: detect_platform(&title).to_string(),
        overview: item.overview,
        release_date: item.release_date.or(item.first_air_date).unwrap_or_default(),
        genres: item
            .genre_ids
            .iter()
            .map(|id| genre_name(*id).to_string())
            .collect(),
        rating: item.vote_average,
        popularity: item.popularity,
        poster_url: image_url(POSTER_BASE, &item.poster_path),
        backdrop_url: image_url(BACKDROP_BASE, &item.backdrop_path),
        content_type,
        language: item.original_language.unwrap_or_else(|| "es".to_string()),
        title,
        original_title,
        ..ContentInfo::default()
    }
}

fn apply_detail(mut content: ContentInfo, detail: Detail) -> ContentInfo {
    content.runtime = detail
        .runtime
        .or_else(|| detail.episode_run_time.first().copied());
    if let Some(country) = detail.production_countries.into_iter().next() {
        content.country = country.name;
    }
    if let Some(credits) = detail.credits {
        content.cast = credits
            .cast
            .into_iter()
            .take(MAX_CAST)
            .map(|c| c.name)
            .collect();
        content.directors = credits
            .crew
            .into_iter()
            .filter(|c| c.job.as_deref() == Some("Director"))
            .map(|c| c.name)
            .collect();
    }
    if let Some(kw) = detail.keywords {
        let list = if kw.keywords.is_empty() { kw.results } else { kw.keywords };
        content.keywords = list.into_iter().take(MAX_KEYWORDS).map(|k| k.name).collect();
    }
    if let Some(videos) = detail.videos {
        content.trailer_url = videos
            .results
            .into_iter()
            .find(|v| v.site == "YouTube" && v.video_type == "Trailer")
            .map(|v| format!("https://www.youtube.com/watch?v={}", v.key));
    }
    content
}

pub struct TmdbCatalog {
    client: Client,
    api_key: String,
    language: String,
    region: String,
}

impl TmdbCatalog {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.api.tmdb_api_key.clone(),
            language: cfg.project.language.clone(),
            region: cfg.project.region.clone(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, extra: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", TMDB_BASE, path);
        let mut query: Vec<(&str, &str)> = vec![
            ("api_key", self.api_key.as_str()),
            ("language", self.language.as_str()),
        ];
        query.extend_from_slice(extra);

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .with_context(|| format!("TMDB request failed: {}", path))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("TMDB HTTP {} for {}", status.as_u16(), path);
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("TMDB response parse failed: {}", path))
    }

    async fn list(&self, path: &str, extra: &[(&str, &str)], fallback: ContentType) -> Result<Vec<ContentInfo>> {
        let page: Page = self.get_json(path, extra).await?;
        Ok(page
            .results
            .into_iter()
            .filter(|item| !matches!(item.media_type.as_deref(), Some("person")))
            .map(|item| content_from_item(item, fallback))
            .collect())
    }

    pub async fn details(&self, id: u64, kind: ContentType) -> Result<ContentInfoDetail> {
        let path = format!("/{}/{}", kind.as_str(), id);
        let detail: Detail = self
            .get_json(&path, &[("append_to_response", "credits,keywords,videos")])
            .await?;
        Ok(ContentInfoDetail(detail))
    }
}

/// Opaque detail payload merged into a [`ContentInfo`] by [`ContentInfoDetail::apply`].
pub struct ContentInfoDetail(Detail);

impl ContentInfoDetail {
    pub fn apply(self, content: ContentInfo) -> ContentInfo {
        apply_detail(content, self.0)
    }
}

#[async_trait]
impl CatalogSource for TmdbCatalog {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn trending(&self, kind: CatalogKind, window: TimeWindow) -> Result<Vec<ContentInfo>> {
        let path = format!("/trending/{}/{}", kind.as_str(), window.as_str());
        let fallback = match kind {
            CatalogKind::Tv => ContentType::Tv,
            _ => ContentType::Movie,
        };
        self.list(&path, &[], fallback).await
    }

    async fn search_type(&self, query: &str, content_type: ContentType) -> Result<Vec<ContentInfo>> {
        let path = format!("/search/{}", content_type.as_str());
        let params = [("query", query), ("region", self.region.as_str())];
        self.list(&path, &params, content_type).await
    }

    async fn enrich(&self, content: ContentInfo) -> ContentInfo {
        match self.details(content.id, content.content_type).await {
            Ok(detail) => detail.apply(content),
            Err(err) => {
                logw(format!("TMDB details for '{}' failed: {:#}", content.title, err));
                content
            }
        }
    }
}

/// Saves a poster or backdrop locally. `Ok(false)` when the URL is empty
/// or the server refuses.
pub async fn download_image(client: &Client, url: &str, out_path: &Path) -> Result<bool> {
    if url.trim().is_empty() {
        return Ok(false);
    }

    let resp = client
        .get(url)
        .timeout(std::time::Duration::from_secs(60))
        .send()
        .await
        .context("Image download failed")?;

    if !resp.status().is_success() {
        logw(format!("Image download HTTP {}: {}", resp.status().as_u16(), url));
        return Ok(false);
    }

    let bytes = resp.bytes().await.context("Image body read failed")?;
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    fs::write(out_path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_items_map_to_content() {
        let raw = r#"{"results":[
            {"id":7,"name":"The Boys","original_name":"The Boys","overview":"Supes",
             "first_air_date":"2019-07-25","genre_ids":[10759,18],"vote_average":8.5,
             "popularity":76.0,"poster_path":"/p.jpg","backdrop_path":null,
             "original_language":"en","media_type":"tv"},
            {"id":9,"name":"Someone","media_type":"person"}
        ]}"#;
        let page: Page = serde_json::from_str(raw).unwrap();
        let items: Vec<ContentInfo> = page
            .results
            .into_iter()
            .filter(|i| i.media_type.as_deref() != Some("person"))
            .map(|i| content_from_item(i, ContentType::Movie))
            .collect();

        assert_eq!(items.len(), 1);
        let c = &items[0];
        assert_eq!(c.content_type, ContentType::Tv);
        assert_eq!(c.platform, "Amazon Prime");
        assert_eq!(c.genres, vec!["Acción y Aventura", "Drama"]);
        assert_eq!(c.poster_url, "https://image.tmdb.org/t/p/w500/p.jpg");
        assert!(c.backdrop_url.is_empty());
        assert_eq!(c.release_date, "2019-07-25");
    }

    #[test]
    fn details_fill_credits_keywords_and_trailer() {
        let raw = r#"{
            "runtime": 180,
            "production_countries": [{"name":"United States of America"}],
            "credits": {
                "cast": [{"name":"A"},{"name":"B"},{"name":"C"},{"name":"D"},{"name":"E"},{"name":"F"}],
                "crew": [{"job":"Director","name":"Nolan"},{"job":"Writer","name":"X"}]
            },
            "keywords": {"keywords": [{"name":"physics"}]},
            "videos": {"results": [
                {"site":"Vimeo","type":"Trailer","key":"v"},
                {"site":"YouTube","type":"Teaser","key":"t"},
                {"site":"YouTube","type":"Trailer","key":"abc"}
            ]}
        }"#;
        let detail: Detail = serde_json::from_str(raw).unwrap();
        let c = apply_detail(ContentInfo::default(), detail);
        assert_eq!(c.runtime, Some(180));
        assert_eq!(c.cast.len(), MAX_CAST);
        assert_eq!(c.directors, vec!["Nolan"]);
        assert_eq!(c.keywords, vec!["physics"]);
        assert_eq!(c.country, "United States of America");
        assert_eq!(
            c.trailer_url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );
    }

    #[test]
    fn tv_keywords_and_episode_runtime() {
        let raw = r#"{"episode_run_time":[55],"keywords":{"results":[{"name":"80s"}]}}"#;
        let detail: Detail = serde_json::from_str(raw).unwrap();
        let c = apply_detail(ContentInfo::default(), detail);
        assert_eq!(c.runtime, Some(55));
        assert_eq!(c.keywords, vec!["80s"]);
        assert!(c.trailer_url.is_none());
    }

    #[test]
    fn platform_guess_and_genre_table() {
        assert_eq!(detect_platform("Star Wars: Andor"), "Disney+");
        assert_eq!(detect_platform("Oppenheimer"), DEFAULT_PLATFORM);
        assert_eq!(genre_name(878), "Ciencia Ficción");
        assert_eq!(genre_name(1), "Desconocido");
    }

    #[tokio::test]
    async fn empty_image_url_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ok = download_image(&Client::new(), "", &dir.path().join("b.jpg"))
            .await
            .unwrap();
        assert!(!ok);
    }
}
