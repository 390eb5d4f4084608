//! BBC programmes JSON API client
//!
//! `GET {base}/{pid}.json` describes one programme and its ancestry;
//! `GET {base}/{pid}/children.json?page=N` lists a series' or brand's children.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

use super::{EpisodeMetadata, MetadataSource, is_pid};
use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::utils::dedupe_preserve_order;

/// Hard stop for children pagination
const MAX_CHILDREN_PAGES: u32 = 1000;

static SPECIALS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)\bspecials?\b").unwrap()
});

#[derive(Debug, Default, Deserialize)]
struct ProgrammeEnvelope {
    #[serde(default)]
    programme: Option<Programme>,
}

#[derive(Debug, Default, Deserialize)]
struct Programme {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    pid: Option<String>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    position: Option<Value>,
    #[serde(default)]
    display_title: Option<DisplayTitle>,
    #[serde(default)]
    first_broadcast_date: Option<String>,
    #[serde(default)]
    parent: Option<Box<Parent>>,
}

impl Programme {
    fn is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    fn title(&self) -> String {
        match &self.title {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Parent {
    #[serde(default)]
    programme: Option<Programme>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplayTitle {
    #[serde(default)]
    subtitle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChildrenEnvelope {
    #[serde(default)]
    children: Option<Children>,
}

#[derive(Debug, Default, Deserialize)]
struct Children {
    #[serde(default)]
    programmes: Vec<Value>,
    #[serde(default)]
    total: Option<Value>,
}

/// Digit-only rendering of an integer or digit string, empty otherwise
fn number_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.as_u64().map(|n| n.to_string()).unwrap_or_default(),
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.clone()
        }
        _ => String::new(),
    }
}

/// `YYYYMMDD` from an ISO-8601 date or timestamp
fn broadcast_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return String::new();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y%m%d").to_string();
    }
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d")
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_default()
}

fn episode_from_programme(programme: &Programme) -> EpisodeMetadata {
    let episode_title = programme.title();
    let episode_position = if programme.is("episode") {
        number_string(programme.position.as_ref())
    } else {
        String::new()
    };
    let subtitle = programme
        .display_title
        .as_ref()
        .and_then(|d| d.subtitle.clone())
        .unwrap_or_default();

    let mut brand_title = String::new();
    let mut series_title = String::new();
    let mut series_position: Option<&Value> = None;
    let mut ancestor_titles = Vec::new();

    let mut node = programme;
    while let Some(parent) = node.parent.as_ref().and_then(|p| p.programme.as_ref()) {
        let title = parent.title();
        if !title.is_empty() {
            ancestor_titles.push(title.clone());
        }
        if parent.is("series") {
            if series_position.is_none() {
                series_position = parent.position.as_ref();
            }
            if series_title.is_empty() {
                series_title = title;
            }
        } else if parent.is("brand") {
            brand_title = title;
            break;
        }
        node = parent;
    }
    if brand_title.is_empty() && programme.is("brand") {
        brand_title = programme.title();
    }

    let mut season_number = number_string(series_position);
    if season_number.is_empty() {
        let first_subtitle_part = subtitle.split(',').next().unwrap_or_default().trim();
        let mentions_specials = std::iter::once(series_title.as_str())
            .chain(std::iter::once(first_subtitle_part))
            .chain(ancestor_titles.iter().map(String::as_str))
            .any(|hint| SPECIALS.is_match(hint));
        if mentions_specials {
            season_number = "0".to_string();
        }
    }

    let mut episode_number = episode_position;
    if episode_number.is_empty() {
        episode_number = broadcast_date(programme.first_broadcast_date.as_deref());
    }

    EpisodeMetadata {
        show_title: brand_title,
        season_number,
        episode_number,
        episode_title,
    }
}

fn child_pids(programmes: &[Programme], kind: &str) -> Vec<String> {
    programmes
        .iter()
        .filter(|p| p.is(kind))
        .filter_map(|p| p.pid.as_deref())
        .filter(|pid| is_pid(pid))
        .map(str::to_lowercase)
        .collect()
}

/// Metadata source backed by the BBC programmes API
#[derive(Debug, Clone)]
pub struct BbcProgrammes {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    expansion_timeout: Duration,
}

impl BbcProgrammes {
    /// Client for the API at `config.base_url`
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        let base_url = url::Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid programmes URL {}: {e}", config.base_url),
            key: Some("base_url".to_string()),
        })?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("auntie/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            timeout: config.timeout,
            expansion_timeout: config.expansion_timeout,
        })
    }

    async fn programme(&self, pid: &str, timeout: Duration) -> Result<Programme> {
        let url = format!("{}/{pid}.json", self.base_url);
        tracing::debug!(pid, %url, "fetching programme JSON");
        let envelope: ProgrammeEnvelope = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.programme.ok_or_else(|| Error::Metadata {
            pid: pid.to_string(),
            reason: "payload has no programme object".to_string(),
        })
    }

    async fn children(&self, pid: &str) -> Result<Vec<Programme>> {
        let mut programmes = Vec::new();
        for page in 1..=MAX_CHILDREN_PAGES {
            let url = format!("{}/{pid}/children.json?page={page}", self.base_url);
            tracing::debug!(pid, page, "fetching children page");
            let response = self
                .client
                .get(&url)
                .timeout(self.expansion_timeout)
                .send()
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                tracing::debug!(pid, page, "children page not found; stopping");
                break;
            }
            let envelope: ChildrenEnvelope = response.error_for_status()?.json().await?;
            let Some(children) = envelope.children else {
                tracing::debug!(pid, page, "children page has no children object");
                break;
            };

            let page_len = children.programmes.len();
            programmes.extend(
                children
                    .programmes
                    .into_iter()
                    .filter_map(|item| serde_json::from_value::<Programme>(item).ok()),
            );

            let total = children
                .total
                .as_ref()
                .and_then(|t| number_string(Some(t)).parse::<usize>().ok());
            if total.is_some_and(|total| programmes.len() >= total) {
                break;
            }
            if page_len == 0 {
                break;
            }
        }
        Ok(programmes)
    }

    async fn expand_series(&self, pid: &str) -> Result<Vec<String>> {
        let children = self.children(pid).await?;
        let episodes = dedupe_preserve_order(child_pids(&children, "episode"));
        tracing::debug!(pid, count = episodes.len(), "series expanded");
        Ok(episodes)
    }

    async fn expand_brand(&self, pid: &str) -> Result<Vec<String>> {
        let children = self.children(pid).await?;
        let mut episodes = child_pids(&children, "episode");
        let series = dedupe_preserve_order(child_pids(&children, "series"));
        tracing::debug!(
            pid,
            series = series.len(),
            episodes = episodes.len(),
            "brand children listed"
        );
        for series_pid in series {
            episodes.extend(self.expand_series(&series_pid).await?);
        }
        Ok(dedupe_preserve_order(episodes))
    }
}

#[async_trait]
impl MetadataSource for BbcProgrammes {
    async fn episode(&self, pid: &str) -> Result<EpisodeMetadata> {
        let programme = self.programme(pid, self.timeout).await?;
        Ok(episode_from_programme(&programme))
    }

    async fn expand(&self, pid: &str) -> Result<Vec<String>> {
        let programme = self.programme(pid, self.expansion_timeout).await?;
        match programme.kind.as_deref() {
            Some("episode") => Ok(vec![pid.to_string()]),
            Some("series") => self.expand_series(pid).await,
            Some("brand") => self.expand_brand(pid).await,
            other => {
                tracing::debug!(pid, kind = ?other, "programme type cannot be expanded");
                Ok(Vec::new())
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> BbcProgrammes {
        BbcProgrammes::new(&MetadataConfig {
            base_url: server.uri(),
            ..MetadataConfig::default()
        })
        .unwrap()
    }

    fn programme(value: Value) -> Programme {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_episode_with_series_and_brand() {
        let p = programme(json!({
            "type": "episode",
            "title": "Blink",
            "position": 10,
            "parent": {"programme": {
                "type": "series", "title": "Series 3", "position": 3,
                "parent": {"programme": {"type": "brand", "title": "Doctor Who"}}
            }}
        }));
        let metadata = episode_from_programme(&p);
        assert_eq!(
            metadata,
            EpisodeMetadata {
                show_title: "Doctor Who".to_string(),
                season_number: "3".to_string(),
                episode_number: "10".to_string(),
                episode_title: "Blink".to_string(),
            }
        );
    }

    #[test]
    fn test_specials_become_season_zero() {
        let p = programme(json!({
            "type": "episode",
            "title": "The Christmas Invasion",
            "display_title": {"subtitle": "Specials, The Christmas Invasion"},
            "first_broadcast_date": "2005-12-25T19:00:00Z",
            "parent": {"programme": {"type": "brand", "title": "Doctor Who"}}
        }));
        let metadata = episode_from_programme(&p);
        assert_eq!(metadata.season_number, "0");
        assert_eq!(metadata.episode_number, "20051225");
    }

    #[test]
    fn test_brand_programme_uses_own_title() {
        let p = programme(json!({"type": "brand", "title": "Top Gear"}));
        assert_eq!(episode_from_programme(&p).show_title, "Top Gear");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = MetadataConfig {
            base_url: "not a url".to_string(),
            ..MetadataConfig::default()
        };
        assert!(matches!(BbcProgrammes::new(&config), Err(Error::Config { .. })));
    }

    #[test]
    fn test_broadcast_date_formats() {
        assert_eq!(broadcast_date(Some("2021-03-04T20:00:00+01:00")), "20210304");
        assert_eq!(broadcast_date(Some("2021-03-04")), "20210304");
        assert_eq!(broadcast_date(Some("soon")), "");
        assert_eq!(broadcast_date(None), "");
    }

    #[tokio::test]
    async fn test_episode_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/b0bcd123.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "programme": {"type": "episode", "title": "Pilot", "position": 1,
                    "parent": {"programme": {"type": "series", "position": 2,
                        "parent": {"programme": {"type": "brand", "title": "Show"}}}}}
            })))
            .mount(&server)
            .await;

        let metadata = source(&server).episode("b0bcd123").await.unwrap();
        assert_eq!(metadata.show_title, "Show");
        assert_eq!(metadata.season_number, "2");
        assert_eq!(metadata.episode_number, "1");
    }

    #[tokio::test]
    async fn test_episode_lookup_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/b0bcd123.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = source(&server).episode("b0bcd123").await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_expand_episode_is_itself() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/b0bcd123.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"programme": {"type": "episode"}})),
            )
            .mount(&server)
            .await;

        let pids = source(&server).expand("b0bcd123").await.unwrap();
        assert_eq!(pids, vec!["b0bcd123"]);
    }

    #[tokio::test]
    async fn test_expand_series_paginates_until_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/s0000001.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"programme": {"type": "series"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s0000001/children.json"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "children": {"total": 3, "programmes": [
                    {"type": "episode", "pid": "e0000001"},
                    {"type": "clip", "pid": "c0000001"},
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s0000001/children.json"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "children": {"total": 3, "programmes": [
                    {"type": "episode", "pid": "E0000002"},
                ]}
            })))
            .mount(&server)
            .await;

        let pids = source(&server).expand("s0000001").await.unwrap();
        assert_eq!(pids, vec!["e0000001", "e0000002"]);
    }

    #[tokio::test]
    async fn test_expand_brand_includes_series_episodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/b0000001.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"programme": {"type": "brand"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b0000001/children.json"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "children": {"total": 2, "programmes": [
                    {"type": "episode", "pid": "e0000009"},
                    {"type": "series", "pid": "s0000002"},
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s0000002/children.json"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "children": {"programmes": [
                    {"type": "episode", "pid": "e0000001"},
                    {"type": "episode", "pid": "e0000009"},
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s0000002/children.json"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let pids = source(&server).expand("b0000001").await.unwrap();
        assert_eq!(pids, vec!["e0000009", "e0000001"]);
    }
}
