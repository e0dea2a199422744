use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use serde::Deserialize;

use crate::error::FetchError;
use crate::ingest::types::{Article, NewsSource};

pub const DEFAULT_ENDPOINT: &str = "https://newsapi.org/v2/everything";

/// Keyword query for security news, searched in titles only.
pub const HACKING_QUERY: &str = r#""data breach" OR "hacker" OR "hackers" OR "hacked" OR "malware" OR "exploited vulnerability" -"how to" -"your" -"you" -"my""#;

/// NewsAPI rejects long queries; the encoded `q` must stay under this.
pub const MAX_ENCODED_QUERY_LEN: usize = 500;

/// Query parameters for the `everything` endpoint. All of it is configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsQuery {
    pub endpoint: String,
    pub query: String,
    pub language: String,
    pub sort_by: String,
    pub domains: Vec<String>,
    pub page_size: u32,
    pub lookback_days: i64,
}

impl Default for NewsQuery {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            query: HACKING_QUERY.to_string(),
            language: "en".to_string(),
            sort_by: "publishedAt".to_string(),
            domains: crate::ingest::domains::default_domains(),
            page_size: 10,
            lookback_days: 7,
        }
    }
}

impl NewsQuery {
    /// Build the full request URL for `now`. The api key is appended last.
    pub fn build_url(&self, api_key: &str, now: DateTime<Utc>) -> Result<reqwest::Url, FetchError> {
        let encoded_len = url_encoded_len(&self.query);
        if encoded_len > MAX_ENCODED_QUERY_LEN {
            return Err(FetchError::InvalidQuery(format!(
                "encoded query exceeds the maximum length of {MAX_ENCODED_QUERY_LEN} characters ({encoded_len})"
            )));
        }

        let from = (now - chrono::Duration::days(self.lookback_days))
            .format("%Y-%m-%d")
            .to_string();
        let to = now.format("%Y-%m-%d").to_string();
        let page_size = self.page_size.to_string();
        let domains = self.domains.join(",");

        let mut params: Vec<(&str, &str)> = vec![
            ("q", self.query.as_str()),
            ("searchIn", "title"),
            ("language", self.language.as_str()),
            ("sortBy", self.sort_by.as_str()),
            ("pageSize", page_size.as_str()),
            ("from", from.as_str()),
            ("to", to.as_str()),
        ];
        if !domains.is_empty() {
            params.push(("domains", domains.as_str()));
        }
        params.push(("apiKey", api_key));

        reqwest::Url::parse_with_params(&self.endpoint, &params)
            .map_err(|e| FetchError::InvalidQuery(format!("failed to parse base URL: {e}")))
    }
}

fn url_encoded_len(s: &str) -> usize {
    // form-urlencoded: unreserved bytes stay, space -> '+', everything else -> %XX
    s.bytes()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' | b' ' => 1,
            _ => 3,
        })
        .sum()
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

/// Decode an `everything` response body into articles.
pub fn parse_articles(body: &str) -> Result<Vec<Article>, FetchError> {
    let t0 = Instant::now();
    let resp: EverythingResponse = serde_json::from_str(body)?;
    if resp.status.as_deref() == Some("error") {
        return Err(FetchError::Api {
            code: resp.code.unwrap_or_else(|| "unknown".to_string()),
            message: resp.message.unwrap_or_default(),
        });
    }
    histogram!("digest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(resp.articles)
}

pub struct NewsApiProvider {
    mode: Mode,
}

enum Mode {
    // Canned response body, used by tests and local runs without a key.
    Fixture(String),
    Http {
        client: reqwest::Client,
        api_key: String,
        query: NewsQuery,
    },
}

impl NewsApiProvider {
    pub fn from_fixture_str(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn new(api_key: String, query: NewsQuery) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("devbriefs-news/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, api_key, query))
    }

    pub fn with_client(client: reqwest::Client, api_key: String, query: NewsQuery) -> Self {
        Self {
            mode: Mode::Http {
                client,
                api_key,
                query,
            },
        }
    }
}

#[async_trait]
impl NewsSource for NewsApiProvider {
    async fn fetch_latest(&self) -> Result<Vec<Article>, FetchError> {
        match &self.mode {
            Mode::Fixture(body) => parse_articles(body),
            Mode::Http {
                client,
                api_key,
                query,
            } => {
                let url = query.build_url(api_key, Utc::now())?;
                let resp = client.get(url).send().await.map_err(|e| {
                    // reqwest errors embed the URL, which carries the api key
                    FetchError::from(e.without_url())
                })?;
                let status = resp.status();
                let body = resp.text().await.map_err(|e| FetchError::from(e.without_url()))?;

                match parse_articles(&body) {
                    Err(e @ FetchError::Api { .. }) => Err(e),
                    _ if !status.is_success() => Err(FetchError::Status(status.as_u16())),
                    other => other,
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}
