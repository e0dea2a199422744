// src/ingest/types.rs
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FetchError;

/// One article as returned by the search API. Never mutated after decoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default)]
    pub source: ArticleSource,
    // ISO-8601 string; we never interpret it.
    #[serde(rename = "publishedAt", default, deserialize_with = "null_as_empty")]
    pub published_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleSource {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

// NewsAPI sends `null` for missing descriptions and source ids.
fn null_as_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Article>, FetchError>;
    fn name(&self) -> &'static str;
}

/// Tagged result of one bounded fetch. Exactly one variant per fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Vec<Article>),
    Timeout(Duration),
    TransportError(FetchError),
}

impl FetchOutcome {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::Timeout(_) => "timeout",
            FetchOutcome::TransportError(_) => "error",
        }
    }

    pub fn into_result(self) -> Result<Vec<Article>, FetchError> {
        match self {
            FetchOutcome::Success(v) => Ok(v),
            FetchOutcome::Timeout(deadline) => Err(FetchError::Timeout { deadline }),
            FetchOutcome::TransportError(e) => Err(e),
        }
    }
}

impl From<Result<Vec<Article>, FetchError>> for FetchOutcome {
    fn from(r: Result<Vec<Article>, FetchError>) -> Self {
        match r {
            Ok(v) => FetchOutcome::Success(v),
            Err(FetchError::Timeout { deadline }) => FetchOutcome::Timeout(deadline),
            Err(e) => FetchOutcome::TransportError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_decode_to_empty_strings() {
        let raw = r#"{
            "source": {"id": null, "name": "BleepingComputer"},
            "title": "Hackers exploit flaw",
            "description": null,
            "url": "https://example.com/a",
            "publishedAt": "2024-05-01T10:00:00Z"
        }"#;
        let a: Article = serde_json::from_str(raw).unwrap();
        assert_eq!(a.source.id, "");
        assert_eq!(a.source.name, "BleepingComputer");
        assert_eq!(a.description, "");
        assert_eq!(a.published_at, "2024-05-01T10:00:00Z");
    }

    #[test]
    fn serializes_published_at_in_camel_case() {
        let a = Article {
            title: "t".into(),
            published_at: "2024-05-01T10:00:00Z".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["publishedAt"], "2024-05-01T10:00:00Z");
        assert!(v.get("published_at").is_none());
    }

    #[test]
    fn outcome_maps_timeout_and_errors() {
        let t = FetchOutcome::from(Err(FetchError::Timeout {
            deadline: Duration::from_millis(500),
        }));
        assert_eq!(t.label(), "timeout");
        let e = FetchOutcome::from(Err(FetchError::Status(503)));
        assert_eq!(e.label(), "error");
        let ok = FetchOutcome::from(Ok(vec![]));
        assert_eq!(ok.label(), "success");
        assert!(ok.into_result().unwrap().is_empty());
    }
}
