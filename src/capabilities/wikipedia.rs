use std::collections::HashMap;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument};

use super::result::{CapabilityError, CapabilityResult};

pub const DEFAULT_WIKIPEDIA_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";

/// Payload of a successful article lookup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub content: String,
}

/// Arguments the model supplies for `fetch_wikipedia_content`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FetchWikipediaArgs {
    pub search_query: String,
}

/// Two-step MediaWiki lookup: search for the best title, then fetch its
/// plain-text introduction.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    http: Client,
    endpoint: String,
}

impl WikipediaClient {
    pub fn new() -> Result<Self, CapabilityError> {
        Self::with_endpoint(DEFAULT_WIKIPEDIA_ENDPOINT)
    }

    /// Wikipedia rejects anonymous clients, so failing to set the
    /// `User-Agent` is an error rather than a silent fallback.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, CapabilityError> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, endpoint: endpoint.into() })
    }

    /// Never fails: no-match and faults both come back as an error status.
    pub async fn fetch_wikipedia_content(&self, search_query: &str) -> CapabilityResult {
        self.fetch_article(search_query).await.into()
    }

    #[instrument(name = "wikipedia.fetch", skip(self), fields(endpoint = %self.endpoint))]
    pub async fn fetch_article(&self, search_query: &str) -> Result<Article, CapabilityError> {
        let search: SearchEnvelope = self
            .get(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", search_query),
                ("srlimit", "1"),
            ])
            .await?;

        let title = top_title(search).ok_or_else(|| not_found(search_query))?;
        debug!(%title, "resolved article title");

        let pages: PagesEnvelope = self
            .get(&[
                ("action", "query"),
                ("format", "json"),
                ("titles", title.as_str()),
                ("prop", "extracts"),
                ("exintro", "true"),
                ("explaintext", "true"),
                ("redirects", "1"),
            ])
            .await?;

        into_article(pages, search_query)
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, CapabilityError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| CapabilityError::Execution(format!("Unexpected Wikipedia response: {e}")))
    }
}

fn not_found(search_query: &str) -> CapabilityError {
    CapabilityError::NoMatch(format!("No Wikipedia article found for '{search_query}'"))
}

#[derive(Deserialize, Debug)]
struct SearchEnvelope {
    query: SearchQuery,
}

#[derive(Deserialize, Debug)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize, Debug)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize, Debug)]
struct PagesEnvelope {
    query: PagesQuery,
}

#[derive(Deserialize, Debug)]
struct PagesQuery {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Deserialize, Debug)]
struct Page {
    title: String,
    #[serde(default)]
    extract: Option<String>,
}

fn top_title(envelope: SearchEnvelope) -> Option<String> {
    envelope.query.search.into_iter().next().map(|hit| hit.title)
}

// "-1" is how MediaWiki marks a missing page.
fn into_article(envelope: PagesEnvelope, search_query: &str) -> Result<Article, CapabilityError> {
    let Some((page_id, page)) = envelope.query.pages.into_iter().next() else {
        return Err(not_found(search_query));
    };
    if page_id == "-1" {
        return Err(not_found(search_query));
    }

    let content = clean_extract(page.extract.as_deref().unwrap_or_default());
    if content.is_empty() {
        return Err(CapabilityError::NoMatch(format!(
            "Wikipedia article '{}' has no introduction text",
            page.title
        )));
    }
    Ok(Article { title: page.title, content })
}

/// Trims the extract and drops every non-ASCII character.
fn clean_extract(extract: &str) -> String {
    extract.trim().chars().filter(char::is_ascii).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Route = fn(&str) -> (u16, &'static str);

    /// Serves canned MediaWiki answers on a loopback port and records every
    /// request target (`/w/api.php?...`) in arrival order.
    async fn mediawiki(route: Route) -> (WikipediaClient, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let head = String::from_utf8_lossy(&buf).to_string();
                let target = head.split_whitespace().nth(1).unwrap_or_default().to_string();
                let (status, body) = route(&target);
                log.lock().unwrap().push(target);

                let response = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    if status == 200 { "OK" } else { "Error" },
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let client = WikipediaClient::with_endpoint(format!("http://{addr}/w/api.php")).unwrap();
        (client, seen)
    }

    fn found(target: &str) -> (u16, &'static str) {
        if target.contains("list=search") {
            (200, r#"{"query":{"searchinfo":{"totalhits":1},"search":[{"ns":0,"title":"Rustacean"}]}}"#)
        } else {
            (200, r#"{"query":{"pages":{"42":{"pageid":42,"title":"Rustacean","extract":"  Crab mascot. \n"}}}}"#)
        }
    }

    fn nothing(_target: &str) -> (u16, &'static str) {
        (200, r#"{"query":{"searchinfo":{"totalhits":0},"search":[]}}"#)
    }

    fn unavailable(_target: &str) -> (u16, &'static str) {
        (503, "upstream down")
    }

    #[test]
    fn extract_is_trimmed_and_ascii_only() {
        assert_eq!(clean_extract("  Zürich is a city – in Switzerland.\n"), "Zrich is a city  in Switzerland.");
    }

    #[test]
    fn top_title_takes_first_hit() {
        let env: SearchEnvelope = serde_json::from_str(
            r#"{"batchcomplete":"","query":{"searchinfo":{"totalhits":2},"search":[{"ns":0,"title":"Rust (programming language)"},{"ns":0,"title":"Rust"}]}}"#,
        )
        .unwrap();
        assert_eq!(top_title(env).as_deref(), Some("Rust (programming language)"));
    }

    #[test]
    fn empty_search_has_no_title() {
        let env: SearchEnvelope =
            serde_json::from_str(r#"{"query":{"searchinfo":{"totalhits":0},"search":[]}}"#).unwrap();
        assert!(top_title(env).is_none());
    }

    #[test]
    fn page_extract_becomes_article() {
        let env: PagesEnvelope = serde_json::from_str(
            r#"{"query":{"pages":{"25768":{"pageid":25768,"ns":0,"title":"Rust (programming language)","extract":" Rust is fast. "}}}}"#,
        )
        .unwrap();
        assert_eq!(
            into_article(env, "rust"),
            Ok(Article { title: "Rust (programming language)".into(), content: "Rust is fast.".into() })
        );
    }

    #[test]
    fn missing_page_is_no_article() {
        let env: PagesEnvelope =
            serde_json::from_str(r#"{"query":{"pages":{"-1":{"ns":0,"title":"Nope","missing":""}}}}"#).unwrap();
        assert_eq!(
            into_article(env, "nope"),
            Err(CapabilityError::NoMatch("No Wikipedia article found for 'nope'".into()))
        );
    }

    #[test]
    fn page_without_extract_is_not_a_success() {
        let env: PagesEnvelope =
            serde_json::from_str(r#"{"query":{"pages":{"123":{"pageid":123,"title":"Some Page"}}}}"#).unwrap();
        let result = CapabilityResult::from(into_article(env, "some page"));
        assert!(!result.is_success());

        let blank: PagesEnvelope = serde_json::from_str(
            r#"{"query":{"pages":{"7":{"pageid":7,"title":"Emoji","extract":" 🦀 "}}}}"#,
        )
        .unwrap();
        assert!(matches!(into_article(blank, "emoji"), Err(CapabilityError::NoMatch(_))));
    }

    #[tokio::test]
    async fn lookup_searches_then_fetches_the_resolved_title() {
        let (client, seen) = mediawiki(found).await;

        let article = client.fetch_article("ferris crab").await.unwrap();
        assert_eq!(article, Article { title: "Rustacean".into(), content: "Crab mascot.".into() });

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);

        let search = &seen[0];
        assert!(search.starts_with("/w/api.php?"));
        for param in ["action=query", "format=json", "list=search", "srsearch=ferris+crab", "srlimit=1"] {
            assert!(search.contains(param), "{param} missing from {search}");
        }

        let extract = &seen[1];
        for param in ["titles=Rustacean", "prop=extracts", "exintro=true", "explaintext=true", "redirects=1"] {
            assert!(extract.contains(param), "{param} missing from {extract}");
        }
    }

    #[tokio::test]
    async fn empty_search_reports_no_article_without_second_request() {
        let (client, seen) = mediawiki(nothing).await;

        let result = client.fetch_wikipedia_content("nothing here").await;
        assert_eq!(result, CapabilityResult::error("No Wikipedia article found for 'nothing here'"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_error_becomes_error_status() {
        let (client, _seen) = mediawiki(unavailable).await;

        assert!(matches!(client.fetch_article("Rust").await, Err(CapabilityError::Execution(_))));
        assert!(!client.fetch_wikipedia_content("Rust").await.is_success());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error_status() {
        let client = WikipediaClient::with_endpoint("http://127.0.0.1:9/w/api.php").unwrap();
        match client.fetch_article("Rust").await {
            Err(CapabilityError::Execution(_)) => {}
            other => panic!("expected execution error, got {other:?}"),
        }
        assert!(!client.fetch_wikipedia_content("Rust").await.is_success());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn nonexistent_topic_returns_error_status() {
        let result = WikipediaClient::new()
            .unwrap()
            .fetch_wikipedia_content("Nonexistent Topic XYZ123")
            .await;
        assert!(matches!(result, CapabilityResult::Error { .. }));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn well_known_topic_has_title_and_content() {
        let article = WikipediaClient::new()
            .unwrap()
            .fetch_article("Rust programming language")
            .await
            .unwrap();
        assert!(!article.title.is_empty());
        assert!(!article.content.is_empty());
    }
}
