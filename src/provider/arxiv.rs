//! arXiv API provider.
//!
//! Queries the public arXiv export API and parses its Atom feed.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::ACCEPT;
use tracing::debug;

use super::{http_client, PaperProvider, ProviderError, ProviderResult};
use crate::config::ArxivConfig;
use crate::embedding::normalize_whitespace;
use crate::models::{Author, Paper};

/// Source label attached to papers from this provider.
pub const ARXIV_SOURCE: &str = "arXiv";

/// Fetches papers from the arXiv export API.
#[derive(Debug, Clone)]
pub struct ArxivProvider {
    http: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl ArxivProvider {
    /// Create a provider from configuration.
    pub fn new(config: &ArxivConfig) -> ProviderResult<Self> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    /// Build the `search_query` parameter: every token must appear.
    fn build_search_query(query: &str) -> String {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| format!("all:{}", t))
            .collect();
        if tokens.is_empty() {
            "all:*".to_string()
        } else {
            tokens.join(" AND ")
        }
    }
}

#[async_trait]
impl PaperProvider for ArxivProvider {
    async fn fetch_papers(&self, query: &str) -> ProviderResult<Vec<Paper>> {
        let search_query = Self::build_search_query(query);
        let max_results = self.max_results.to_string();
        debug!(%search_query, "querying arXiv");

        let response = self
            .http
            .get(format!("{}/api/query", self.base_url))
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
            ])
            .header(ACCEPT, "application/atom+xml, application/xml;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded("arXiv".to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        parse_atom_feed(&body)
    }

    fn name(&self) -> &str {
        ARXIV_SOURCE
    }
}

#[derive(Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<Author>,
    url: Option<String>,
}

impl EntryBuilder {
    fn build(self) -> ProviderResult<Paper> {
        if self.id.contains("/api/errors") {
            return Err(ProviderError::ParseError(format!(
                "arXiv rejected the query: {}",
                normalize_whitespace(&self.summary)
            )));
        }
        let arxiv_id = strip_version(self.id.rsplit("/abs/").next().unwrap_or(&self.id));
        if arxiv_id.is_empty() {
            return Err(ProviderError::ParseError("arXiv entry without id".to_string()));
        }
        Ok(Paper {
            id: format!("arxiv:{}", arxiv_id),
            title: normalize_whitespace(&self.title),
            authors: self.authors,
            source: ARXIV_SOURCE.to_string(),
            abstract_text: normalize_whitespace(&self.summary),
            publish_year: self.published.get(..4).and_then(|y| y.parse().ok()),
            url: self.url.or_else(|| Some(self.id.clone())),
        })
    }
}

/// Drop a trailing version suffix such as `v2` from an arXiv id.
fn strip_version(id: &str) -> String {
    let id = id.trim();
    match id.rfind('v') {
        Some(ix) if ix > 0 && id[ix + 1..].chars().all(|c| c.is_ascii_digit()) && ix + 1 < id.len() => {
            id[..ix].to_string()
        }
        _ => id.to_string(),
    }
}

/// Parse an arXiv Atom feed into papers.
pub fn parse_atom_feed(xml: &str) -> ProviderResult<Vec<Paper>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => entry = Some(EntryBuilder::default()),
                b"id" if entry.is_some() => field = Some(Field::Id),
                b"title" if entry.is_some() => field = Some(Field::Title),
                b"summary" if entry.is_some() => field = Some(Field::Summary),
                b"published" if entry.is_some() => field = Some(Field::Published),
                b"name" if entry.is_some() => field = Some(Field::AuthorName),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if let (b"link", Some(current)) = (e.local_name().as_ref(), entry.as_mut()) {
                    let mut rel = None;
                    let mut href = None;
                    for attr in e.attributes().flatten() {
                        let value = String::from_utf8_lossy(&attr.value).to_string();
                        match attr.key.as_ref() {
                            b"rel" => rel = Some(value),
                            b"href" => href = Some(value),
                            _ => {}
                        }
                    }
                    if rel.as_deref() == Some("alternate") && current.url.is_none() {
                        current.url = href;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(f), Some(current)) = (field, entry.as_mut()) {
                    let text = t
                        .unescape()
                        .map_err(|e| ProviderError::ParseError(e.to_string()))?;
                    match f {
                        Field::Id => current.id.push_str(&text),
                        Field::Title => current.title.push_str(&text),
                        Field::Summary => current.summary.push_str(&text),
                        Field::Published => current.published.push_str(&text),
                        Field::AuthorName => current.authors.push(Author::named(text.trim())),
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"entry" {
                    if let Some(done) = entry.take() {
                        papers.push(done.build()?);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProviderError::ParseError(format!(
                    "invalid Atom feed at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:lora</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2106.09685v2</id>
    <published>2021-06-17T17:37:18Z</published>
    <title>LoRA: Low-Rank Adaptation of
      Large Language Models</title>
    <summary>  An important paradigm &amp; more.
    We propose LoRA.</summary>
    <author><name>Edward J. Hu</name></author>
    <author><name>Yelong Shen</name></author>
    <link href="http://arxiv.org/abs/2106.09685v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2106.09685v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/hep-th/9901001v1</id>
    <published>1999-01-01T00:00:00Z</published>
    <title>Old Style Identifier</title>
    <summary>Strings.</summary>
    <author><name>A. Physicist</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed_entries() {
        let papers = parse_atom_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let lora = &papers[0];
        assert_eq!(lora.id, "arxiv:2106.09685");
        assert_eq!(lora.title, "LoRA: Low-Rank Adaptation of Large Language Models");
        assert_eq!(lora.abstract_text, "An important paradigm & more. We propose LoRA.");
        assert_eq!(lora.source, "arXiv");
        assert_eq!(lora.publish_year, Some(2021));
        assert_eq!(lora.author_names(), "Edward J. Hu, Yelong Shen");
        assert_eq!(lora.url.as_deref(), Some("http://arxiv.org/abs/2106.09685v2"));

        let old = &papers[1];
        assert_eq!(old.id, "arxiv:hep-th/9901001");
        assert_eq!(old.url.as_deref(), Some("http://arxiv.org/abs/hep-th/9901001v1"));
    }

    #[test]
    fn test_parse_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_atom_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn test_parse_error_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry><id>http://arxiv.org/api/errors#incorrect_id_format</id>
          <title>Error</title><summary>incorrect id format</summary></entry></feed>"#;
        let err = parse_atom_feed(xml).unwrap_err();
        assert!(matches!(err, ProviderError::ParseError(msg) if msg.contains("incorrect id format")));
    }

    #[test]
    fn test_parse_malformed_xml() {
        let err = parse_atom_feed("<feed><entry><id>x</entry></feed>").unwrap_err();
        assert!(matches!(err, ProviderError::ParseError(_)));
    }

    #[test]
    fn test_build_search_query() {
        assert_eq!(ArxivProvider::build_search_query("graph  neural"), "all:graph AND all:neural");
        assert_eq!(ArxivProvider::build_search_query("lora"), "all:lora");
    }

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("2106.09685v12"), "2106.09685");
        assert_eq!(strip_version("2106.09685"), "2106.09685");
        assert_eq!(strip_version("solv-int/9901001v1"), "solv-int/9901001");
    }
}
