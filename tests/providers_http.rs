//! HTTP behaviour of the paper providers and a full query against mocked
//! upstream APIs with a SQLite store.

use std::sync::Arc;

use paper_digest::{
    config::{ArxivConfig, DigestConfig, SemanticScholarConfig},
    digest::DisplayableResult,
    engine::{FixedClock, ResearchEngine},
    provider::{
        arxiv::ArxivProvider, fetch_outcome, semantic_scholar::SemanticScholarProvider,
        FetchOutcome, PaperProvider, ProviderError,
    },
    ranking::KeywordRanker,
    storage::{sqlite::SqliteStorage, PaperStorage},
    summarize::ExtractiveSummarizer,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All You Need</title>
    <summary>The dominant sequence transduction models are based on recurrent networks. We propose the Transformer.</summary>
    <author><name>Ashish Vaswani</name></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2010.11929v2</id>
    <published>2020-10-22T17:55:59Z</published>
    <title>An Image is Worth 16x16 Words: Transformers for Image Recognition at Scale</title>
    <summary>We apply a pure transformer to sequences of image patches.</summary>
    <author><name>Alexey Dosovitskiy</name></author>
  </entry>
</feed>"#;

fn s2_body() -> serde_json::Value {
    serde_json::json!({
        "total": 2,
        "offset": 0,
        "data": [
            {
                "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
                "title": "Attention is All you Need",
                "abstract": "Duplicate of the arXiv record.",
                "venue": "NeurIPS",
                "year": 2017,
                "authors": [{"authorId": "40348417", "name": "Ashish Vaswani"}],
                "url": "https://www.semanticscholar.org/paper/204e3073",
                "externalIds": {"ArXiv": "1706.03762"}
            },
            {
                "paperId": "df2b0e26d0599ce3e70df8a9da02e51594e0e992",
                "title": "BERT: Pre-training of Deep Bidirectional Transformers",
                "abstract": "We introduce BERT. It obtains new state-of-the-art results.",
                "venue": "NAACL",
                "year": 2019,
                "authors": [{"authorId": "1744179", "name": "Jacob Devlin"}],
                "url": null,
                "externalIds": {"DBLP": "conf/naacl/DevlinCLT19"}
            }
        ]
    })
}

fn arxiv_config(server: &MockServer) -> ArxivConfig {
    ArxivConfig {
        base_url: server.uri(),
        max_results: 5,
        timeout_secs: 5,
    }
}

fn s2_config(server: &MockServer) -> SemanticScholarConfig {
    SemanticScholarConfig {
        base_url: server.uri(),
        max_results: 5,
        timeout_secs: 5,
        api_key: None,
    }
}

#[tokio::test]
async fn test_arxiv_fetch_builds_query_and_parses_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("search_query", "all:attention AND all:transformers"))
        .and(query_param("max_results", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FEED))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ArxivProvider::new(&arxiv_config(&server)).unwrap();
    let papers = provider.fetch_papers("attention transformers").await.unwrap();

    assert_eq!(papers.len(), 2);
    assert_eq!(papers[0].id, "arxiv:1706.03762");
    assert_eq!(papers[0].source, "arXiv");
    assert_eq!(papers[1].publish_year, Some(2020));
}

#[tokio::test]
async fn test_arxiv_rate_limit_and_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("search_query", "all:busy"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("search_query", "all:broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let provider = ArxivProvider::new(&arxiv_config(&server)).unwrap();

    let err = provider.fetch_papers("busy").await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimitExceeded(_)));

    let err = provider.fetch_papers("broken").await.unwrap_err();
    assert!(matches!(err, ProviderError::HttpStatus { status: 500, ref message } if message == "internal error"));

    let outcome = fetch_outcome(&provider, "broken").await;
    assert!(matches!(outcome, FetchOutcome::Degraded { ref source, .. } if source == "arXiv"));
}

#[tokio::test]
async fn test_semantic_scholar_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/v1/paper/search"))
        .and(query_param("query", "transformers"))
        .and(header("x-api-key", "s2-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(s2_body()))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        SemanticScholarProvider::new(&s2_config(&server), Some("s2-secret".to_string())).unwrap();
    let papers = provider.fetch_papers("transformers").await.unwrap();

    assert_eq!(papers.len(), 2);
    assert_eq!(papers[0].id, "arxiv:1706.03762");
    assert_eq!(papers[1].id, "s2:df2b0e26d0599ce3e70df8a9da02e51594e0e992");
    assert_eq!(papers[1].source, "NAACL");
}

#[tokio::test]
async fn test_semantic_scholar_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/v1/paper/search"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;

    let provider = SemanticScholarProvider::new(&s2_config(&server), None).unwrap();
    let err = provider.fetch_papers("anything").await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimitExceeded(_)));
}

#[tokio::test]
async fn test_full_query_against_mocked_sources_and_sqlite() {
    let arxiv_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FEED))
        .expect(1)
        .mount(&arxiv_server)
        .await;
    let s2_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/v1/paper/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(s2_body()))
        .expect(1)
        .mount(&s2_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(SqliteStorage::open(dir.path().join("papers.db")).await.unwrap());
    let mut config = DigestConfig::default();
    config.arxiv = arxiv_config(&arxiv_server);
    config.semantic_scholar = s2_config(&s2_server);

    let engine = ResearchEngine::new(
        storage.clone(),
        Arc::new(ArxivProvider::new(&config.arxiv).unwrap()),
        Arc::new(SemanticScholarProvider::new(&config.semantic_scholar, None).unwrap()),
        Arc::new(KeywordRanker),
        Arc::new(ExtractiveSummarizer::new(1, 200)),
        &config,
    )
    .with_clock(Arc::new(FixedClock(1_700_000_000)));

    let first = engine
        .handle_query("transformers", &CancellationToken::new())
        .await;
    let shown = DisplayableResult::from_outcome(first);

    // The arXiv id shared by both sources is stored once.
    assert_eq!(storage.count_papers().await.unwrap(), 3);
    assert_eq!(
        storage.get_last_fetched("transformers").await.unwrap(),
        Some(1_700_000_000)
    );
    let entries = match &shown {
        DisplayableResult::Digest(entries) => entries.clone(),
        other => panic!("Expected digest, got {:?}", other),
    };
    assert_eq!(entries.len(), 3);
    assert!(shown.render_markdown().contains("**BERT: Pre-training of Deep Bidirectional Transformers**\n*NAACL*\n\nWe introduce BERT."));

    // Second query within the freshness window is served locally; the
    // `.expect(1)` mounts fail on drop if either API is hit again.
    let second = engine
        .handle_query("transformers", &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(second, paper_digest::QueryOutcome::Digest(ref e) if e.len() == 3));
}
