//! Steam client behaviour against a mock HTTP server.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skin_tracker::config::{Partition, RateLimitConfig, RetryConfig, SteamConfig};
use skin_tracker::market::paginator::CatalogPager;
use skin_tracker::market::steam::SteamClient;
use skin_tracker::market::{MarketSource, PageRequest};

const OVERVIEW: &str = "/market/priceoverview/";
const SEARCH: &str = "/market/search/render/";

fn client(server: &MockServer, max_retries: u32, timeout_seconds: u64) -> SteamClient {
    let steam = SteamConfig {
        base_url: server.uri(),
        app_id: 730,
        currency: 5,
        request_timeout_seconds: timeout_seconds,
    };
    let retry = RetryConfig {
        max_retries,
        retry_delay_ms: 0,
    };
    let rate_limit = RateLimitConfig {
        requests_per_second: 100,
        burst_size: 100,
    };
    SteamClient::new(&steam, &retry, &rate_limit).expect("client builds")
}

fn knives() -> Partition {
    let mut filters = BTreeMap::new();
    filters.insert(
        "category_730_Type[]".to_string(),
        "tag_CSGO_Type_Knife".to_string(),
    );
    Partition {
        name: "knives".to_string(),
        filters,
    }
}

#[tokio::test]
async fn market_stats_decodes_price_overview() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OVERVIEW))
        .and(query_param("appid", "730"))
        .and(query_param("currency", "5"))
        .and(query_param("market_hash_name", "AK-47 | Redline (Field-Tested)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "lowest_price": "1 234,56 pуб.",
            "median_price": "1 300,00 pуб.",
            "volume": "1,024"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stats = client(&server, 3, 5)
        .market_stats("AK-47 | Redline (Field-Tested)")
        .await
        .expect("stats");

    assert_eq!(stats.lowest_price.as_deref(), Some("1 234,56 pуб."));
    assert_eq!(stats.median_price.as_deref(), Some("1 300,00 pуб."));
    assert_eq!(stats.volume.as_deref(), Some("1,024"));
}

#[tokio::test]
async fn market_stats_passes_through_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OVERVIEW))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "lowest_price": "$3.10"
        })))
        .mount(&server)
        .await;

    let stats = client(&server, 3, 5).market_stats("Sticker").await.expect("stats");
    assert_eq!(stats.lowest_price.as_deref(), Some("$3.10"));
    assert!(!stats.has_required_fields());
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OVERVIEW))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OVERVIEW))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "lowest_price": "$1.00",
            "median_price": "$1.20",
            "volume": "10"
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let stats = client(&server, 3, 5).market_stats("P250 | Sand Dune").await;

    assert!(stats.is_some());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn persistent_failure_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OVERVIEW))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let stats = client(&server, 3, 5).market_stats("P250 | Sand Dune").await;

    assert!(stats.is_none());
}

#[tokio::test]
async fn unsuccessful_envelope_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OVERVIEW))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .expect(2)
        .mount(&server)
        .await;

    assert!(client(&server, 2, 5).market_stats("Missing").await.is_none());
}

#[tokio::test]
async fn malformed_body_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OVERVIEW))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .expect(2)
        .mount(&server)
        .await;

    assert!(client(&server, 2, 5).market_stats("Busy").await.is_none());
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OVERVIEW))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "lowest_price": "$1" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let stats = client(&server, 1, 1).market_stats("Slow").await;
    assert!(stats.is_none());
}

#[tokio::test]
async fn catalog_page_sends_partition_filters_and_parses_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("norender", "1"))
        .and(query_param("start", "0"))
        .and(query_param("count", "100"))
        .and(query_param("category_730_Type[]", "tag_CSGO_Type_Knife"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "total_count": 3,
            "results": [
                {
                    "name": "★ Karambit | Doppler (Factory New)",
                    "hash_name": "★ Karambit | Doppler (Factory New)",
                    "sell_listings": 12,
                    "sell_price_text": "$612.40"
                },
                { "sell_listings": 3 },
                {
                    "name": "★ Bayonet | Night (Field-Tested)",
                    "price": 181.5,
                    "sell_listings": "1,204"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let partition = knives();
    let entries = client(&server, 3, 5)
        .catalog_page(PageRequest {
            partition: &partition,
            query: None,
            start: 0,
            count: 100,
        })
        .await
        .expect("page");

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "★ Karambit | Doppler (Factory New)");
    assert_eq!(entries[0].price_text, "$612.40");
    assert_eq!(entries[0].sell_listings, 12);
    assert_eq!(entries[0].category_hint.as_deref(), Some("knives"));
    assert_eq!(entries[1].price_text, "181.5");
    assert_eq!(entries[1].sell_listings, 1204);
}

#[tokio::test]
async fn pager_stops_after_short_page() {
    let server = MockServer::start().await;
    let row = |name: &str| json!({ "hash_name": name, "sell_price_text": "$1.00", "sell_listings": 50 });

    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [row("A"), row("B")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("start", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": [row("C")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("start", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": []
        })))
        .expect(0)
        .mount(&server)
        .await;

    let source: Arc<dyn MarketSource> = Arc::new(client(&server, 3, 5));
    let mut pager = CatalogPager::new(source, Partition::all(), 2, 100, Duration::ZERO);

    let mut names = Vec::new();
    while let Some(entry) = pager.next_entry().await {
        names.push(entry.name);
    }

    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(pager.pages_fetched(), 2);
}

#[tokio::test]
async fn listing_url_encodes_item_name() {
    let server = MockServer::start().await;
    let steam = client(&server, 3, 5);

    let url = steam.listing_url("★ Karambit | Fade").expect("url");
    assert!(url.starts_with(&format!("{}/market/listings/730/", server.uri())));
    assert!(!url.contains(' '));
    assert!(!url.contains('|'));
}
