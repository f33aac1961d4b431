//! End-to-end parsing scenarios across the matcher and parser layers.

use serde_json::{json, Value};
use serptrack::{
    match_domains, parse_response, MatchType, PositionSource, Provider, RequestContext,
    SearchOptions,
};

fn organic(link: &str, position: Option<u32>) -> Value {
    let mut entry = json!({ "link": link, "title": "t", "snippet": "s" });
    if let Some(position) = position {
        entry["position"] = json!(position);
    }
    entry
}

#[test]
fn provider_field_wins_with_normalized_match() {
    let raw = json!({
        "organic_results": [
            organic("https://www.example.com/a", Some(3)),
            organic("https://other.com", Some(1)),
        ],
        "search_information": { "total_results": 1000 },
    });
    let options = SearchOptions::new("example.com", "US");
    let record = parse_response(
        Provider::NativeSerp,
        "kw",
        &raw,
        &options,
        &RequestContext::default(),
    )
    .unwrap();

    assert!(record.found);
    assert_eq!(record.position, Some(3));
    assert_eq!(record.validation.position_source, PositionSource::ProviderField);
    assert!(record.validation.confidence >= 80);
    assert_eq!(record.url.as_deref(), Some("https://www.example.com/a"));

    // The winning entry matched after www-stripping.
    let m = match_domains("www.example.com", "example.com");
    assert_eq!(m.match_type, MatchType::Normalized);
}

#[test]
fn feature_offset_applies_when_no_provider_position_exists() {
    // Two ads and an answer box sit above the organic list; the match is
    // the second organic entry. Ten organic entries keep the thin-page
    // penalty out of the arithmetic.
    let mut entries = vec![
        organic("https://other.com", None),
        organic("https://shop.example.com/x", None),
    ];
    for i in 0..8 {
        entries.push(organic(&format!("https://filler{i}.com"), None));
    }
    let raw = json!({
        "organic_results": entries,
        "ads": [ {}, {} ],
        "answer_box": { "answer": "42" },
        "search_information": { "total_results": "About 1,240,000 results" },
    });
    let options = SearchOptions::new("shop.example.com", "US");
    let record = parse_response(
        Provider::NativeSerp,
        "kw",
        &raw,
        &options,
        &RequestContext::default(),
    )
    .unwrap();

    // Array index 2 plus offset 3 (two ads + answer box).
    assert_eq!(record.position, Some(5));
    assert_eq!(
        record.validation.position_source,
        PositionSource::ArrayIndexFallback
    );
    assert_eq!(record.validation.warnings.len(), 1);
    // 100 − 30 (fallback) − 10 (two features) − 5 (one warning).
    assert_eq!(record.validation.confidence, 55);
    assert_eq!(record.total_results, 1_240_000);
}

#[test]
fn empty_organic_results_mean_not_found() {
    let raw = json!({
        "organic_results": [],
        "search_information": { "total_results": 0 },
    });
    let options = SearchOptions::new("example.com", "US");
    let record = parse_response(
        Provider::NativeSerp,
        "kw",
        &raw,
        &options,
        &RequestContext::default(),
    )
    .unwrap();

    assert!(!record.found);
    assert_eq!(record.position, None);
    assert_eq!(record.validation.confidence, 0);
}

#[test]
fn found_and_position_agree_on_both_providers() {
    let native = json!({
        "organic_results": [ organic("https://example.com", Some(1)) ],
        "search_information": { "total_results": 10 },
    });
    let custom = json!({
        "items": [ { "link": "https://nowhere.org" } ],
        "searchInformation": { "totalResults": "10" },
    });
    let options = SearchOptions::new("example.com", "US");

    let hit = parse_response(
        Provider::NativeSerp,
        "kw",
        &native,
        &options,
        &RequestContext::default(),
    )
    .unwrap();
    assert_eq!(hit.found, hit.position.is_some());
    assert!(hit.found && hit.validation.confidence > 0);

    let miss = parse_response(
        Provider::CustomSearch,
        "kw",
        &custom,
        &options,
        &RequestContext::default(),
    )
    .unwrap();
    assert_eq!(miss.found, miss.position.is_some());
    assert!(!miss.found && miss.validation.confidence == 0);
}

#[test]
fn match_grades_cover_the_ladder() {
    let subdomain = match_domains("blog.example.com", "example.com");
    assert_eq!(subdomain.match_type, MatchType::Subdomain);
    assert_eq!(subdomain.confidence, 85);

    let normalized = match_domains("www.example.com", "example.com");
    assert_eq!(normalized.match_type, MatchType::Normalized);
    assert_eq!(normalized.confidence, 95);

    let singular = match_domains("companies.co", "company.co");
    assert_eq!(singular.match_type, MatchType::Normalized);
    assert_eq!(singular.confidence, 93);
}
