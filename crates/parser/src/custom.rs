//! Parsing of the custom-search provider shape.
//!
//! The custom-search API returns a flat `items` list with no feature
//! blocks and no explicit positions, so ranks are strictly the one-based
//! array index and always carry the fallback provenance tag.

use chrono::Utc;
use matcher::{extract_domain, match_domains, DomainMatch, MatchType};
use serde::Deserialize;
use serde_json::Value;

use crate::confidence;
use crate::error::ParseError;
use crate::types::{
    CompetitorEntry, LocationEcho, PositionSource, PositionValidation, Provider, RankingRecord,
    Reliability, RequestContext, SearchMetadata, SearchOptions,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CustomSearchResponse {
    #[serde(default)]
    pub items: Vec<CustomSearchItem>,
    #[serde(default, rename = "searchInformation")]
    pub search_information: Option<CustomSearchInformation>,
    #[serde(default)]
    pub error: Option<CustomSearchError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomSearchItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomSearchInformation {
    #[serde(default, rename = "totalResults")]
    pub total_results: Option<String>,
    #[serde(default, rename = "searchTime")]
    pub search_time: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomSearchError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

pub fn parse(
    keyword: &str,
    raw: &Value,
    options: &SearchOptions,
    context: &RequestContext,
) -> Result<RankingRecord, ParseError> {
    let response: CustomSearchResponse =
        serde_json::from_value(raw.clone()).map_err(|e| ParseError::Malformed(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(ParseError::Provider {
            code: error.code,
            message: error.message,
        });
    }

    let total_results = response
        .search_information
        .as_ref()
        .and_then(|info| info.total_results.as_deref())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let organic_count = response.items.len() as u32;

    let mut best: Option<(usize, DomainMatch)> = None;
    for (index, item) in response.items.iter().enumerate() {
        let Some(link) = item.link.as_deref() else {
            continue;
        };
        let result_domain = extract_domain(link);
        if result_domain.is_empty() {
            continue;
        }
        let matched = match_domains(&options.domain, &result_domain);
        if !matched.matched {
            continue;
        }
        let is_exact = matched.match_type == MatchType::Exact;
        let replace = best
            .as_ref()
            .is_none_or(|(_, current)| matched.confidence > current.confidence);
        if replace {
            best = Some((index, matched));
        }
        if is_exact {
            break;
        }
    }

    let position = best.as_ref().map(|(index, _)| *index as u32 + 1);
    let found = position.is_some();
    let matched_item = best.as_ref().map(|(index, _)| &response.items[*index]);
    let source = if found {
        PositionSource::ArrayIndexFallback
    } else {
        PositionSource::Unknown
    };

    let confidence = if found {
        confidence::score(source, 0, organic_count as usize, 0)
    } else {
        0
    };

    let competitors: Vec<CompetitorEntry> = response
        .items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            item.link.as_deref().map(|link| CompetitorEntry {
                position: index as u32 + 1,
                url: link.to_string(),
                domain: extract_domain(link),
                title: item.title.clone(),
            })
        })
        .take(10)
        .collect();

    Ok(RankingRecord {
        keyword: keyword.to_string(),
        domain: options.domain.clone(),
        position,
        url: matched_item.and_then(|i| i.link.clone()),
        title: matched_item.and_then(|i| i.title.clone()),
        snippet: matched_item.and_then(|i| i.snippet.clone()),
        location: LocationEcho::from(options),
        total_results,
        organic_count,
        checked_at: Utc::now(),
        found,
        validation: PositionValidation {
            original_position: position,
            verified_position: None,
            position_source: source,
            confidence,
            serp_features: Vec::new(),
            organic_count,
            total_items: organic_count,
            method: "array_index".to_string(),
            warnings: Vec::new(),
            array_index_position: position,
        },
        metadata: SearchMetadata {
            provider: Provider::CustomSearch,
            search_id: None,
            upstream_time_taken: response
                .search_information
                .as_ref()
                .and_then(|info| info.search_time),
            processing_time_ms: context.processing_time_ms,
            credential_id: context.credential_id.clone(),
        },
        raw_response: context.keep_raw_response.then(|| raw.clone()),
        competitors,
        reliability: Reliability::from_confidence(confidence),
    })
}
