//! Request normalization and reply insights.
//!
//! The facade is deliberately thin: it decides single vs. bulk, cleans
//! up the geographic fields, and turns results into a short human
//! summary. Empty optionals never fail a request — they fall back to
//! defaults.

use bulk::BulkResult;
use parser::{Device, Provider, RankingRecord, SearchOptions};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{ServerError, ServerResult};

/// Inbound tracking request, single or bulk.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRequest {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    pub domain: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub max_results: Option<u32>,
    #[serde(default)]
    pub verify_position: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub extra_params: HashMap<String, String>,
}

/// A request after normalization. A one-element keyword list collapses
/// to a single lookup.
#[derive(Debug, Clone)]
pub enum NormalizedRequest {
    Single {
        keyword: String,
        options: SearchOptions,
    },
    Bulk {
        keywords: Vec<String>,
        options: SearchOptions,
    },
}

pub fn normalize(request: TrackRequest) -> ServerResult<NormalizedRequest> {
    let domain = request.domain.trim().to_string();
    if domain.is_empty() {
        return Err(ServerError::BadRequest("domain is required".to_string()));
    }

    let mut keywords: Vec<String> = Vec::new();
    if let Some(keyword) = request.keyword {
        keywords.push(keyword);
    }
    if let Some(more) = request.keywords {
        keywords.extend(more);
    }
    let keywords: Vec<String> = keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return Err(ServerError::BadRequest(
            "at least one keyword is required".to_string(),
        ));
    }

    let mut options = SearchOptions::new(domain, normalize_country(request.country.as_deref()));
    options.language = request
        .language
        .as_deref()
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "en".to_string());
    options.city = clean(request.city);
    options.state = clean(request.state);
    options.postal_code = clean(request.postal_code);
    options.device = parse_device(request.device.as_deref());
    if let Some(max_results) = request.max_results {
        options.max_results = max_results.clamp(1, 100);
    }
    options.verify_position = request.verify_position;
    options.api_key = clean(request.api_key);
    options.provider = parse_provider(request.provider.as_deref());
    options.extra_params = request.extra_params;

    let mut keywords = keywords;
    if keywords.len() == 1 {
        let keyword = keywords.swap_remove(0);
        Ok(NormalizedRequest::Single { keyword, options })
    } else {
        Ok(NormalizedRequest::Bulk { keywords, options })
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_country(country: Option<&str>) -> String {
    country
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "US".to_string())
}

fn parse_device(device: Option<&str>) -> Device {
    match device.map(|d| d.trim().to_ascii_lowercase()).as_deref() {
        Some("mobile") => Device::Mobile,
        Some("tablet") => Device::Tablet,
        Some("desktop") | Some("") | None => Device::Desktop,
        Some(other) => {
            warn!(device = other, "unknown device, defaulting to desktop");
            Device::Desktop
        }
    }
}

fn parse_provider(provider: Option<&str>) -> Option<Provider> {
    let provider = provider.map(str::trim).filter(|p| !p.is_empty())?;
    match provider.parse::<Provider>() {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(%error, "ignoring unknown provider override");
            None
        }
    }
}

fn position_band(position: u32) -> &'static str {
    if position <= 10 {
        "on the first page"
    } else if position <= 20 {
        "on the second page"
    } else if position <= 50 {
        "in the top 50"
    } else {
        "beyond the top 50"
    }
}

fn visibility_band(rate: f64) -> &'static str {
    if rate >= 70.0 {
        "strong visibility"
    } else if rate >= 40.0 {
        "moderate visibility"
    } else {
        "weak visibility"
    }
}

/// One-line summary for a single lookup.
pub fn single_insight(record: &RankingRecord) -> String {
    match record.position {
        Some(position) => format!(
            "{} ranks #{position} for \"{}\" — {}",
            record.domain,
            record.keyword,
            position_band(position)
        ),
        None => format!(
            "{} was not found in the top {} results for \"{}\"",
            record.domain, record.organic_count, record.keyword
        ),
    }
}

/// One-line summary for a bulk run.
pub fn bulk_insight(result: &BulkResult) -> String {
    let total = result.total_processed;
    if total == 0 {
        return "no keywords were processed".to_string();
    }
    let found: Vec<u32> = result.records.iter().filter_map(|r| r.position).collect();
    let rate = found.len() as f64 / total as f64 * 100.0;
    if found.is_empty() {
        return format!("domain not found for any of {total} keywords — {}", visibility_band(0.0));
    }
    let average = found.iter().copied().map(f64::from).sum::<f64>() / found.len() as f64;
    format!(
        "found for {}/{} keywords ({:.0}% — {}), average position {:.1} ({})",
        found.len(),
        total,
        rate,
        visibility_band(rate),
        average,
        position_band(average.round() as u32)
    )
}
