//! Canonical data model shared across the tracking pipeline.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upstream search provider a lookup is executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Full SERP provider returning organic results plus feature blocks.
    NativeSerp,
    /// Flat custom-search API: items only, no feature blocks, max 10 results.
    CustomSearch,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::NativeSerp => "native_serp",
            Provider::CustomSearch => "custom_search",
        };
        f.write_str(name)
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native_serp" | "native" | "serp" => Ok(Provider::NativeSerp),
            "custom_search" | "custom" | "cse" => Ok(Provider::CustomSearch),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Device context for the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Desktop => "desktop",
            Device::Mobile => "mobile",
            Device::Tablet => "tablet",
        }
    }
}

/// Caller-supplied parameters for a single keyword lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Target domain, free-form; normalized by the matcher.
    pub domain: String,
    /// ISO-3166 alpha-2 country code.
    pub country: String,
    /// ISO-639 alpha-2 language code.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub device: Device,
    /// Number of results to scan; providers cap this on their side.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Cross-check provider positions against array order.
    #[serde(default)]
    pub verify_position: bool,
    /// Caller-owned secret that bypasses the pool entirely.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Force a specific provider instead of the pool default.
    #[serde(default)]
    pub provider: Option<Provider>,
    /// Extra query parameters forwarded verbatim to the provider.
    #[serde(default)]
    pub extra_params: HashMap<String, String>,
}

impl SearchOptions {
    pub fn new(domain: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            country: country.into(),
            language: default_language(),
            city: None,
            state: None,
            postal_code: None,
            device: Device::default(),
            max_results: default_max_results(),
            verify_position: false,
            api_key: None,
            provider: None,
            extra_params: HashMap::new(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_results() -> u32 {
    100
}

/// How the reported position was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSource {
    /// The provider supplied an explicit position field.
    ProviderField,
    /// Derived from the array index, plus a feature offset when available.
    ArrayIndexFallback,
    /// Provider position confirmed against array order.
    CrossVerified,
    Unknown,
}

/// Non-organic block observed on the results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerpFeatureKind {
    Ads,
    FeaturedSnippet,
    KnowledgePanel,
    LocalPack,
    Images,
    Videos,
    RelatedSearches,
    PeopleAlsoAsk,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerpFeature {
    pub kind: SerpFeatureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Identifying text for the block when the provider exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl SerpFeature {
    pub fn new(kind: SerpFeatureKind) -> Self {
        Self {
            kind,
            count: None,
            anchor: None,
        }
    }

    pub fn counted(kind: SerpFeatureKind, count: u32) -> Self {
        Self {
            kind,
            count: Some(count),
            anchor: None,
        }
    }
}

/// Provenance and plausibility data for a reported position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValidation {
    /// Position as first determined.
    pub original_position: Option<u32>,
    /// Position confirmed (or preserved) by verification mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_position: Option<u32>,
    pub position_source: PositionSource,
    /// 0..=100, see the scoring rules in `confidence`.
    pub confidence: u8,
    pub serp_features: Vec<SerpFeature>,
    /// Organic results scanned.
    pub organic_count: u32,
    /// All items on the page including non-organic blocks.
    pub total_items: u32,
    /// Short tag describing how validation was performed.
    pub method: String,
    pub warnings: Vec<String>,
    /// One-based index of the matched entry in the organic array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_index_position: Option<u32>,
}

/// Provider-side request metadata echoed into the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub provider: Provider,
    /// Provider-assigned search id, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_id: Option<String>,
    /// Upstream processing time in seconds, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_time_taken: Option<f64>,
    /// Local wall-clock time spent on the lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    /// Pool credential that served the lookup; absent for user keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
}

/// Geographic context echoed back with every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEcho {
    pub country: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub device: Device,
}

impl From<&SearchOptions> for LocationEcho {
    fn from(options: &SearchOptions) -> Self {
        Self {
            country: options.country.clone(),
            language: options.language.clone(),
            city: options.city.clone(),
            state: options.state.clone(),
            postal_code: options.postal_code.clone(),
            device: options.device,
        }
    }
}

/// Competing organic entry reported alongside the target position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorEntry {
    pub position: u32,
    pub url: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Coarse quality band derived from the confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reliability {
    High,
    Medium,
    Low,
}

impl Reliability {
    pub fn from_confidence(confidence: u8) -> Self {
        if confidence >= 90 {
            Reliability::High
        } else if confidence >= 70 {
            Reliability::Medium
        } else {
            Reliability::Low
        }
    }
}

/// Canonical outcome of one keyword lookup. Created once per lookup and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRecord {
    pub keyword: String,
    pub domain: String,
    /// One-based rank, `None` when the domain was not found.
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub location: LocationEcho,
    /// Result-set size reported by the provider; 0 when missing.
    pub total_results: u64,
    pub organic_count: u32,
    pub checked_at: DateTime<Utc>,
    pub found: bool,
    pub validation: PositionValidation,
    pub metadata: SearchMetadata,
    /// Raw provider payload retained for debugging when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    /// Up to ten leading organic entries with link and position.
    pub competitors: Vec<CompetitorEntry>,
    pub reliability: Reliability,
}

/// Per-request context supplied by the executor to the parser.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub credential_id: Option<String>,
    pub processing_time_ms: Option<u64>,
    /// Attach the raw provider body to the record for debugging.
    pub keep_raw_response: bool,
}
