//! Parsing of the native SERP provider shape.
//!
//! The native provider returns the whole results page: organic entries
//! (optionally carrying an explicit `position`), ads, and feature blocks
//! such as the answer box, knowledge graph, local pack, inline media, and
//! people-also-ask questions. Positions preferentially come from the
//! provider field; when it is absent the one-based array index is offset
//! by the feature blocks rendered above the match.

use chrono::Utc;
use matcher::{extract_domain, match_domains, DomainMatch, MatchType};
use serde::Deserialize;
use serde_json::Value;

use crate::confidence;
use crate::error::ParseError;
use crate::types::{
    CompetitorEntry, LocationEcho, PositionSource, PositionValidation, Provider, RankingRecord,
    Reliability, RequestContext, SearchMetadata, SearchOptions, SerpFeature, SerpFeatureKind,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NativeSerpResponse {
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
    #[serde(default)]
    pub ads: Vec<Value>,
    #[serde(default)]
    pub answer_box: Option<Value>,
    #[serde(default)]
    pub knowledge_graph: Option<Value>,
    #[serde(default)]
    pub local_results: Option<Value>,
    #[serde(default)]
    pub inline_images: Vec<Value>,
    #[serde(default)]
    pub inline_videos: Vec<Value>,
    #[serde(default)]
    pub related_searches: Vec<Value>,
    #[serde(default)]
    pub related_questions: Vec<RelatedQuestion>,
    pub search_information: Option<SearchInformation>,
    #[serde(default)]
    pub search_metadata: Option<NativeSearchMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedQuestion {
    #[serde(default)]
    pub question: Option<String>,
    /// One-based position of the question block on the page.
    #[serde(default)]
    pub block_position: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchInformation {
    /// Number or display string such as "About 1,240,000 results".
    #[serde(default)]
    pub total_results: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NativeSearchMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub total_time_taken: Option<f64>,
}

impl NativeSerpResponse {
    fn local_pack_len(&self) -> usize {
        match &self.local_results {
            None => 0,
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map
                .get("places")
                .and_then(Value::as_array)
                .map_or(1, Vec::len),
            Some(_) => 1,
        }
    }

    fn detected_features(&self) -> Vec<SerpFeature> {
        let mut features = Vec::new();
        if !self.ads.is_empty() {
            features.push(SerpFeature::counted(
                SerpFeatureKind::Ads,
                self.ads.len() as u32,
            ));
        }
        if self.answer_box.is_some() {
            features.push(SerpFeature::new(SerpFeatureKind::FeaturedSnippet));
        }
        if self.knowledge_graph.is_some() {
            features.push(SerpFeature::new(SerpFeatureKind::KnowledgePanel));
        }
        if self.local_results.is_some() {
            features.push(SerpFeature::counted(
                SerpFeatureKind::LocalPack,
                self.local_pack_len() as u32,
            ));
        }
        if !self.inline_images.is_empty() {
            features.push(SerpFeature::counted(
                SerpFeatureKind::Images,
                self.inline_images.len() as u32,
            ));
        }
        if !self.inline_videos.is_empty() {
            features.push(SerpFeature::counted(
                SerpFeatureKind::Videos,
                self.inline_videos.len() as u32,
            ));
        }
        if !self.related_searches.is_empty() {
            features.push(SerpFeature::counted(
                SerpFeatureKind::RelatedSearches,
                self.related_searches.len() as u32,
            ));
        }
        if !self.related_questions.is_empty() {
            features.push(SerpFeature::counted(
                SerpFeatureKind::PeopleAlsoAsk,
                self.related_questions.len() as u32,
            ));
        }
        features
    }

    fn total_items(&self) -> u32 {
        (self.organic_results.len()
            + self.ads.len()
            + usize::from(self.answer_box.is_some())
            + usize::from(self.knowledge_graph.is_some())
            + self.local_pack_len()
            + self.inline_images.len()
            + self.inline_videos.len()
            + self.related_searches.len()
            + self.related_questions.len()) as u32
    }

    /// Feature slots rendered before the given one-based organic index:
    /// all ads, the answer box, the local pack, and any people-also-ask
    /// blocks the provider placed above the match.
    fn feature_offset_before(&self, array_index: u32) -> u32 {
        let paa_before = self
            .related_questions
            .iter()
            .filter(|q| q.block_position.is_some_and(|bp| bp <= array_index))
            .count();
        (self.ads.len()
            + usize::from(self.answer_box.is_some())
            + self.local_pack_len()
            + paa_before) as u32
    }
}

struct BestMatch {
    /// Zero-based index into `organic_results`.
    index: usize,
    matched: DomainMatch,
    provider_position: Option<u32>,
}

impl BestMatch {
    fn has_valid_position(&self) -> bool {
        self.provider_position.is_some_and(|p| p >= 1)
    }
}

/// Scan organic results for the entry that best represents the target.
///
/// Highest match confidence wins; ties prefer an entry carrying a provider
/// position, then the earliest index. Iteration stops early only when an
/// exact match also carries a valid position — an exact match without one
/// keeps scanning so a positioned weaker match can still win the
/// tie-breaker.
fn select_best_match(organic: &[OrganicResult], target: &str) -> Option<BestMatch> {
    let mut best: Option<BestMatch> = None;

    for (index, result) in organic.iter().enumerate() {
        let Some(link) = result.link.as_deref() else {
            continue;
        };
        let result_domain = extract_domain(link);
        if result_domain.is_empty() {
            continue;
        }
        let matched = match_domains(target, &result_domain);
        if !matched.matched {
            continue;
        }

        let candidate = BestMatch {
            index,
            matched,
            provider_position: result.position,
        };
        let replace = match &best {
            None => true,
            Some(current) => {
                candidate.matched.confidence > current.matched.confidence
                    || (candidate.matched.confidence == current.matched.confidence
                        && candidate.has_valid_position()
                        && !current.has_valid_position())
            }
        };
        let short_circuit =
            candidate.matched.match_type == MatchType::Exact && candidate.has_valid_position();
        if replace {
            best = Some(candidate);
        }
        if short_circuit {
            break;
        }
    }

    best
}

pub fn parse(
    keyword: &str,
    raw: &Value,
    options: &SearchOptions,
    context: &RequestContext,
) -> Result<RankingRecord, ParseError> {
    let response: NativeSerpResponse =
        serde_json::from_value(raw.clone()).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let Some(search_information) = response.search_information.as_ref() else {
        return Err(ParseError::MissingSearchInformation);
    };

    let total_results = parse_total_results(search_information.total_results.as_ref());
    let organic_count = response.organic_results.len() as u32;
    let features = response.detected_features();
    let mut warnings: Vec<String> = Vec::new();

    let best = select_best_match(&response.organic_results, &options.domain);

    let mut position: Option<u32> = None;
    let mut source = PositionSource::Unknown;
    let mut method = "none";
    let mut array_index_position: Option<u32> = None;
    let mut matched_entry: Option<&OrganicResult> = None;

    if let Some(best) = &best {
        let entry = &response.organic_results[best.index];
        let array_index = best.index as u32 + 1;
        array_index_position = Some(array_index);
        matched_entry = Some(entry);

        if let Some(provider_position) = best.provider_position.filter(|p| *p >= 1) {
            position = Some(provider_position);
            source = PositionSource::ProviderField;
            method = "provider_field";
            if provider_position.abs_diff(array_index) > 3 {
                warnings.push(format!(
                    "provider position {provider_position} deviates from array order {array_index} by more than 3"
                ));
            }
        } else {
            let offset = response.feature_offset_before(array_index);
            position = Some(array_index + offset);
            source = PositionSource::ArrayIndexFallback;
            method = "array_index_offset";
            warnings.push(format!(
                "no provider position; derived from array index {array_index} plus {offset} feature slots"
            ));
        }
    }

    let found = position.is_some();
    let mut verified_position: Option<u32> = None;

    // Verification mode: cross-check the reported position against array
    // order, allowing for the feature blocks that shift organic entries
    // down the page.
    if options.verify_position {
        if let (Some(pos), Some(array_index)) = (position, array_index_position) {
            let expected = response.ads.len() as u32
                + u32::from(response.answer_box.is_some())
                + u32::from(response.local_results.is_some());
            if pos.abs_diff(array_index) <= expected + 2 {
                source = PositionSource::CrossVerified;
                method = "cross_check";
                verified_position = Some(pos);
            } else {
                warnings.push(format!(
                    "position {pos} diverges from array index {array_index} beyond {expected} expected feature slots"
                ));
                verified_position = Some(pos);
            }
        }
    }

    let confidence = if found {
        confidence::score(
            source,
            features.len(),
            organic_count as usize,
            warnings.len(),
        )
    } else {
        0
    };

    let competitors = competitors(&response.organic_results);

    Ok(RankingRecord {
        keyword: keyword.to_string(),
        domain: options.domain.clone(),
        position,
        url: matched_entry.and_then(|e| e.link.clone()),
        title: matched_entry.and_then(|e| e.title.clone()),
        snippet: matched_entry.and_then(|e| e.snippet.clone()),
        location: LocationEcho::from(options),
        total_results,
        organic_count,
        checked_at: Utc::now(),
        found,
        validation: PositionValidation {
            original_position: position,
            verified_position,
            position_source: source,
            confidence,
            serp_features: features,
            organic_count,
            total_items: response.total_items(),
            method: method.to_string(),
            warnings,
            array_index_position,
        },
        metadata: SearchMetadata {
            provider: Provider::NativeSerp,
            search_id: response.search_metadata.as_ref().and_then(|m| m.id.clone()),
            upstream_time_taken: response
                .search_metadata
                .as_ref()
                .and_then(|m| m.total_time_taken),
            processing_time_ms: context.processing_time_ms,
            credential_id: context.credential_id.clone(),
        },
        raw_response: context.keep_raw_response.then(|| raw.clone()),
        competitors,
        reliability: Reliability::from_confidence(confidence),
    })
}

fn competitors(organic: &[OrganicResult]) -> Vec<CompetitorEntry> {
    organic
        .iter()
        .filter_map(|entry| match (&entry.link, entry.position) {
            (Some(link), Some(position)) if position >= 1 => Some(CompetitorEntry {
                position,
                url: link.clone(),
                domain: extract_domain(link),
                title: entry.title.clone(),
            }),
            _ => None,
        })
        .take(10)
        .collect()
}

/// Parse the provider's total-results field, which may be a number or a
/// display string. The first run of digits wins, with thousands
/// separators skipped inside the run; a missing field is 0.
pub fn parse_total_results(value: Option<&Value>) -> u64 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => first_digit_run(s),
        Some(_) => 0,
    }
}

fn first_digit_run(text: &str) -> u64 {
    let mut digits = String::new();
    let mut started = false;
    for c in text.chars() {
        if c.is_ascii_digit() {
            started = true;
            digits.push(c);
        } else if started && (c == ',' || c == '.') {
            continue;
        } else if started {
            break;
        }
    }
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> SearchOptions {
        SearchOptions::new("example.com", "US")
    }

    fn organic(link: &str, position: Option<u32>) -> Value {
        let mut obj = json!({ "link": link, "title": "t", "snippet": "s" });
        if let Some(p) = position {
            obj["position"] = json!(p);
        }
        obj
    }

    #[test]
    fn total_results_accepts_numbers_and_strings() {
        assert_eq!(parse_total_results(Some(&json!(1234))), 1234);
        assert_eq!(
            parse_total_results(Some(&json!("About 1,240,000 results"))),
            1_240_000
        );
        assert_eq!(parse_total_results(Some(&json!("nothing here"))), 0);
        assert_eq!(parse_total_results(None), 0);
    }

    #[test]
    fn provider_field_wins_over_array_order() {
        let raw = json!({
            "organic_results": [
                organic("https://www.example.com/a", Some(3)),
                organic("https://other.com", Some(1)),
            ],
            "search_information": { "total_results": 100 },
        });
        let record = parse("kw", &raw, &options(), &RequestContext::default()).unwrap();
        assert!(record.found);
        assert_eq!(record.position, Some(3));
        assert_eq!(
            record.validation.position_source,
            PositionSource::ProviderField
        );
        assert!(record.validation.confidence >= 80);
    }

    #[test]
    fn missing_position_falls_back_to_offset_array_index() {
        let raw = json!({
            "organic_results": [
                organic("https://other.com", None),
                organic("https://shop.example.com/x", None),
            ],
            "ads": [ {}, {} ],
            "answer_box": { "answer": "42" },
            "search_information": { "total_results": "About 12 results" },
        });
        let mut opts = options();
        opts.domain = "shop.example.com".to_string();
        let record = parse("kw", &raw, &opts, &RequestContext::default()).unwrap();
        // Array index 2 plus two ads and the answer box.
        assert_eq!(record.position, Some(5));
        assert_eq!(
            record.validation.position_source,
            PositionSource::ArrayIndexFallback
        );
        assert_eq!(record.validation.warnings.len(), 1);
    }

    #[test]
    fn empty_organic_results_mean_not_found() {
        let raw = json!({
            "organic_results": [],
            "search_information": { "total_results": 0 },
        });
        let record = parse("kw", &raw, &options(), &RequestContext::default()).unwrap();
        assert!(!record.found);
        assert_eq!(record.position, None);
        assert_eq!(record.validation.confidence, 0);
    }

    #[test]
    fn missing_search_information_is_a_parse_error() {
        let raw = json!({ "organic_results": [] });
        let err = parse("kw", &raw, &options(), &RequestContext::default()).unwrap_err();
        assert!(matches!(err, ParseError::MissingSearchInformation));
    }

    #[test]
    fn exact_match_without_position_keeps_scanning() {
        // The raw target string appears verbatim as a later result's host,
        // but the first entry already matches after normalization and has
        // a provider position. The positioned entry must win the
        // tie-break only if confidence ties; an exact hit outranks it.
        let raw = json!({
            "organic_results": [
                organic("https://www.example.com/a", Some(2)),
                { "link": "https://example.com/b", "title": "t" },
            ],
            "search_information": { "total_results": 10 },
        });
        let record = parse("kw", &raw, &options(), &RequestContext::default()).unwrap();
        // extract_domain("https://example.com/b") == "example.com" == raw
        // target, an exact match (confidence 100) without a position, so
        // the fallback path with the later index is chosen.
        assert_eq!(
            record.validation.position_source,
            PositionSource::ArrayIndexFallback
        );
        assert_eq!(record.validation.array_index_position, Some(2));
    }

    #[test]
    fn deviation_beyond_three_records_a_warning() {
        let raw = json!({
            "organic_results": [
                organic("https://www.example.com/a", Some(9)),
            ],
            "search_information": { "total_results": 10 },
        });
        let record = parse("kw", &raw, &options(), &RequestContext::default()).unwrap();
        assert_eq!(record.position, Some(9));
        assert_eq!(record.validation.warnings.len(), 1);
    }

    #[test]
    fn verification_confirms_plausible_positions() {
        let raw = json!({
            "organic_results": [
                organic("https://www.example.com/a", Some(2)),
            ],
            "ads": [ {} ],
            "search_information": { "total_results": 10 },
        });
        let mut opts = options();
        opts.verify_position = true;
        let record = parse("kw", &raw, &opts, &RequestContext::default()).unwrap();
        assert_eq!(
            record.validation.position_source,
            PositionSource::CrossVerified
        );
        assert_eq!(record.validation.verified_position, Some(2));
        assert!(record.validation.warnings.is_empty());
    }

    #[test]
    fn verification_flags_implausible_positions() {
        let raw = json!({
            "organic_results": [
                organic("https://www.example.com/a", Some(40)),
            ],
            "search_information": { "total_results": 10 },
        });
        let mut opts = options();
        opts.verify_position = true;
        let record = parse("kw", &raw, &opts, &RequestContext::default()).unwrap();
        assert_eq!(record.position, Some(40));
        assert_eq!(record.validation.verified_position, Some(40));
        // Deviation warning plus verification warning.
        assert_eq!(record.validation.warnings.len(), 2);
    }

    #[test]
    fn competitors_capped_at_ten_and_require_link_and_position() {
        let mut results = Vec::new();
        for i in 1..=15 {
            results.push(organic(&format!("https://site{i}.com"), Some(i)));
        }
        results.push(json!({ "title": "no link", "position": 99 }));
        let raw = json!({
            "organic_results": results,
            "search_information": { "total_results": 100 },
        });
        let record = parse("kw", &raw, &options(), &RequestContext::default()).unwrap();
        assert_eq!(record.competitors.len(), 10);
        assert_eq!(record.competitors[0].domain, "site1.com");
    }
}
