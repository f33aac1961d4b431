//! Provider response parsing into canonical ranking records.
//!
//! Two upstream shapes are supported: the native SERP provider (organic
//! results plus feature blocks) and the flat custom-search API. The
//! parser dispatches on the provider tag and produces a [`RankingRecord`]
//! carrying a provenance-tagged position, a confidence score, detected
//! SERP features, and up to ten competitor entries.
//!
//! Parsing the same payload twice yields equal records apart from the
//! capture timestamp and processing time.

mod confidence;
pub mod custom;
mod error;
pub mod native;
mod types;

use serde_json::Value;

pub use error::ParseError;
pub use types::{
    CompetitorEntry, Device, LocationEcho, PositionSource, PositionValidation, Provider,
    RankingRecord, Reliability, RequestContext, SearchMetadata, SearchOptions, SerpFeature,
    SerpFeatureKind,
};

pub use confidence::score as confidence_score;

/// Parse a raw provider body into a ranking record for `keyword`.
pub fn parse_response(
    provider: Provider,
    keyword: &str,
    raw: &Value,
    options: &SearchOptions,
    context: &RequestContext,
) -> Result<RankingRecord, ParseError> {
    match provider {
        Provider::NativeSerp => native::parse(keyword, raw, options, context),
        Provider::CustomSearch => custom::parse(keyword, raw, options, context),
    }
}
