//! Provider request construction and response-header harvesting.

use parser::{Provider, SearchOptions};

/// Human-readable country names for the composite `location` parameter.
/// The native provider expects names, not ISO codes; unknown codes pass
/// through unchanged.
pub fn country_name(code: &str) -> &str {
    match code.to_ascii_uppercase().as_str() {
        "AR" => "Argentina",
        "AT" => "Austria",
        "AU" => "Australia",
        "BE" => "Belgium",
        "BR" => "Brazil",
        "CA" => "Canada",
        "CH" => "Switzerland",
        "CL" => "Chile",
        "CN" => "China",
        "CO" => "Colombia",
        "CZ" => "Czechia",
        "DE" => "Germany",
        "DK" => "Denmark",
        "EG" => "Egypt",
        "ES" => "Spain",
        "FI" => "Finland",
        "FR" => "France",
        "GB" => "United Kingdom",
        "GR" => "Greece",
        "HK" => "Hong Kong",
        "HU" => "Hungary",
        "ID" => "Indonesia",
        "IE" => "Ireland",
        "IL" => "Israel",
        "IN" => "India",
        "IT" => "Italy",
        "JP" => "Japan",
        "KR" => "South Korea",
        "MX" => "Mexico",
        "MY" => "Malaysia",
        "NG" => "Nigeria",
        "NL" => "Netherlands",
        "NO" => "Norway",
        "NZ" => "New Zealand",
        "PE" => "Peru",
        "PH" => "Philippines",
        "PK" => "Pakistan",
        "PL" => "Poland",
        "PT" => "Portugal",
        "RO" => "Romania",
        "RU" => "Russia",
        "SA" => "Saudi Arabia",
        "SE" => "Sweden",
        "SG" => "Singapore",
        "TH" => "Thailand",
        "TR" => "Turkey",
        "TW" => "Taiwan",
        "UA" => "Ukraine",
        "US" => "United States",
        "VN" => "Vietnam",
        "ZA" => "South Africa",
        _ => "",
    }
}

/// Composite location string for the native provider: city, state, and
/// country name joined with commas, postal code appended. `None` when no
/// part is set, which makes the search global keyword-only.
pub fn build_location(options: &SearchOptions) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(city) = options.city.as_deref().filter(|c| !c.trim().is_empty()) {
        parts.push(city.trim().to_string());
    }
    if let Some(state) = options.state.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(state.trim().to_string());
    }
    if !options.country.trim().is_empty() {
        let name = country_name(&options.country);
        parts.push(if name.is_empty() {
            options.country.trim().to_string()
        } else {
            name.to_string()
        });
    }
    if parts.is_empty() {
        return None;
    }
    let mut location = parts.join(",");
    if let Some(postal) = options
        .postal_code
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    {
        location.push(',');
        location.push_str(postal.trim());
    }
    Some(location)
}

/// Query parameters for the native SERP endpoint.
pub fn build_native_params(
    keyword: &str,
    options: &SearchOptions,
    secret: &str,
) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("engine".into(), "google".into()),
        ("q".into(), keyword.to_string()),
        ("api_key".into(), secret.to_string()),
        ("gl".into(), options.country.to_ascii_lowercase()),
        ("hl".into(), options.language.clone()),
        ("num".into(), options.max_results.to_string()),
        ("start".into(), "0".into()),
        ("device".into(), options.device.as_str().into()),
        ("safe".into(), "off".into()),
        ("filter".into(), "0".into()),
        ("no_cache".into(), "true".into()),
    ];
    if let Some(location) = build_location(options) {
        params.push(("location".into(), location));
    }
    for (key, value) in &options.extra_params {
        params.push((key.clone(), value.clone()));
    }
    params
}

/// Query parameters for the custom-search endpoint. The API caps result
/// counts at 10; a city/state refinement is folded into the query text
/// because the API has no location parameter.
pub fn build_custom_params(
    keyword: &str,
    options: &SearchOptions,
    secret: &str,
    search_engine_id: &str,
) -> Vec<(String, String)> {
    let mut query = keyword.to_string();
    if let Some(city) = options.city.as_deref().filter(|c| !c.trim().is_empty()) {
        query.push(' ');
        query.push_str(city.trim());
        if let Some(state) = options.state.as_deref().filter(|s| !s.trim().is_empty()) {
            query.push(' ');
            query.push_str(state.trim());
        }
    }
    vec![
        ("key".into(), secret.to_string()),
        ("cx".into(), search_engine_id.to_string()),
        ("q".into(), query),
        ("num".into(), options.max_results.min(10).to_string()),
        ("gl".into(), options.country.to_ascii_lowercase()),
        ("hl".into(), options.language.clone()),
        ("safe".into(), "off".into()),
    ]
}

/// Endpoint for a provider, from the pool configuration.
pub fn endpoint_for(config: &crate::config::PoolConfig, provider: Provider) -> String {
    match provider {
        Provider::NativeSerp => config.native_endpoint.clone(),
        Provider::CustomSearch => config.custom_endpoint.clone(),
    }
}

/// Account-usage figures some providers expose through response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageHeaders {
    pub used: Option<u64>,
    pub remaining: Option<u64>,
    pub monthly_limit: Option<u64>,
}

impl UsageHeaders {
    pub fn is_empty(&self) -> bool {
        self.used.is_none() && self.remaining.is_none() && self.monthly_limit.is_none()
    }

    /// Best-effort used count, derived from limit minus remaining when no
    /// direct figure is present.
    pub fn effective_used(&self) -> Option<u64> {
        self.used.or_else(|| {
            match (self.monthly_limit, self.remaining) {
                (Some(limit), Some(remaining)) => Some(limit.saturating_sub(remaining)),
                _ => None,
            }
        })
    }
}

/// Harvest usage figures from response headers. Understands the combined
/// `x-api-usage: used/limit` form and the separate used/remaining/limit
/// triplet under a few header aliases.
pub fn harvest_usage_headers<'a, I>(headers: I) -> UsageHeaders
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut usage = UsageHeaders::default();
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "x-api-usage" => {
                if let Some((used, limit)) = value.split_once('/') {
                    usage.used = used.trim().parse().ok();
                    usage.monthly_limit = limit.trim().parse().ok();
                }
            }
            "x-searches-used" | "x-usage-used" | "x-requests-used" => {
                usage.used = value.parse().ok();
            }
            "x-searches-remaining" | "x-usage-remaining" | "x-requests-remaining" => {
                usage.remaining = value.parse().ok();
            }
            "x-monthly-limit" | "x-usage-limit" | "x-plan-limit" => {
                usage.monthly_limit = value.parse().ok();
            }
            _ => {}
        }
    }
    usage
}
