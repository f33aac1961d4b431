//! Host extraction and normalization helpers.
//!
//! All functions here are total: malformed input yields an empty string
//! rather than an error, and the matcher treats empty as "no match".

/// Prefix labels that carry no identity: bare `www`, numbered `www2`-style
/// mirrors, and mobile hosts.
fn is_noise_label(label: &str) -> bool {
    if label == "m" || label == "mobile" {
        return true;
    }
    if let Some(rest) = label.strip_prefix("www") {
        return rest.is_empty() || rest.chars().all(|c| c.is_ascii_digit());
    }
    false
}

/// Extract the host portion of a free-form domain or URL.
///
/// Tolerates full URLs, bare hosts, hosts with ports, and trailing paths.
/// Returns an empty string when no host can be found; never panics.
pub fn extract_domain(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    // Strip any scheme ("https://", "ftp://", ...).
    let after_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };

    // Drop userinfo, then cut at the first path/query/fragment boundary.
    let after_userinfo = after_scheme
        .split_once('@')
        .map_or(after_scheme, |(_, rest)| rest);
    let host_port = after_userinfo
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    // Drop the port. IPv6 literals keep their brackets intact.
    let host = if host_port.starts_with('[') {
        host_port
            .split_once(']')
            .map_or(host_port, |(h, _)| &h[1..])
    } else {
        host_port.split(':').next().unwrap_or_default()
    };

    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Normalize a domain for comparison: extract the host, then strip noise
/// prefixes (`www`, `www2`, `m`, `mobile`).
pub fn normalize_domain(input: &str) -> String {
    let host = extract_domain(input);
    if host.is_empty() {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    // Only strip a noise prefix when something meaningful remains behind it.
    if labels.len() > 2 && is_noise_label(labels[0]) {
        labels[1..].join(".")
    } else {
        host
    }
}

/// Reduce plural labels to a singular form so `companies.co` and
/// `company.co` compare equal: `ies` becomes `y`, then trailing `es`,
/// then a trailing `s` are stripped. Labels too short to survive the
/// stripping are left untouched.
pub fn singularize_domain(domain: &str) -> String {
    domain
        .split('.')
        .map(singularize_label)
        .collect::<Vec<_>>()
        .join(".")
}

fn singularize_label(label: &str) -> String {
    if let Some(stem) = label.strip_suffix("ies") {
        if stem.len() >= 2 {
            return format!("{stem}y");
        }
    }
    if let Some(stem) = label.strip_suffix("es") {
        if stem.len() >= 2 {
            return stem.to_string();
        }
    }
    if let Some(stem) = label.strip_suffix('s') {
        if stem.len() >= 2 {
            return stem.to_string();
        }
    }
    label.to_string()
}

/// Last two dot-separated labels of a normalized domain, or the whole
/// string when it has fewer than two labels.
pub(crate) fn main_domain(normalized: &str) -> &str {
    let mut dots = normalized.rmatch_indices('.');
    dots.next();
    match dots.next() {
        Some((idx, _)) => &normalized[idx + 1..],
        None => normalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_host_from_full_url() {
        assert_eq!(
            extract_domain("https://www.example.com/path?q=1#frag"),
            "www.example.com"
        );
        assert_eq!(extract_domain("http://example.com:8080/x"), "example.com");
        assert_eq!(extract_domain("example.com."), "example.com");
        assert_eq!(extract_domain("EXAMPLE.COM"), "example.com");
    }

    #[test]
    fn extract_tolerates_malformed_input() {
        assert_eq!(extract_domain(""), "");
        assert_eq!(extract_domain("   "), "");
        assert_eq!(extract_domain("://"), "");
        assert_eq!(extract_domain("https://"), "");
        assert_eq!(extract_domain("not a url at all"), "not a url at all");
    }

    #[test]
    fn normalization_strips_noise_prefixes() {
        assert_eq!(normalize_domain("www.example.com"), "example.com");
        assert_eq!(normalize_domain("www2.example.com"), "example.com");
        assert_eq!(normalize_domain("m.example.com"), "example.com");
        assert_eq!(normalize_domain("mobile.example.com"), "example.com");
        // A real subdomain is kept.
        assert_eq!(normalize_domain("blog.example.com"), "blog.example.com");
        // "www.com" has nothing behind the prefix.
        assert_eq!(normalize_domain("www.com"), "www.com");
    }

    #[test]
    fn singularization_handles_suffix_families() {
        assert_eq!(singularize_domain("companies.co"), "company.co");
        assert_eq!(singularize_domain("boxes.com"), "box.com");
        assert_eq!(singularize_domain("tools.io"), "tool.io");
        // Too short to strip.
        assert_eq!(singularize_domain("es.io"), "es.io");
        assert_eq!(singularize_domain("company.co"), "company.co");
    }

    #[test]
    fn main_domain_takes_last_two_labels() {
        assert_eq!(main_domain("blog.example.com"), "example.com");
        assert_eq!(main_domain("example.com"), "example.com");
        assert_eq!(main_domain("com"), "com");
    }
}
