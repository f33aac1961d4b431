//! Graded domain comparison.

use serde::{Deserialize, Serialize};

use crate::normalize::{main_domain, normalize_domain, singularize_domain};

/// How two domains relate after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Raw strings are identical.
    Exact,
    /// Equal after normalization (scheme/prefix/port stripping) or after
    /// the singularization pass.
    Normalized,
    /// Same registrable domain, neither side a subdomain of the other.
    MainDomain,
    /// One side is a subdomain (or substring) of the other.
    Subdomain,
    /// Containment weaker than a label boundary.
    Partial,
    /// No relation.
    None,
}

/// Outcome of comparing a result domain against the tracked target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMatch {
    pub matched: bool,
    pub match_type: MatchType,
    /// 0..=100, higher is a stronger identity claim.
    pub confidence: u8,
    pub normalized_a: String,
    pub normalized_b: String,
}

impl DomainMatch {
    fn hit(match_type: MatchType, confidence: u8, a: String, b: String) -> Self {
        Self {
            matched: true,
            match_type,
            confidence,
            normalized_a: a,
            normalized_b: b,
        }
    }

    fn miss(a: String, b: String) -> Self {
        Self {
            matched: false,
            match_type: MatchType::None,
            confidence: 0,
            normalized_a: a,
            normalized_b: b,
        }
    }
}

/// Compare two free-form domains and grade the match.
///
/// The ladder is ordered strongest-first and the first rung that applies
/// wins: exact (100), normalized (95), singularized (93), shared main
/// domain (90), subdomain (85), containment (75), none (0). The relation
/// `matched` is commutative in its arguments.
pub fn match_domains(a: &str, b: &str) -> DomainMatch {
    let norm_a = normalize_domain(a);
    let norm_b = normalize_domain(b);

    if a.trim().is_empty() || b.trim().is_empty() || norm_a.is_empty() || norm_b.is_empty() {
        return DomainMatch::miss(norm_a, norm_b);
    }

    if a == b {
        return DomainMatch::hit(MatchType::Exact, 100, norm_a, norm_b);
    }

    if norm_a == norm_b {
        return DomainMatch::hit(MatchType::Normalized, 95, norm_a, norm_b);
    }

    // Plural/singular variants of the same name.
    let sing_a = singularize_domain(&norm_a);
    let sing_b = singularize_domain(&norm_b);
    if sing_a == sing_b {
        return DomainMatch::hit(MatchType::Normalized, 93, norm_a, norm_b);
    }

    if main_domain(&norm_a) == main_domain(&norm_b) {
        let subdomain = norm_a.ends_with(&format!(".{norm_b}"))
            || norm_b.ends_with(&format!(".{norm_a}"));
        return if subdomain {
            DomainMatch::hit(MatchType::Subdomain, 85, norm_a, norm_b)
        } else {
            DomainMatch::hit(MatchType::MainDomain, 90, norm_a, norm_b)
        };
    }

    // Weak containment. Reported as a subdomain-grade hit with reduced
    // confidence so downstream consumers see a single "related host" bucket.
    if norm_a.contains(norm_b.as_str()) || norm_b.contains(norm_a.as_str()) {
        return DomainMatch::hit(MatchType::Subdomain, 75, norm_a, norm_b);
    }

    DomainMatch::miss(norm_a, norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_exact() {
        let m = match_domains("example.com", "example.com");
        assert!(m.matched);
        assert_eq!(m.match_type, MatchType::Exact);
        assert_eq!(m.confidence, 100);
    }

    #[test]
    fn www_prefix_normalizes_away() {
        let m = match_domains("www.example.com", "example.com");
        assert_eq!(m.match_type, MatchType::Normalized);
        assert_eq!(m.confidence, 95);
    }

    #[test]
    fn full_url_normalizes_to_host() {
        let m = match_domains("https://www.example.com/about", "example.com");
        assert_eq!(m.match_type, MatchType::Normalized);
        assert_eq!(m.confidence, 95);
        assert_eq!(m.normalized_a, "example.com");
    }

    #[test]
    fn plural_variant_matches_via_singularization() {
        let m = match_domains("companies.co", "company.co");
        assert_eq!(m.match_type, MatchType::Normalized);
        assert_eq!(m.confidence, 93);
    }

    #[test]
    fn subdomain_of_target_scores_85() {
        let m = match_domains("blog.example.com", "example.com");
        assert_eq!(m.match_type, MatchType::Subdomain);
        assert_eq!(m.confidence, 85);
    }

    #[test]
    fn sibling_subdomains_share_main_domain() {
        let m = match_domains("blog.example.com", "shop.example.com");
        assert_eq!(m.match_type, MatchType::MainDomain);
        assert_eq!(m.confidence, 90);
    }

    #[test]
    fn containment_without_label_boundary_scores_75() {
        let m = match_domains("myexample.net", "example.net");
        assert_eq!(m.match_type, MatchType::Subdomain);
        assert_eq!(m.confidence, 75);
    }

    #[test]
    fn unrelated_domains_do_not_match() {
        let m = match_domains("example.com", "other.org");
        assert!(!m.matched);
        assert_eq!(m.match_type, MatchType::None);
        assert_eq!(m.confidence, 0);
    }

    #[test]
    fn empty_input_is_never_a_match() {
        assert!(!match_domains("", "example.com").matched);
        assert!(!match_domains("example.com", "").matched);
        assert!(!match_domains("", "").matched);
    }

    #[test]
    fn matched_is_commutative() {
        let pairs = [
            ("blog.example.com", "example.com"),
            ("www.example.com", "example.com"),
            ("companies.co", "company.co"),
            ("example.com", "other.org"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                match_domains(a, b).matched,
                match_domains(b, a).matched,
                "commutativity broken for ({a}, {b})"
            );
        }
    }
}
