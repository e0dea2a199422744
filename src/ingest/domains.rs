// src/ingest/domains.rs
//! Allow-list of security news sites, sent to the search as `domains=`.
//!
//! NewsAPI matches subdomains on its own, so entries must be root domains:
//! `talosintelligence.com`, not `blog.talosintelligence.com`, `https://wired.com`
//! or `wired.com/security`.

use std::collections::HashSet;

use crate::error::DomainError;

const BUILTIN_DOMAINS: &[&str] = &[
    "thehackernews.com",
    "hackread.com",
    "talosintelligence.com",
    "bleepingcomputer.com",
    "cisa.gov",
    "csoonline.com",
    "threatpost.com",
    "krebsonsecurity.com",
    "wired.com",
    "zdnet.com",
    "virtualattacks.com",
];

// Second-level labels registered under a country code, as in `bbc.co.uk`.
const COUNTRY_SECOND_LEVEL: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org"];

/// Built-in allow-list of security news domains.
pub fn default_domains() -> Vec<String> {
    BUILTIN_DOMAINS.iter().map(|d| d.to_string()).collect()
}

/// Check one entry and return it lowercased.
pub fn root_domain(raw: &str) -> Result<String, DomainError> {
    let given = raw.trim();
    let d = given.to_ascii_lowercase();

    if d.contains("://") {
        return Err(DomainError::Scheme(given.to_string()));
    }
    if d.contains(['/', '?', '#', ':', '@']) {
        return Err(DomainError::Path(given.to_string()));
    }

    let labels: Vec<&str> = d.split('.').collect();
    if !labels.iter().all(|l| is_label(l)) {
        return Err(DomainError::Invalid(given.to_string()));
    }

    let root_labels = match labels.as_slice() {
        [.., sld, tld] if tld.len() == 2 && COUNTRY_SECOND_LEVEL.contains(sld) => 3,
        _ => 2,
    };
    if labels.len() < root_labels {
        return Err(DomainError::Invalid(given.to_string()));
    }
    if labels.len() > root_labels {
        return Err(DomainError::NotRoot {
            given: given.to_string(),
            root: labels[labels.len() - root_labels..].join("."),
        });
    }
    Ok(d)
}

fn is_label(l: &str) -> bool {
    !l.is_empty()
        && l.len() <= 63
        && !l.starts_with('-')
        && !l.ends_with('-')
        && l.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Validate every entry. Blank entries are skipped and repeats dropped; order is kept.
pub fn normalize_domains<I, S>(items: I) -> Result<Vec<String>, DomainError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if item.as_ref().trim().is_empty() {
            continue;
        }
        let d = root_domain(item.as_ref())?;
        if seen.insert(d.clone()) {
            out.push(d);
        }
    }
    Ok(out)
}

/// Comma separated form used by the `NEWS_DOMAINS` override.
pub fn parse_domain_list(s: &str) -> Result<Vec<String>, DomainError> {
    normalize_domains(s.split(','))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_list_is_valid_as_is() {
        let d = default_domains();
        assert_eq!(d.len(), 11);
        assert_eq!(normalize_domains(&d).unwrap(), d);
    }

    #[test]
    fn root_domains_are_lowercased() {
        assert_eq!(root_domain(" Wired.COM ").unwrap(), "wired.com");
        assert_eq!(root_domain("bbc.co.uk").unwrap(), "bbc.co.uk");
        assert_eq!(root_domain("cisa.gov").unwrap(), "cisa.gov");
    }

    #[test]
    fn subdomains_point_at_their_root() {
        assert_eq!(
            root_domain("blog.talosintelligence.com").unwrap_err(),
            DomainError::NotRoot {
                given: "blog.talosintelligence.com".into(),
                root: "talosintelligence.com".into(),
            }
        );
        assert!(matches!(
            root_domain("www.bbc.co.uk"),
            Err(DomainError::NotRoot { root, .. }) if root == "bbc.co.uk"
        ));
    }

    #[test]
    fn urls_are_not_domains() {
        assert!(matches!(root_domain("https://wired.com"), Err(DomainError::Scheme(_))));
        assert!(matches!(root_domain("wired.com/security"), Err(DomainError::Path(_))));
        assert!(matches!(root_domain("wired.com:443"), Err(DomainError::Path(_))));
    }

    #[test]
    fn malformed_names_are_rejected() {
        for bad in ["localhost", "co.uk", "wired..com", "-wired.com", "wi red.com", "wired.com."] {
            assert!(
                matches!(root_domain(bad), Err(DomainError::Invalid(_))),
                "{bad} should be invalid"
            );
        }
    }

    #[test]
    fn list_skips_blanks_and_keeps_first_order() {
        let v = parse_domain_list(" zdnet.com, ,Wired.com,zdnet.com,").unwrap();
        assert_eq!(v, vec!["zdnet.com".to_string(), "wired.com".to_string()]);
        assert!(parse_domain_list("").unwrap().is_empty());
        assert!(parse_domain_list("zdnet.com,news.zdnet.com").is_err());
    }
}
