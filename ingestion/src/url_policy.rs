pub use newsloom_core::hashing::canonicalize_url;

/// Applied after canonicalization, before a `RawArticle` is fetched — skips URLs whose
/// host matches a configured denylist (ad-tracker redirectors, known paywalled domains
/// an operator has opted out of). Mirrors the teacher's `ContentPolicy::apply` shape:
/// a single pass over text/URL that either passes it through or rejects it.
pub trait UrlPolicy: Send + Sync {
    fn allows(&self, canonical_url: &str) -> bool;
}

pub struct NoOpUrlPolicy;

impl UrlPolicy for NoOpUrlPolicy {
    fn allows(&self, _canonical_url: &str) -> bool {
        true
    }
}

pub struct DenylistUrlPolicy {
    denied_hosts: Vec<String>,
}

impl DenylistUrlPolicy {
    pub fn new(denied_hosts: Vec<String>) -> Self {
        Self { denied_hosts }
    }
}

impl UrlPolicy for DenylistUrlPolicy {
    fn allows(&self, canonical_url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(canonical_url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        !self.denied_hosts.iter().any(|denied| host == denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylist_blocks_matching_host() {
        let policy = DenylistUrlPolicy::new(vec!["ads.example.com".to_string()]);
        assert!(!policy.allows("https://ads.example.com/x"));
        assert!(policy.allows("https://news.example.com/x"));
    }

    #[test]
    fn no_op_policy_always_allows() {
        assert!(NoOpUrlPolicy.allows("https://anything.example.com"));
    }
}
