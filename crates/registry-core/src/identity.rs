use std::fmt;

use url::Url;

/// Identifies a single plugin archive: a (registry, namespace, name,
/// version, os, arch) tuple. Any field may be `None`, meaning "matches
/// anything" — callers building a concrete lookup identity (e.g. from a
/// download URL) set only the fields they actually know.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PluginIdentity {
    pub registry_host: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
}

impl PluginIdentity {
    pub fn new(
        registry_host: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        os: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        PluginIdentity {
            registry_host: Some(registry_host.into()),
            namespace: Some(namespace.into()),
            name: Some(name.into()),
            version: Some(version.into()),
            os: Some(os.into()),
            arch: Some(arch.into()),
        }
    }

    /// A wildcard identity: every field is `None`.
    pub fn wildcard() -> Self {
        PluginIdentity::default()
    }

    /// Two identities match iff every non-`None` field on both sides is
    /// equal; `None` matches anything on the other side.
    pub fn matches(&self, other: &PluginIdentity) -> bool {
        field_matches(&self.registry_host, &other.registry_host)
            && field_matches(&self.namespace, &other.namespace)
            && field_matches(&self.name, &other.name)
            && field_matches(&self.version, &other.version)
            && field_matches(&self.os, &other.os)
            && field_matches(&self.arch, &other.arch)
    }
}

fn field_matches(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

impl fmt::Display for PluginIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            self.registry_host.as_deref().unwrap_or("*"),
            self.namespace.as_deref().unwrap_or("*"),
            self.name.as_deref().unwrap_or("*"),
            self.version.as_deref().unwrap_or("*"),
            self.os.as_deref().unwrap_or("*"),
            self.arch.as_deref().unwrap_or("*"),
        )
    }
}

/// An ordered, deduplicated set of absolute upstream URLs associated with a
/// plugin identity: `download_url`, `shasums_url`, `shasums_signature_url`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PluginLinks(Vec<Url>);

impl PluginLinks {
    pub fn new() -> Self {
        PluginLinks(Vec::new())
    }

    pub fn from_urls(urls: impl IntoIterator<Item = Url>) -> Self {
        let mut links = PluginLinks::new();
        for url in urls {
            links.insert(url);
        }
        links
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.0.iter()
    }

    /// Inserts `url` if not already present, preserving insertion order.
    pub fn insert(&mut self, url: Url) {
        if !self.0.contains(&url) {
            self.0.push(url);
        }
    }

    /// Unions `other` into `self`, preserving `self`'s existing order and
    /// appending any new URLs from `other` in their order.
    pub fn union(&mut self, other: &PluginLinks) {
        for url in &other.0 {
            self.insert(url.clone());
        }
    }

    /// True iff `self` and `other` share at least one URL.
    pub fn contains_any(&self, other: &PluginLinks) -> bool {
        self.0.iter().any(|u| other.0.contains(u))
    }

    /// True iff `url` is one of this set's links. Unlike `contains_any`,
    /// this never matches by virtue of either side being empty — it is a
    /// real membership test, used where a bare (link-less) in-flight lock
    /// must not be mistaken for carrying a specific URL.
    pub fn contains(&self, url: &Url) -> bool {
        self.0.contains(url)
    }

    /// Set difference: URLs in `self` that are not in `other`, order
    /// preserved.
    pub fn remove(&self, other: &PluginLinks) -> PluginLinks {
        PluginLinks(
            self.0
                .iter()
                .filter(|u| !other.0.contains(u))
                .cloned()
                .collect(),
        )
    }
}

/// A `PluginIdentity` plus the upstream URLs harvested for it. A record is
/// *live* for as long as the coordination service holds it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PluginRecord {
    pub identity: PluginIdentity,
    pub links: PluginLinks,
}

impl PluginRecord {
    pub fn new(identity: PluginIdentity) -> Self {
        PluginRecord {
            identity,
            links: PluginLinks::new(),
        }
    }

    pub fn with_links(identity: PluginIdentity, links: PluginLinks) -> Self {
        PluginRecord { identity, links }
    }

    /// Records match iff their identities match and, per the corrected
    /// overlap rule, either side's link set is empty or the sets intersect.
    pub fn matches(&self, other: &PluginRecord) -> bool {
        self.identity.matches(&other.identity)
            && (self.links.is_empty() || other.links.is_empty() || self.links.contains_any(&other.links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn wildcard_matches_any_concrete_identity() {
        let wildcard = PluginIdentity::wildcard();
        let concrete = PluginIdentity::new("registry.example", "hashicorp", "aws", "1.0.0", "linux", "amd64");
        assert!(wildcard.matches(&concrete));
        assert!(concrete.matches(&wildcard));
    }

    #[test]
    fn differing_concrete_fields_do_not_match() {
        let a = PluginIdentity::new("registry.example", "hashicorp", "aws", "1.0.0", "linux", "amd64");
        let b = PluginIdentity::new("registry.example", "hashicorp", "aws", "2.0.0", "linux", "amd64");
        assert!(!a.matches(&b));
    }

    #[test]
    fn partial_identity_matches_on_shared_fields_only() {
        let partial = PluginIdentity {
            registry_host: Some("registry.example".into()),
            namespace: Some("hashicorp".into()),
            name: Some("aws".into()),
            ..PluginIdentity::default()
        };
        let concrete = PluginIdentity::new("registry.example", "hashicorp", "aws", "1.0.0", "linux", "amd64");
        assert!(partial.matches(&concrete));
    }

    #[test]
    fn links_union_preserves_order_and_dedups() {
        let mut a = PluginLinks::from_urls([url("https://h/a"), url("https://h/b")]);
        let b = PluginLinks::from_urls([url("https://h/b"), url("https://h/c")]);
        a.union(&b);
        let urls: Vec<_> = a.iter().cloned().collect();
        assert_eq!(urls, vec![url("https://h/a"), url("https://h/b"), url("https://h/c")]);
    }

    #[test]
    fn links_remove_is_set_difference_order_preserved() {
        let a = PluginLinks::from_urls([url("https://h/a"), url("https://h/b"), url("https://h/c")]);
        let b = PluginLinks::from_urls([url("https://h/b")]);
        let diff = a.remove(&b);
        let urls: Vec<_> = diff.iter().cloned().collect();
        assert_eq!(urls, vec![url("https://h/a"), url("https://h/c")]);
    }

    #[test]
    fn record_with_empty_links_matches_any_link_set() {
        let bare = PluginRecord::new(PluginIdentity::new("r", "n", "p", "v", "os", "arch"));
        let with_links = PluginRecord::with_links(
            PluginIdentity::new("r", "n", "p", "v", "os", "arch"),
            PluginLinks::from_urls([url("https://h/a")]),
        );
        assert!(bare.matches(&with_links));
        assert!(with_links.matches(&bare));
    }

    #[test]
    fn records_with_disjoint_link_sets_do_not_match() {
        let a = PluginRecord::with_links(
            PluginIdentity::new("r", "n", "p", "v", "os", "arch"),
            PluginLinks::from_urls([url("https://h/a")]),
        );
        let b = PluginRecord::with_links(
            PluginIdentity::new("r", "n", "p", "v", "os", "arch"),
            PluginLinks::from_urls([url("https://h/b")]),
        );
        assert!(!a.matches(&b));
    }
}
