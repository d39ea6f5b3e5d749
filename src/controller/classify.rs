use std::collections::HashSet;

use url::Url;

use crate::net::ResourceRequest;

/// Retrieval strategy for a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from cache, fetch and store on miss, with a navigation
    /// fallback to the cached root document when the network is down.
    CacheFirst,
    /// Serve the cached entry immediately and refresh it in the background.
    StaleWhileRevalidate,
    /// Favor freshness: fetch, store, and fall back to cache on failure.
    NetworkFirst,
}

/// Ordered classification table, built once from configuration and evaluated
/// per request. First matching rule wins.
///
/// Navigations classify as app-shell traffic even when the exact URL is not
/// in the manifest: a top-level document load is always shell material and
/// must get the offline root-document fallback.
pub struct ClassificationTable {
    rules: Vec<Rule>,
}

struct Rule {
    matcher: Matcher,
    strategy: Strategy,
}

enum Matcher {
    /// App-shell/static assets: exact manifest membership, or any navigation.
    AppShell(HashSet<String>),
    /// Tiled-imagery resources: request host equals a configured provider
    /// host or is a subdomain of one.
    TileHost(Vec<String>),
    /// Everything else.
    Any,
}

impl Matcher {
    fn matches(&self, request: &ResourceRequest) -> bool {
        match self {
            Matcher::AppShell(manifest) => {
                request.navigation || manifest.contains(&request.url)
            }
            Matcher::TileHost(patterns) => {
                let Some(host) = Url::parse(&request.url)
                    .ok()
                    .and_then(|url| url.host_str().map(str::to_string))
                else {
                    return false;
                };
                patterns
                    .iter()
                    .any(|pattern| host == *pattern || host.ends_with(&format!(".{pattern}")))
            }
            Matcher::Any => true,
        }
    }
}

impl ClassificationTable {
    pub fn new(app_shell: &[String], tile_hosts: &[String]) -> Self {
        Self {
            rules: vec![
                Rule {
                    matcher: Matcher::AppShell(app_shell.iter().cloned().collect()),
                    strategy: Strategy::CacheFirst,
                },
                Rule {
                    matcher: Matcher::TileHost(tile_hosts.to_vec()),
                    strategy: Strategy::StaleWhileRevalidate,
                },
                Rule {
                    matcher: Matcher::Any,
                    strategy: Strategy::NetworkFirst,
                },
            ],
        }
    }

    pub fn classify(&self, request: &ResourceRequest) -> Strategy {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| rule.strategy)
            // The trailing Any rule always matches.
            .unwrap_or(Strategy::NetworkFirst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClassificationTable {
        ClassificationTable::new(
            &[
                "https://app.test/index.html".to_string(),
                "https://cdn.test/lib/map.js".to_string(),
            ],
            &["tiles.example.org".to_string()],
        )
    }

    #[test]
    fn test_manifest_member_is_cache_first() {
        let table = table();
        let request = ResourceRequest::get("https://cdn.test/lib/map.js");
        assert_eq!(table.classify(&request), Strategy::CacheFirst);
    }

    #[test]
    fn test_navigation_is_cache_first_even_off_manifest() {
        let table = table();
        let request = ResourceRequest::navigation("https://app.test/deep/link");
        assert_eq!(table.classify(&request), Strategy::CacheFirst);
    }

    #[test]
    fn test_tile_host_and_subdomains_are_stale_while_revalidate() {
        let table = table();

        let direct = ResourceRequest::get("https://tiles.example.org/3/4/2.png");
        assert_eq!(table.classify(&direct), Strategy::StaleWhileRevalidate);

        let subdomain = ResourceRequest::get("https://b.tiles.example.org/3/4/2.png");
        assert_eq!(table.classify(&subdomain), Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // A manifest entry hosted on the tile domain stays cache-first.
        let table = ClassificationTable::new(
            &["https://tiles.example.org/viewer.js".to_string()],
            &["tiles.example.org".to_string()],
        );
        let request = ResourceRequest::get("https://tiles.example.org/viewer.js");
        assert_eq!(table.classify(&request), Strategy::CacheFirst);
    }

    #[test]
    fn test_everything_else_is_network_first() {
        let table = table();
        let request = ResourceRequest::get("https://api.elsewhere.test/geocode?q=x");
        assert_eq!(table.classify(&request), Strategy::NetworkFirst);
    }

    #[test]
    fn test_unparseable_url_falls_through() {
        let table = table();
        let request = ResourceRequest::get("not a url");
        assert_eq!(table.classify(&request), Strategy::NetworkFirst);
    }
}
