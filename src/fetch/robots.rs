// src/fetch/robots.rs
// =============================================================================
// robots.txt fetching, parsing and per-origin caching.
//
// Supported rules:
// - User-agent groups: the group naming our crawler wins, else the `*` group
// - Allow / Disallow path prefixes, longest match wins, ties go to Allow
//
// Each origin's robots.txt is fetched at most once per crawl session. The
// cache hands out one OnceCell per origin: whichever worker gets there first
// does the fetch, everyone else awaits the same cell.
// =============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};
use url::Url;

/// Parsed rules for one origin and one user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    // (path prefix, allowed?)
    rules: Vec<(String, bool)>,
}

impl RobotsRules {
    pub fn allow_all() -> Self {
        Self::default()
    }

    // Parses a robots.txt body, keeping only the group that applies to
    // `user_agent`.
    pub fn parse(body: &str, user_agent: &str) -> Self {
        let agent = product_token(user_agent);
        let mut specific: Vec<(String, bool)> = Vec::new();
        let mut wildcard: Vec<(String, bool)> = Vec::new();
        let mut found_specific = false;

        // Agents named by the current group, and whether we are still reading
        // consecutive User-agent lines (a group may list several agents).
        let mut group_agents: Vec<String> = Vec::new();
        let mut reading_agents = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if !reading_agents {
                        group_agents.clear();
                    }
                    group_agents.push(value.to_ascii_lowercase());
                    reading_agents = true;
                }
                "allow" | "disallow" => {
                    reading_agents = false;
                    if value.is_empty() {
                        // "Disallow:" with no path allows everything.
                        continue;
                    }
                    let rule = (normalize_rule_path(value), field == "allow");
                    let names_us = group_agents
                        .iter()
                        .any(|a| a != "*" && !agent.is_empty() && agent.contains(a.as_str()));
                    if names_us {
                        found_specific = true;
                        specific.push(rule);
                    } else if group_agents.iter().any(|a| a == "*") {
                        wildcard.push(rule);
                    }
                }
                _ => reading_agents = false,
            }
        }

        let mut rules = if found_specific { specific } else { wildcard };
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(b.1.cmp(&a.1)));
        Self { rules }
    }

    // Checks a path (with its query string, if any) against the rules.
    pub fn is_allowed(&self, path: &str) -> bool {
        self.rules
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map_or(true, |(_, allowed)| *allowed)
    }
}

// "Mozilla/5.0 site-mirror/0.1" style strings: the first token before '/'
// is what robots.txt groups name.
fn product_token(user_agent: &str) -> String {
    user_agent
        .split_whitespace()
        .next()
        .unwrap_or("")
        .split('/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn normalize_rule_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

// "https://example.com:8443" - the key robots.txt is cached under.
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Per-session robots.txt cache.
#[derive(Debug, Default)]
pub struct RobotsCache {
    origins: Mutex<HashMap<String, Arc<OnceCell<RobotsRules>>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Returns true when `url` may be fetched. Fetches robots.txt for the
    // url's origin on first use.
    #[instrument(skip(self, client, user_agent), fields(url = %url))]
    pub async fn is_allowed(&self, client: &Client, url: &Url, user_agent: &str) -> bool {
        let Some(origin) = origin_of(url) else {
            return true;
        };

        let cell = {
            let mut origins = self
                .origins
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            origins.entry(origin.clone()).or_default().clone()
        };

        let rules = cell
            .get_or_init(|| fetch_rules(client, &origin, user_agent))
            .await;

        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let allowed = rules.is_allowed(&path);
        if !allowed {
            debug!(path = %path, origin = %origin, "robots.txt disallows path");
        }
        allowed
    }

    pub fn cached_origins(&self) -> usize {
        self.origins
            .lock()
            .map(|origins| origins.len())
            .unwrap_or(0)
    }
}

// A robots.txt we cannot read (404, 5xx, network error) places no limits.
async fn fetch_rules(client: &Client, origin: &str, user_agent: &str) -> RobotsRules {
    let robots_url = format!("{}/robots.txt", origin);
    debug!(url = %robots_url, "fetching robots.txt");

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(url = %robots_url, error = %e, "robots.txt unreachable, allowing all");
            return RobotsRules::allow_all();
        }
    };

    if !response.status().is_success() {
        return RobotsRules::allow_all();
    }

    match response.text().await {
        Ok(body) => RobotsRules::parse(&body, user_agent),
        Err(_) => RobotsRules::allow_all(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_empty_body_allows_everything() {
        let rules = RobotsRules::parse("", "site-mirror/0.1");
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn test_wildcard_group_disallow() {
        let rules = RobotsRules::parse(
            "User-agent: *\nDisallow: /private/\nDisallow: /tmp\n",
            "site-mirror/0.1",
        );
        assert!(!rules.is_allowed("/private/page"));
        assert!(!rules.is_allowed("/tmp"));
        assert!(rules.is_allowed("/public"));
    }

    #[test]
    fn test_specific_group_overrides_wildcard() {
        let body = "User-agent: *\nDisallow: /\n\nUser-agent: site-mirror\nDisallow: /admin\n";
        let rules = RobotsRules::parse(body, "site-mirror/0.1");
        assert!(rules.is_allowed("/docs"));
        assert!(!rules.is_allowed("/admin/users"));
    }

    #[test]
    fn test_other_agents_group_ignored() {
        let rules = RobotsRules::parse("User-agent: Googlebot\nDisallow: /\n", "site-mirror/0.1");
        assert!(rules.is_allowed("/"));
    }

    #[test]
    fn test_longest_match_and_allow() {
        let body = "User-agent: *\nDisallow: /docs/\nAllow: /docs/public/\n";
        let rules = RobotsRules::parse(body, "site-mirror/0.1");
        assert!(!rules.is_allowed("/docs/internal"));
        assert!(rules.is_allowed("/docs/public/intro"));
    }

    #[test]
    fn test_grouped_user_agents_and_comments() {
        let body = "# comment\nUser-agent: foo\nUser-agent: *\nDisallow: /x # trailing\n";
        let rules = RobotsRules::parse(body, "site-mirror/0.1");
        assert!(!rules.is_allowed("/x/y"));
    }

    #[test]
    fn test_empty_disallow_allows_all() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n", "site-mirror/0.1");
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn test_origin_of() {
        let url = Url::parse("http://localhost:8080/a/b").unwrap();
        assert_eq!(origin_of(&url).as_deref(), Some("http://localhost:8080"));
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(origin_of(&url).as_deref(), Some("https://example.com"));
    }

    #[tokio::test]
    async fn test_robots_fetched_once_per_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /secret\n"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::new();
        let client = Client::new();
        let allowed = Url::parse(&format!("{}/open", server.uri())).unwrap();
        let denied = Url::parse(&format!("{}/secret/file", server.uri())).unwrap();

        let (a, b) = tokio::join!(
            cache.is_allowed(&client, &allowed, "site-mirror/0.1"),
            cache.is_allowed(&client, &denied, "site-mirror/0.1"),
        );
        assert!(a);
        assert!(!b);
        assert!(cache.is_allowed(&client, &allowed, "site-mirror/0.1").await);
        assert_eq!(cache.cached_origins(), 1);
    }
}
