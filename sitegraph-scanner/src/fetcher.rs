use crate::entry::SitemapEntry;
use crate::error::{Result, ScanError};
use crate::parser::{SitemapDocument, parse_document};
use futures::future::{BoxFuture, FutureExt, join_all};
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_SITEMAPS: usize = 50;
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "sitegraph/0.1 (+https://github.com/trapdoorsec/sitegraph)";

/// Well-known locations tried by [`SitemapFetcher::discover`] after robots.txt.
const FALLBACK_SITEMAP_PATHS: [&str; 2] = ["/sitemap.xml", "/sitemap_index.xml"];

/// Sub-sitemaps claimed so far by one walk. Each `fetch`/`walk_document`
/// call owns its own, so concurrent walks on a shared fetcher never touch
/// each other's budget.
#[derive(Debug, Default)]
struct WalkState {
    processed: AtomicUsize,
}

/// Fetches sitemap documents and expands sitemap indexes into a flat list
/// of [`SitemapEntry`] records.
///
/// Index recursion is bounded three ways: nesting depth, the total number
/// of sub-sitemaps processed over one walk, and the number of requests in
/// flight at once (one batch).
pub struct SitemapFetcher {
    client: Client,
    max_depth: usize,
    max_sitemaps: usize,
    batch_size: usize,
    progress_callback: Option<ProgressCallback>,
}

impl SitemapFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Self::with_client_settings(timeout_secs, DEFAULT_USER_AGENT)
    }

    pub fn with_client_settings(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2).max(1)))
            .pool_max_idle_per_host(DEFAULT_BATCH_SIZE)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self::with_client(client))
    }

    /// Use a pre-built client, e.g. one shared with other parts of the app.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_depth: DEFAULT_MAX_DEPTH,
            max_sitemaps: DEFAULT_MAX_SITEMAPS,
            batch_size: DEFAULT_BATCH_SIZE,
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_sitemaps(mut self, max_sitemaps: usize) -> Self {
        self.max_sitemaps = max_sitemaps;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Called with (entries collected so far from that document, source url)
    /// whenever a document has been fetched and parsed.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Fetch the sitemap at `sitemap_url` and expand it fully.
    ///
    /// A failure to fetch the root document is an error; failures below it
    /// only shrink the result.
    pub async fn fetch(&self, sitemap_url: &str) -> Result<Vec<SitemapEntry>> {
        info!("Fetching sitemap {}", sitemap_url);
        Url::parse(sitemap_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", sitemap_url, e)))?;

        let xml = self.fetch_text(sitemap_url).await?;
        let walk = WalkState::default();
        let entries = self.walk(&xml, 0, sitemap_url, &walk).await;

        info!(
            "Sitemap walk complete: {} entries from {}",
            entries.len(),
            sitemap_url
        );
        Ok(entries)
    }

    /// Expand an already-loaded document (e.g. a local file). Index entries
    /// are still fetched over HTTP.
    pub async fn walk_document(&self, xml: &str, source_name: &str) -> Vec<SitemapEntry> {
        let walk = WalkState::default();
        self.walk(xml, 0, source_name, &walk).await
    }

    /// Parse one sitemap document. A urlset is returned directly; an index
    /// has its sub-sitemaps fetched in batches and parsed at `depth + 1`.
    /// The sub-sitemap budget starts fresh for this call.
    pub fn parse_sitemap<'a>(
        &'a self,
        xml: &'a str,
        depth: usize,
        source_name: &'a str,
    ) -> BoxFuture<'a, Vec<SitemapEntry>> {
        async move {
            let walk = WalkState::default();
            self.walk(xml, depth, source_name, &walk).await
        }
        .boxed()
    }

    fn walk<'a>(
        &'a self,
        xml: &'a str,
        depth: usize,
        source_name: &'a str,
        state: &'a WalkState,
    ) -> BoxFuture<'a, Vec<SitemapEntry>> {
        async move {
            match parse_document(xml, source_name) {
                SitemapDocument::UrlSet(entries) => {
                    debug!("{}: {} url entries", source_name, entries.len());
                    if let Some(ref callback) = self.progress_callback {
                        callback(entries.len(), source_name.to_string());
                    }
                    entries
                }
                SitemapDocument::Index(locations) => {
                    self.expand_index(locations, depth, source_name, state).await
                }
                SitemapDocument::Unrecognized => {
                    debug!("{} is neither a urlset nor a sitemap index", source_name);
                    Vec::new()
                }
            }
        }
        .boxed()
    }

    async fn expand_index(
        &self,
        locations: Vec<String>,
        depth: usize,
        source_name: &str,
        state: &WalkState,
    ) -> Vec<SitemapEntry> {
        if depth >= self.max_depth {
            debug!(
                "Not expanding index {} at depth {} (limit {})",
                source_name, depth, self.max_depth
            );
            return Vec::new();
        }

        debug!(
            "{}: sitemap index with {} children at depth {}",
            source_name,
            locations.len(),
            depth
        );

        let mut collected = Vec::new();
        let mut remaining = locations.into_iter();

        loop {
            let batch = self.claim_batch(state, &mut remaining);
            if batch.is_empty() {
                break;
            }

            let fetches = batch.iter().map(|location| async move {
                match self.fetch_text(location).await {
                    Ok(xml) => self.walk(&xml, depth + 1, location, state).await,
                    Err(e) => {
                        warn!("Skipping sub-sitemap {}: {}", location, e);
                        Vec::new()
                    }
                }
            });

            for entries in join_all(fetches).await {
                collected.extend(entries);
            }
        }

        if remaining.next().is_some() {
            debug!(
                "Sub-sitemap budget of {} exhausted, truncating {}",
                self.max_sitemaps, source_name
            );
        }

        collected
    }

    /// Take up to one batch of locations, charging each against the
    /// walk-wide sub-sitemap budget.
    fn claim_batch(
        &self,
        state: &WalkState,
        remaining: &mut impl Iterator<Item = String>,
    ) -> Vec<String> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            let claimed = state
                .processed
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < self.max_sitemaps).then_some(n + 1)
                })
                .is_ok();
            if !claimed {
                break;
            }
            match remaining.next() {
                Some(location) => batch.push(location),
                None => {
                    state.processed.fetch_sub(1, Ordering::SeqCst);
                    break;
                }
            }
        }
        batch
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("{} -> {} bytes in {:?}", url, body.len(), start.elapsed());
        Ok(body)
    }

    /// Find the sitemap of a site: `Sitemap:` lines in robots.txt first,
    /// then the conventional locations.
    pub async fn discover(&self, site_url: &str) -> Result<String> {
        let base = Url::parse(site_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", site_url, e)))?;

        let mut candidates = Vec::new();

        if let Ok(robots_url) = base.join("/robots.txt") {
            match self.fetch_text(robots_url.as_str()).await {
                Ok(robots) => candidates.extend(sitemaps_from_robots(&robots)),
                Err(e) => debug!("No robots.txt at {}: {}", robots_url, e),
            }
        }

        for path in FALLBACK_SITEMAP_PATHS {
            if let Ok(candidate) = base.join(path) {
                candidates.push(candidate.to_string());
            }
        }

        for candidate in candidates {
            match self.client.get(&candidate).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("Discovered sitemap {}", candidate);
                    return Ok(candidate);
                }
                Ok(response) => debug!("{} -> HTTP {}", candidate, response.status()),
                Err(e) => debug!("{} -> {}", candidate, e),
            }
        }

        Err(ScanError::NotFound(site_url.to_string()))
    }
}

/// Extract `Sitemap:` directives from a robots.txt body. The directive name
/// is case-insensitive.
pub fn sitemaps_from_robots(robots: &str) -> Vec<String> {
    robots
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("sitemap") {
                let value = value.trim();
                Url::parse(value).ok().map(|_| value.to_string())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn urlset_xml(base: &str, prefix: &str, count: usize) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
        );
        for i in 0..count {
            xml.push_str(&format!("<url><loc>{}/{}/{}</loc></url>", base, prefix, i));
        }
        xml.push_str("</urlset>");
        xml
    }

    fn index_xml(locations: &[String]) -> String {
        let mut xml = String::from(r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
        for loc in locations {
            xml.push_str(&format!("<sitemap><loc>{}</loc></sitemap>", loc));
        }
        xml.push_str("</sitemapindex>");
        xml
    }

    async fn mount_xml(server: &MockServer, at: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    /// Index of three sitemaps with 2, 3 and 4 urls
    async fn three_part_site(server: &MockServer, fail_largest: bool) {
        let base = server.uri();
        let children: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|name| format!("{}/sitemap-{}.xml", base, name))
            .collect();

        mount_xml(server, "/sitemap.xml", 200, index_xml(&children)).await;
        mount_xml(server, "/sitemap-a.xml", 200, urlset_xml(&base, "a", 2)).await;
        mount_xml(server, "/sitemap-b.xml", 200, urlset_xml(&base, "b", 3)).await;
        if fail_largest {
            mount_xml(server, "/sitemap-c.xml", 500, String::from("boom")).await;
        } else {
            mount_xml(server, "/sitemap-c.xml", 200, urlset_xml(&base, "c", 4)).await;
        }
    }

    #[tokio::test]
    async fn test_plain_urlset() {
        let server = MockServer::start().await;
        mount_xml(&server, "/sitemap.xml", 200, urlset_xml(&server.uri(), "p", 4)).await;

        let fetcher = SitemapFetcher::new().unwrap();
        let sitemap_url = format!("{}/sitemap.xml", server.uri());
        let entries = fetcher.fetch(&sitemap_url).await.unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].url, format!("{}/p/0", server.uri()));
        assert_eq!(entries[3].url, format!("{}/p/3", server.uri()));
        assert!(entries.iter().all(|e| e.source_file == sitemap_url));
    }

    #[tokio::test]
    async fn test_index_recursion_merges_children() {
        let server = MockServer::start().await;
        three_part_site(&server, false).await;

        let fetcher = SitemapFetcher::new().unwrap();
        let entries = fetcher
            .fetch(&format!("{}/sitemap.xml", server.uri()))
            .await
            .unwrap();

        assert_eq!(entries.len(), 9);
        let from_c = entries
            .iter()
            .filter(|e| e.source_file.ends_with("sitemap-c.xml"))
            .count();
        assert_eq!(from_c, 4);
    }

    #[tokio::test]
    async fn test_failing_child_is_skipped() {
        let server = MockServer::start().await;
        three_part_site(&server, true).await;

        let fetcher = SitemapFetcher::new().unwrap();
        let entries = fetcher
            .fetch(&format!("{}/sitemap.xml", server.uri()))
            .await
            .unwrap();

        assert_eq!(entries.len(), 5);
    }

    #[tokio::test]
    async fn test_unreachable_child_is_skipped() {
        let server = MockServer::start().await;
        let base = server.uri();
        let children = vec![
            format!("{}/sitemap-a.xml", base),
            "http://127.0.0.1:1/unreachable.xml".to_string(),
        ];
        mount_xml(&server, "/sitemap.xml", 200, index_xml(&children)).await;
        mount_xml(&server, "/sitemap-a.xml", 200, urlset_xml(&base, "a", 2)).await;

        let fetcher = SitemapFetcher::with_timeout(2).unwrap();
        let entries = fetcher.fetch(&format!("{}/sitemap.xml", base)).await.unwrap();

        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_root_failure_is_an_error() {
        let server = MockServer::start().await;
        mount_xml(&server, "/sitemap.xml", 404, String::new()).await;

        let fetcher = SitemapFetcher::new().unwrap();
        let result = fetcher.fetch(&format!("{}/sitemap.xml", server.uri())).await;

        assert!(matches!(
            result,
            Err(ScanError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_depth_limit_stops_nested_indexes() {
        let server = MockServer::start().await;
        let base = server.uri();

        // index -> level1 index -> level2 index -> urlset
        mount_xml(&server, "/sitemap.xml", 200, index_xml(&[format!("{}/level1.xml", base)])).await;
        mount_xml(&server, "/level1.xml", 200, index_xml(&[format!("{}/level2.xml", base)])).await;
        mount_xml(&server, "/level2.xml", 200, index_xml(&[format!("{}/leaf.xml", base)])).await;
        mount_xml(&server, "/leaf.xml", 200, urlset_xml(&base, "leaf", 3)).await;

        let fetcher = SitemapFetcher::new().unwrap();
        let deep = fetcher.fetch(&format!("{}/sitemap.xml", base)).await.unwrap();
        assert_eq!(deep.len(), 3);

        let shallow = SitemapFetcher::new()
            .unwrap()
            .with_max_depth(2)
            .fetch(&format!("{}/sitemap.xml", base))
            .await
            .unwrap();
        assert!(shallow.is_empty());
    }

    #[tokio::test]
    async fn test_sub_sitemap_budget() {
        let server = MockServer::start().await;
        let base = server.uri();

        let children: Vec<String> = (0..12).map(|i| format!("{}/part-{}.xml", base, i)).collect();
        mount_xml(&server, "/sitemap.xml", 200, index_xml(&children)).await;
        for i in 0..12 {
            mount_xml(
                &server,
                &format!("/part-{}.xml", i),
                200,
                urlset_xml(&base, &format!("part{}", i), 1),
            )
            .await;
        }

        let fetcher = SitemapFetcher::new().unwrap().with_max_sitemaps(7);
        let entries = fetcher.fetch(&format!("{}/sitemap.xml", base)).await.unwrap();
        assert_eq!(entries.len(), 7);

        // Budget resets per walk
        let again = fetcher.fetch(&format!("{}/sitemap.xml", base)).await.unwrap();
        assert_eq!(again.len(), 7);
    }

    #[tokio::test]
    async fn test_concurrent_walks_have_separate_budgets() {
        let server = MockServer::start().await;
        let base = server.uri();

        let children: Vec<String> = (0..12).map(|i| format!("{}/part-{}.xml", base, i)).collect();
        mount_xml(&server, "/sitemap.xml", 200, index_xml(&children)).await;
        for i in 0..12 {
            mount_xml(
                &server,
                &format!("/part-{}.xml", i),
                200,
                urlset_xml(&base, &format!("part{}", i), 1),
            )
            .await;
        }

        let fetcher = SitemapFetcher::new().unwrap().with_max_sitemaps(7);
        let url = format!("{}/sitemap.xml", base);
        let (first, second) = tokio::join!(fetcher.fetch(&url), fetcher.fetch(&url));

        assert_eq!(first.unwrap().len(), 7);
        assert_eq!(second.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_batches_preserve_index_order() {
        let server = MockServer::start().await;
        let base = server.uri();

        let children: Vec<String> = (0..8).map(|i| format!("{}/part-{}.xml", base, i)).collect();
        mount_xml(&server, "/sitemap.xml", 200, index_xml(&children)).await;
        for i in 0..8 {
            mount_xml(
                &server,
                &format!("/part-{}.xml", i),
                200,
                urlset_xml(&base, &format!("part{}", i), 1),
            )
            .await;
        }

        let fetcher = SitemapFetcher::new().unwrap().with_batch_size(3);
        let entries = fetcher.fetch(&format!("{}/sitemap.xml", base)).await.unwrap();
        let urls: Vec<String> = entries.into_iter().map(|e| e.url).collect();
        let expected: Vec<String> = (0..8).map(|i| format!("{}/part{}/0", base, i)).collect();
        assert_eq!(urls, expected);
    }

    #[tokio::test]
    async fn test_unrecognized_root_is_empty() {
        let server = MockServer::start().await;
        mount_xml(&server, "/sitemap.xml", 200, "<html>nope</html>".to_string()).await;

        let fetcher = SitemapFetcher::new().unwrap();
        let entries = fetcher.fetch(&format!("{}/sitemap.xml", server.uri())).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_discover_prefers_robots() {
        let server = MockServer::start().await;
        let base = server.uri();
        let robots = format!("User-agent: *\nDisallow: /private\nSitemap: {}/custom-map.xml\n", base);

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(robots))
            .mount(&server)
            .await;
        mount_xml(&server, "/custom-map.xml", 200, urlset_xml(&base, "x", 1)).await;
        mount_xml(&server, "/sitemap.xml", 200, urlset_xml(&base, "y", 1)).await;

        let fetcher = SitemapFetcher::new().unwrap();
        let found = fetcher.discover(&base).await.unwrap();
        assert_eq!(found, format!("{}/custom-map.xml", base));
    }

    #[tokio::test]
    async fn test_discover_falls_back_to_conventional_paths() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount_xml(&server, "/sitemap_index.xml", 200, index_xml(&[])).await;

        let fetcher = SitemapFetcher::new().unwrap();
        let found = fetcher.discover(&base).await.unwrap();
        assert_eq!(found, format!("{}/sitemap_index.xml", base));

        let empty = MockServer::start().await;
        let missing = fetcher.discover(&empty.uri()).await;
        assert!(matches!(missing, Err(ScanError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_walk_local_index_fetches_children() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount_xml(&server, "/sitemap-a.xml", 200, urlset_xml(&base, "a", 2)).await;
        mount_xml(&server, "/sitemap-b.xml", 200, urlset_xml(&base, "b", 3)).await;

        let local = index_xml(&[
            format!("{}/sitemap-a.xml", base),
            format!("{}/sitemap-b.xml", base),
        ]);
        let fetcher = SitemapFetcher::new().unwrap().with_max_sitemaps(2);

        let first = fetcher.walk_document(&local, "sitemap.xml").await;
        assert_eq!(first.len(), 5);
        // budget is per walk
        let second = fetcher.walk_document(&local, "sitemap.xml").await;
        assert_eq!(second.len(), 5);
    }

    #[test]
    fn test_sitemaps_from_robots() {
        let robots = "User-agent: *\nsitemap: https://example.com/a.xml\nSITEMAP:https://example.com/b.xml\nSitemap: not a url\nAllow: /";
        assert_eq!(
            sitemaps_from_robots(robots),
            vec![
                "https://example.com/a.xml".to_string(),
                "https://example.com/b.xml".to_string()
            ]
        );
    }
}
