//! Integration tests for the archiver
//!
//! These tests use wiremock to serve small sites and run full archive
//! cycles into temporary data directories.

use snapkeep::config::{Config, OutputConfig};
use snapkeep::crawler::{
    ArchiveRequest, CrawlEngine, CrawlProgress, NoThrottle, NoopReporter, ProgressReporter,
    SiteArchiver,
};
use snapkeep::{JobRegistry, JobStatus};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates an engine writing under `data_dir` with pacing disabled
fn create_test_engine(data_dir: &Path) -> CrawlEngine {
    let config = Config {
        output: OutputConfig {
            data_dir: data_dir.display().to_string(),
        },
        ..Config::default()
    };
    CrawlEngine::new(&config)
        .expect("engine should build from default config")
        .with_throttle(|| Box::new(NoThrottle))
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>Test</title></head><body>{}</body></html>",
            body
        ),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn mount_bytes(server: &MockServer, route: &str, body: &[u8], content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), content_type))
        .mount(server)
        .await;
}

fn request(server: &MockServer, route: &str, max_pages: u32) -> ArchiveRequest {
    let seed = Url::parse(&format!("{}{}", server.uri(), route)).unwrap();
    ArchiveRequest::new(seed, max_pages).unwrap()
}

/// Records the page URL each time a new page starts
#[derive(Default)]
struct PageOrderRecorder {
    pages: Mutex<Vec<String>>,
}

impl ProgressReporter for PageOrderRecorder {
    fn report(&self, progress: &CrawlProgress) {
        if let Some(url) = &progress.current_page_url {
            let mut pages = self.pages.lock().unwrap();
            if pages.last() != Some(url) {
                pages.push(url.clone());
            }
        }
    }
}

#[tokio::test]
async fn test_single_page_archive() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<p>Hello</p>").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 5), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.hostname, "127.0.0.1");
    assert_eq!(summary.page_count, 1);
    assert_eq!(summary.asset_count, 0);

    let index = summary.snapshot_root.join("index.html");
    assert!(index.is_file());
    assert!(std::fs::read_to_string(index).unwrap().contains("Hello"));
    assert!(summary.snapshot_root.join("assets").is_dir());
    assert!(summary
        .snapshot_root
        .starts_with(tmp.path().join("127.0.0.1")));

    let history = engine.metadata().list("127.0.0.1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].snapshot_id, summary.snapshot_id);
    assert_eq!(history[0].page_count, 1);
    assert_eq!(history[0].source_url, format!("{}/", server.uri()));
}

#[tokio::test]
async fn test_links_deduplicated_after_normalization() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r##"<a href="/a">A</a><a href="/a/">A again</a><a href="/a#top">A top</a>
            <a href="/b">B</a><a href="c">C</a><a href="/">Home</a>"##,
    )
    .await;
    for route in ["/a", "/b", "/c"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html("<p>leaf</p>"))
            .expect(1)
            .mount(&server)
            .await;
    }

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 10), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.page_count, 4);
    for file in ["index.html", "a.html", "b.html", "c.html"] {
        assert!(summary.snapshot_root.join(file).is_file(), "missing {file}");
    }
}

#[tokio::test]
async fn test_assets_downloaded_and_rewritten() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<link rel="stylesheet" href="/css/site.css">
           <script src="/js/app.js"></script>
           <img src="/img/logo.png">
           <img src="/img/logo.png">
           <img src="clip.mp4">"#,
    )
    .await;
    mount_bytes(&server, "/css/site.css", b"body{}", "text/css").await;
    mount_bytes(&server, "/js/app.js", b"run()", "application/javascript").await;
    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clip.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 5), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.asset_count, 3);

    let assets = summary.snapshot_root.join("assets");
    assert_eq!(std::fs::read(assets.join("site.css")).unwrap(), b"body{}");
    assert_eq!(std::fs::read(assets.join("app.js")).unwrap(), b"run()");
    assert_eq!(std::fs::read(assets.join("logo.png")).unwrap(), b"PNG");
    assert!(!assets.join("clip.mp4").exists());

    let saved = std::fs::read_to_string(summary.snapshot_root.join("index.html")).unwrap();
    assert!(saved.contains(r#"href="./assets/site.css""#));
    assert!(saved.contains(r#"src="./assets/app.js""#));
    assert_eq!(saved.matches(r#"src="./assets/logo.png""#).count(), 2);
    assert!(saved.contains(r#"src="clip.mp4""#));
}

#[tokio::test]
async fn test_page_budget_of_one_stops_recursion() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    for route in ["/a", "/b"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html("<p>leaf</p>"))
            .expect(0)
            .mount(&server)
            .await;
    }

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 1), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.page_count, 1);
    assert!(summary.snapshot_root.join("index.html").is_file());
    assert!(!summary.snapshot_root.join("a.html").exists());
}

#[tokio::test]
async fn test_budget_caps_deep_site() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/p1">1</a>"#).await;
    for i in 1..10 {
        mount_page(
            &server,
            &format!("/p{}", i),
            &format!(r#"<a href="/p{}">next</a>"#, i + 1),
        )
        .await;
    }

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 3), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.page_count, 3);
    assert!(summary.snapshot_root.join("p2.html").is_file());
    assert!(!summary.snapshot_root.join("p3.html").exists());
}

#[tokio::test]
async fn test_pages_visited_depth_first_in_document_order() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    mount_page(&server, "/a", r#"<a href="/a/child">Child</a><a href="/b">B</a>"#).await;
    mount_page(&server, "/a/child", "<p>deep</p>").await;
    mount_page(&server, "/b", "<p>b</p>").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());
    let recorder = Arc::new(PageOrderRecorder::default());

    let summary = engine
        .archive(request(&server, "/", 10), recorder.clone())
        .await
        .unwrap();

    let base = server.uri();
    let pages = recorder.pages.lock().unwrap().clone();
    assert_eq!(
        pages,
        vec![
            format!("{}/", base),
            format!("{}/a", base),
            format!("{}/a/child", base),
            format!("{}/b", base),
        ]
    );
    assert_eq!(summary.page_count, 4);
    assert!(summary.snapshot_root.join("a/child.html").is_file());
}

#[tokio::test]
async fn test_nested_page_assets_use_relative_paths() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/docs/intro">Intro</a>"#).await;
    mount_page(&server, "/docs/intro", r#"<img src="/img/diagram.png">"#).await;
    mount_bytes(&server, "/img/diagram.png", b"PNG", "image/png").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 5), Arc::new(NoopReporter))
        .await
        .unwrap();

    let nested = std::fs::read_to_string(summary.snapshot_root.join("docs/intro.html")).unwrap();
    assert!(nested.contains(r#"src="../assets/diagram.png""#));
    assert!(summary.snapshot_root.join("assets/diagram.png").is_file());
}

#[tokio::test]
async fn test_failed_page_does_not_abort_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/broken">Broken</a><a href="/ok">OK</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "/ok", "<p>fine</p>").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 10), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.page_count, 3);
    assert!(!summary.snapshot_root.join("broken.html").exists());
    assert!(summary.snapshot_root.join("ok.html").is_file());
}

#[tokio::test]
async fn test_failed_asset_keeps_original_reference() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<img src="/missing.png"><img src="/ok.png">"#).await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_bytes(&server, "/ok.png", b"PNG", "image/png").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 5), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.asset_count, 1);
    let saved = std::fs::read_to_string(summary.snapshot_root.join("index.html")).unwrap();
    assert!(saved.contains(r#"src="/missing.png""#));
    assert!(saved.contains(r#"src="./assets/ok.png""#));
}

#[tokio::test]
async fn test_other_hosts_not_followed() {
    let server = MockServer::start().await;
    let port = Url::parse(&server.uri()).unwrap().port().unwrap();
    // Same server, different hostname
    mount_page(
        &server,
        "/",
        &format!(r#"<a href="http://localhost:{}/elsewhere">Elsewhere</a>"#, port),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(html("<p>no</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 10), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.page_count, 1);
}

#[tokio::test]
async fn test_only_seed_saved_as_root_index() {
    let server = MockServer::start().await;
    mount_page(&server, "/start", r#"<p>seed</p><a href="/">Home</a>"#).await;
    mount_page(&server, "/", "<p>home</p>").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/start", 5), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.page_count, 2);
    let index = std::fs::read_to_string(summary.snapshot_root.join("index.html")).unwrap();
    assert!(index.contains("seed"));

    let html_files: Vec<String> = std::fs::read_dir(&summary.snapshot_root)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".html"))
        .collect();
    assert_eq!(html_files.len(), 2);
    assert!(html_files
        .iter()
        .any(|name| name.starts_with("index-") && name != "index.html"));
}

#[tokio::test]
async fn test_registry_runs_engine_to_completion() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/about">About</a><img src="/logo.png">"#).await;
    mount_page(&server, "/about", "<p>about</p>").await;
    mount_bytes(&server, "/logo.png", b"PNG", "image/png").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());
    let metadata = engine.metadata().clone();
    let registry = JobRegistry::new(Arc::new(engine), 20);

    let id = registry.submit(&server.uri(), Some(5)).unwrap();
    let job = registry
        .wait_for(&id, Duration::from_millis(20))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.expect("completed job has a result");
    assert_eq!(result.hostname, "127.0.0.1");
    assert_eq!(result.page_count, 2);
    assert_eq!(result.asset_count, 1);
    assert_eq!(job.progress.pages_processed, 2);

    assert!(registry.list_active().is_empty());

    let latest = metadata.latest("127.0.0.1").await.unwrap().unwrap();
    assert_eq!(latest.snapshot_id, result.snapshot_id);
    assert!(tmp
        .path()
        .join("127.0.0.1")
        .join(&result.snapshot_id)
        .join("index.html")
        .is_file());
}

#[tokio::test]
async fn test_registry_rejects_malformed_url() {
    let tmp = TempDir::new().unwrap();
    let registry = JobRegistry::new(Arc::new(create_test_engine(tmp.path())), 20);

    assert!(registry.submit("not-a-url", None).is_err());
    assert!(registry.list_active().is_empty());
    assert!(registry.list_history().is_empty());
    assert!(!tmp.path().join("not-a-url").exists());
}

#[tokio::test]
async fn test_overlong_asset_name_is_shortened() {
    let server = MockServer::start().await;
    let asset_route = format!("/{}.png", "a".repeat(300));
    mount_page(
        &server,
        "/",
        &format!(r#"<img src="{}"><a href="/ok">OK</a>"#, asset_route),
    )
    .await;
    mount_page(&server, "/ok", "<p>still crawled</p>").await;
    mount_bytes(&server, &asset_route, b"PNGDATA", "image/png").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 5), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.page_count, 2);
    assert_eq!(summary.asset_count, 1);
    assert!(summary.snapshot_root.join("ok.html").is_file());

    let saved: Vec<String> = std::fs::read_dir(summary.snapshot_root.join("assets"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].len() < 255);
    assert!(saved[0].ends_with(".png"));

    let index = std::fs::read_to_string(summary.snapshot_root.join("index.html")).unwrap();
    assert!(index.contains(&format!("./assets/{}", saved[0])));

    let history = engine.metadata().list("127.0.0.1").await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_overlong_page_path_is_shortened() {
    let server = MockServer::start().await;
    let long_route = format!("/{}", "p".repeat(300));
    mount_page(
        &server,
        "/",
        &format!(r#"<a href="{}">Long</a><a href="/ok">OK</a>"#, long_route),
    )
    .await;
    mount_page(&server, &long_route, "<p>long page</p>").await;
    mount_page(&server, "/ok", "<p>ok page</p>").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 5), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.page_count, 3);
    assert!(summary.snapshot_root.join("ok.html").is_file());

    let long_page = std::fs::read_dir(&summary.snapshot_root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .find(|name| name.starts_with("ppp"))
        .expect("long page should be saved");
    assert!(long_page.len() < 255);
    assert!(long_page.ends_with(".html"));

    let history = engine.metadata().list("127.0.0.1").await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_skip_applies_per_element_category() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<img src="/x.mp4"><script src="/x.mp4"></script>"#,
    )
    .await;
    mount_bytes(&server, "/x.mp4", b"console.log(1)", "application/javascript").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 1), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.asset_count, 1);
    let index = std::fs::read_to_string(summary.snapshot_root.join("index.html")).unwrap();
    assert!(index.contains(r#"<img src="/x.mp4">"#));
    assert!(index.contains(r#"<script src="./assets/x.mp4">"#));
}

#[tokio::test]
async fn test_entity_encoded_reference_rewritten() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<img src="/pic.png?w=1&#38;h=2">"#).await;
    mount_bytes(&server, "/pic.png", b"PNGDATA", "image/png").await;

    let tmp = TempDir::new().unwrap();
    let engine = create_test_engine(tmp.path());

    let summary = engine
        .archive(request(&server, "/", 1), Arc::new(NoopReporter))
        .await
        .unwrap();

    assert_eq!(summary.asset_count, 1);
    let index = std::fs::read_to_string(summary.snapshot_root.join("index.html")).unwrap();
    assert!(index.contains(r#"src="./assets/pic.png""#));
    assert!(!index.contains("&#38;"));
}
