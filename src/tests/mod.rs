use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::runner::{Options, Runner, RunnerError, ScanSummary, WordlistSource};
use crate::transport::{Transport, TransportError, TransportResponse};

/// Canned HTTP layer keyed by exact request URL. Anything unrouted is a 404.
struct MockTransport {
    routes: HashMap<String, (u16, Option<String>)>,
    fetches: AtomicU64,
}

impl MockTransport {
    fn new(routes: &[(&str, u16, Option<&str>)]) -> Arc<Self> {
        Arc::new(Self {
            routes: routes
                .iter()
                .map(|&(url, status, location)| {
                    (url.to_string(), (status, location.map(|l| l.to_string())))
                })
                .collect(),
            fetches: AtomicU64::new(0),
        })
    }

    fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.routes.get(url) {
            Some((status, location)) => Ok(TransportResponse {
                status: *status,
                content_length: None,
                location: location.clone(),
            }),
            None => Ok(TransportResponse {
                status: 404,
                content_length: None,
                location: None,
            }),
        }
    }
}

/// Fails with a timeout a fixed number of times before answering 200.
struct FlakyTransport {
    failures: u64,
    fetches: AtomicU64,
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn fetch(&self, _url: &str) -> Result<TransportResponse, TransportError> {
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(TransportError::Timeout);
        }
        Ok(TransportResponse {
            status: 200,
            content_length: Some(12),
            location: None,
        })
    }
}

fn temp_output(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("pathprobe_e2e_{name}.txt"));
    let _ = std::fs::remove_file(&path);
    path
}

fn scan_options(words: &[&str], output: &PathBuf) -> Options {
    Options {
        url: "http://example.com".to_string(),
        wordlist: WordlistSource::Inline(words.iter().map(|w| w.to_string()).collect()),
        output: output.to_string_lossy().into_owned(),
        threads: 8,
        ..Options::default()
    }
}

async fn run_with(
    transport: Arc<dyn Transport>,
    options: Options,
) -> Result<ScanSummary, RunnerError> {
    Runner::with_transport(options, transport)?.run().await
}

fn output_lines(path: &PathBuf) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| l.to_string())
        .collect()
}

#[tokio::test]
async fn records_hits_and_redirect_targets_only() {
    let output = temp_output("basic");
    let transport = MockTransport::new(&[
        ("http://example.com/admin", 200, None),
        ("http://example.com/login", 302, Some("/login/")),
    ]);
    let options = scan_options(&["admin", "login", "404page"], &output);

    let summary = run_with(transport.clone(), options).await.unwrap();

    assert_eq!(summary.stats.probed, 3);
    assert_eq!(summary.stats.discovered, 2);
    assert_eq!(summary.written, 2);
    assert_eq!(transport.fetch_count(), 3);

    let lines: HashSet<String> = output_lines(&output).into_iter().collect();
    assert_eq!(
        lines,
        HashSet::from([
            "http://example.com/admin".to_string(),
            "http://example.com/login/".to_string(),
        ])
    );
    let _ = std::fs::remove_file(&output);
}

#[tokio::test]
async fn recursion_rescans_wordlist_under_directories() {
    let output = temp_output("recursion");
    let transport = MockTransport::new(&[
        (
            "http://example.com/admin",
            301,
            Some("http://example.com/admin/"),
        ),
        ("http://example.com/admin/panel", 200, None),
    ]);
    let mut options = scan_options(&["admin", "panel"], &output);
    options.recursive = true;
    options.max_depth = 1;

    let summary = run_with(transport.clone(), options).await.unwrap();

    // 2 seeds plus 2 derived probes under /admin/
    assert_eq!(transport.fetch_count(), 4);
    assert_eq!(summary.stats.discovered, 2);

    let lines: HashSet<String> = output_lines(&output).into_iter().collect();
    assert_eq!(
        lines,
        HashSet::from([
            "http://example.com/admin/".to_string(),
            "http://example.com/admin/panel".to_string(),
        ])
    );
    let _ = std::fs::remove_file(&output);
}

#[tokio::test]
async fn recursion_stops_at_max_depth() {
    let output = temp_output("depth");
    let transport = MockTransport::new(&[
        ("http://example.com/a", 301, Some("http://example.com/a/")),
        (
            "http://example.com/a/a",
            301,
            Some("http://example.com/a/a/"),
        ),
        (
            "http://example.com/a/a/a",
            301,
            Some("http://example.com/a/a/a/"),
        ),
    ]);
    let mut options = scan_options(&["a"], &output);
    options.recursive = true;
    options.max_depth = 2;

    let summary = run_with(transport.clone(), options).await.unwrap();

    // depth 0, 1, and 2 probed; the depth-2 directory is recorded but not expanded
    assert_eq!(transport.fetch_count(), 3);
    assert_eq!(summary.stats.discovered, 3);
    assert_eq!(
        output_lines(&output),
        vec![
            "http://example.com/a/".to_string(),
            "http://example.com/a/a/".to_string(),
            "http://example.com/a/a/a/".to_string(),
        ]
    );
    let _ = std::fs::remove_file(&output);
}

#[tokio::test]
async fn shared_redirect_target_is_written_once() {
    let output = temp_output("dedup");
    let transport = MockTransport::new(&[
        (
            "http://example.com/dir",
            301,
            Some("http://example.com/shared/"),
        ),
        (
            "http://example.com/dir2",
            301,
            Some("http://example.com/shared/"),
        ),
    ]);
    let options = scan_options(&["dir", "dir2"], &output);

    let summary = run_with(transport.clone(), options).await.unwrap();

    assert_eq!(summary.stats.discovered, 1);
    assert_eq!(
        output_lines(&output),
        vec!["http://example.com/shared/".to_string()]
    );
    let _ = std::fs::remove_file(&output);
}

#[tokio::test]
async fn host_escaping_words_are_skipped_without_a_request() {
    let output = temp_output("escape");
    let transport = MockTransport::new(&[("http://example.com/ok", 200, None)]);
    let options = scan_options(&["//evil.com/x", "ok"], &output);

    let summary = run_with(transport.clone(), options).await.unwrap();

    assert_eq!(transport.fetch_count(), 1);
    assert_eq!(summary.stats.skipped, 1);
    assert_eq!(summary.stats.discovered, 1);
    let _ = std::fs::remove_file(&output);
}

#[tokio::test]
async fn cross_run_dedup_skips_previously_written_urls() {
    let output = temp_output("cross_run");
    std::fs::write(&output, "http://example.com/admin\n").unwrap();
    let transport = MockTransport::new(&[
        ("http://example.com/admin", 200, None),
        ("http://example.com/login", 200, None),
    ]);
    let mut options = scan_options(&["admin", "login"], &output);
    options.dedup_output = true;

    let summary = run_with(transport.clone(), options).await.unwrap();

    assert_eq!(summary.stats.discovered, 1);
    assert_eq!(
        output_lines(&output),
        vec![
            "http://example.com/admin".to_string(),
            "http://example.com/login".to_string(),
        ]
    );
    let _ = std::fs::remove_file(&output);
}

#[tokio::test]
async fn transport_failures_are_retried_within_budget() {
    let output = temp_output("retries");
    let transport = Arc::new(FlakyTransport {
        failures: 2,
        fetches: AtomicU64::new(0),
    });
    let mut options = scan_options(&["admin"], &output);
    options.retries = 2;

    let summary = run_with(transport.clone(), options).await.unwrap();

    assert_eq!(transport.fetches.load(Ordering::SeqCst), 3);
    assert_eq!(summary.stats.discovered, 1);
    assert_eq!(summary.stats.errored, 0);
    let _ = std::fs::remove_file(&output);
}

#[tokio::test]
async fn transport_failures_without_retries_count_as_errors() {
    let output = temp_output("no_retries");
    let transport = Arc::new(FlakyTransport {
        failures: u64::MAX,
        fetches: AtomicU64::new(0),
    });
    let options = scan_options(&["admin"], &output);

    let summary = run_with(transport.clone(), options).await.unwrap();

    assert_eq!(transport.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(summary.stats.discovered, 0);
    assert_eq!(summary.stats.errored, 1);
    assert_eq!(summary.written, 0);
    let _ = std::fs::remove_file(&output);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn sink_write_failure_aborts_the_scan() {
    let transport = MockTransport::new(&[("http://example.com/admin", 200, None)]);
    // /dev/full opens fine and fails every write with ENOSPC
    let options = scan_options(&["admin"], &PathBuf::from("/dev/full"));

    let result = run_with(transport.clone(), options).await;

    assert!(matches!(result, Err(RunnerError::OutputWrite { .. })));
    assert_eq!(transport.fetch_count(), 1);
}

#[tokio::test]
async fn unwritable_output_fails_before_any_request() {
    let transport = MockTransport::new(&[("http://example.com/admin", 200, None)]);
    let mut options = scan_options(&["admin"], &PathBuf::from("/nonexistent/dir/out.txt"));
    options.threads = 2;

    let result = run_with(transport.clone(), options).await;

    assert!(matches!(result, Err(RunnerError::OutputOpen { .. })));
    assert_eq!(transport.fetch_count(), 0);
}
