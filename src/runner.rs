use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio::time::Instant;

use crate::classifier::Discovery;
use crate::dedup::DedupStore;
use crate::scanner::{self, ScanContext, ScanOptions, ScanPhase, ScanStats};
use crate::sink;
use crate::target;
use crate::transport::{HttpTransport, Transport, TransportBuildError, TransportConfig};
use crate::utils;

const DISCOVERY_QUEUE_DEPTH: usize = 1024;

#[derive(Clone, Debug)]
pub enum WordlistSource {
    FilePath(String),
    Inline(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct Options {
    pub url: String,
    pub wordlist: WordlistSource,
    pub output: String,
    pub threads: usize,
    pub status_codes: String,
    pub timeout_seconds: u64,
    pub recursive: bool,
    pub max_depth: usize,
    pub user_agent: String,
    pub verify_ssl: bool,
    pub retries: u32,
    pub rate: u32,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub dedup_output: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            url: String::new(),
            wordlist: WordlistSource::FilePath("common.txt".to_string()),
            output: "discovered_urls.txt".to_string(),
            threads: 1,
            status_codes: "200,301,302,403".to_string(),
            timeout_seconds: 5,
            recursive: false,
            max_depth: 0,
            user_agent: "pathprobe".to_string(),
            verify_ssl: true,
            retries: 0,
            rate: 0,
            proxy: None,
            header: None,
            dedup_output: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no target URL provided")]
    MissingUrl,

    #[error("invalid base URL: {source}")]
    InvalidBase {
        #[source]
        source: target::TargetError,
    },

    #[error("invalid status codes {value:?}: {message}")]
    InvalidStatusCodes { value: String, message: String },

    #[error("invalid thread count {value}, expected positive integer")]
    InvalidThreads { value: usize },

    #[error("invalid header {value:?}: {message}")]
    InvalidHeader { value: String, message: String },

    #[error("wordlist is empty")]
    EmptyWordlist,

    #[error("failed to open file for {kind}: {path}: {source}")]
    FileOpen {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read lines for {kind}: {path}: {source}")]
    FileRead {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open output file: {path}: {source}")]
    OutputOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output file: {path}: {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    TransportBuild {
        #[from]
        source: TransportBuildError,
    },

    #[error("task join failed: {source}")]
    TaskJoin {
        #[source]
        source: tokio::task::JoinError,
    },
}

#[derive(Clone, Debug)]
pub struct ScanSummary {
    pub started_at: Instant,
    pub elapsed: Duration,
    pub stats: ScanStats,
    pub written: u64,
    pub output_path: String,
}

pub struct Runner {
    options: Options,
    transport: Option<Arc<dyn Transport>>,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        if options.url.trim().is_empty() {
            return Err(RunnerError::MissingUrl);
        }
        if options.threads == 0 {
            return Err(RunnerError::InvalidThreads {
                value: options.threads,
            });
        }
        Ok(Self {
            options,
            transport: None,
        })
    }

    /// Swaps the HTTP layer for a caller-provided one. Scans built this way
    /// never construct a real client.
    pub fn with_transport(
        options: Options,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RunnerError> {
        let mut runner = Self::new(options)?;
        runner.transport = Some(transport);
        Ok(runner)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub async fn run(&self) -> Result<ScanSummary, RunnerError> {
        self.run_with_progress(ProgressBar::hidden()).await
    }

    pub async fn run_with_progress(&self, pb: ProgressBar) -> Result<ScanSummary, RunnerError> {
        let started_at = Instant::now();

        // everything that can fail is resolved before the first request
        let base_url = target::normalize(&self.options.url)
            .map_err(|source| RunnerError::InvalidBase { source })?;
        let accepted_codes = parse_status_codes(&self.options.status_codes)?;
        let wordlist = load_wordlist(&self.options.wordlist).await?;
        if wordlist.is_empty() {
            return Err(RunnerError::EmptyWordlist);
        }
        let max_depth = if self.options.recursive {
            self.options.max_depth.max(1)
        } else {
            0
        };
        let extra_header = match self.options.header.as_deref() {
            Some(raw) => Some(utils::parse_header_kv(raw).map_err(|message| {
                RunnerError::InvalidHeader {
                    value: raw.to_string(),
                    message,
                }
            })?),
            None => None,
        };

        let recorded = Arc::new(DedupStore::new());
        if self.options.dedup_output {
            preload_recorded(&recorded, &self.options.output).await?;
        }

        let outfile = sink::open_append(&self.options.output)
            .await
            .map_err(|source| RunnerError::OutputOpen {
                path: self.options.output.clone(),
                source,
            })?;

        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(HttpTransport::build(&TransportConfig {
                timeout_seconds: self.options.timeout_seconds,
                user_agent: self.options.user_agent.clone(),
                verify_ssl: self.options.verify_ssl,
                proxy: self.options.proxy.clone(),
                extra_header,
            })?),
        };

        let (discovery_tx, discovery_rx) = mpsc::channel::<Discovery>(DISCOVERY_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let (phase_tx, _phase_rx) = watch::channel(ScanPhase::Idle);
        let phase_tx = Arc::new(phase_tx);

        let ctrlc_handle = task::spawn({
            let shutdown_tx = shutdown_tx.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(true);
                }
            }
        });

        let sink_handle = task::spawn(sink::run_sink(outfile, discovery_rx, shutdown_tx.clone()));

        let scan_options = ScanOptions {
            base_url,
            wordlist: Arc::new(wordlist),
            accepted_codes,
            threads: self.options.threads,
            retries: self.options.retries,
            max_depth,
            rate: self.options.rate,
        };
        let ctx = ScanContext {
            transport,
            recorded,
            discovery_tx,
            shutdown_tx,
            shutdown_rx,
            phase_tx: phase_tx.clone(),
        };
        let stats = scanner::run_scan(pb, scan_options, ctx).await;

        ctrlc_handle.abort();

        let written = match sink_handle
            .await
            .map_err(|source| RunnerError::TaskJoin { source })?
        {
            Ok(written) => written,
            Err(source) => {
                let _ = phase_tx.send(ScanPhase::Failed);
                return Err(RunnerError::OutputWrite {
                    path: self.options.output.clone(),
                    source,
                });
            }
        };

        Ok(ScanSummary {
            started_at,
            elapsed: started_at.elapsed(),
            stats,
            written,
            output_path: self.options.output.clone(),
        })
    }
}

fn parse_status_codes(value: &str) -> Result<HashSet<u16>, RunnerError> {
    utils::parse_u16_set_csv(value).map_err(|message| RunnerError::InvalidStatusCodes {
        value: value.to_string(),
        message,
    })
}

pub async fn load_wordlist(source: &WordlistSource) -> Result<Vec<String>, RunnerError> {
    match source {
        WordlistSource::Inline(values) => Ok(values
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()),
        WordlistSource::FilePath(path) => {
            let path = crate::config::expand_tilde_string(path.as_str());
            let handle = File::open(&path).await.map_err(|e| RunnerError::FileOpen {
                kind: "wordlist",
                path: path.clone(),
                source: e,
            })?;
            let mut out = Vec::new();
            let mut lines = BufReader::new(handle).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        out.push(line.to_string());
                    }
                    Ok(None) => break,
                    Err(e) => {
                        return Err(RunnerError::FileRead {
                            kind: "wordlist",
                            path,
                            source: e,
                        })
                    }
                }
            }
            Ok(out)
        }
    }
}

/// Seeds the recorded-URL store from a previous run's output so re-runs only
/// append URLs the file does not already hold.
async fn preload_recorded(recorded: &DedupStore, path: &str) -> Result<(), RunnerError> {
    let handle = match File::open(path).await {
        Ok(handle) => handle,
        // a missing output file just means nothing to dedup against
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(RunnerError::FileOpen {
                kind: "output",
                path: path.to_string(),
                source: e,
            })
        }
    };
    let mut lines = BufReader::new(handle).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if !line.is_empty() {
                    recorded.try_insert(line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                return Err(RunnerError::FileRead {
                    kind: "output",
                    path: path.to_string(),
                    source: e,
                })
            }
        }
    }
    Ok(())
}
