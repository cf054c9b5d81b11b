use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use colored::Colorize;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use governor::{Quota, RateLimiter};
use indicatif::ProgressBar;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task;

use crate::classifier::{Classification, Classifier, Discovery, ProbeOutcome, ProbeResult};
use crate::dedup::DedupStore;
use crate::target;
use crate::transport::{Transport, TransportError};

/// Per-worker inbox depth. The central queue is unbounded; this only bounds
/// what the dispatcher hands each worker ahead of time.
const WORKER_QUEUE_DEPTH: usize = 1024;

/// One candidate probe. Created by the seeder (depth 0) or the recursion
/// expander (depth > 0), consumed exactly once by a worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeTask {
    pub base_url: String,
    pub word: String,
    pub depth: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Seeding,
    Running,
    Draining,
    Done,
    Failed,
}

#[derive(Clone, Debug)]
pub struct ScanOptions {
    pub base_url: reqwest::Url,
    pub wordlist: Arc<Vec<String>>,
    pub accepted_codes: HashSet<u16>,
    pub threads: usize,
    pub retries: u32,
    /// 0 disables recursion entirely.
    pub max_depth: usize,
    /// Seeding rate limit in tasks per second; 0 means unlimited.
    pub rate: u32,
}

/// Pending-task accounting used to detect quiescence: incremented before a
/// task is queued, decremented only after its terminal outcome and any
/// derived tasks are fully resolved, so the count can never read zero while
/// a child is still in the pipe. Seeding completion is tracked separately so
/// a fast worker draining the queue mid-seed does not look like quiescence.
#[derive(Debug, Default)]
pub struct ScanCounters {
    pending: AtomicUsize,
    seeded: AtomicBool,
    idle: Notify,
    pub probed: AtomicU64,
    pub discovered: AtomicU64,
    pub errored: AtomicU64,
    pub skipped: AtomicU64,
}

impl ScanCounters {
    pub fn task_enqueued(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn task_settled(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn seeding_complete(&self) {
        self.seeded.store(true, Ordering::SeqCst);
        self.idle.notify_waiters();
    }

    pub fn is_idle(&self) -> bool {
        self.seeded.load(Ordering::SeqCst) && self.pending.load(Ordering::SeqCst) == 0
    }

    pub async fn wait_idle(&self) {
        loop {
            if self.is_idle() {
                return;
            }
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub probed: u64,
    pub discovered: u64,
    pub errored: u64,
    pub skipped: u64,
}

/// Everything the engine shares with its caller: the transport seam, the
/// recorded-URL store (pre-seedable for cross-run dedup), the discovery
/// channel feeding the sink, and the shutdown/phase signals.
pub struct ScanContext {
    pub transport: Arc<dyn Transport>,
    pub recorded: Arc<DedupStore>,
    pub discovery_tx: mpsc::Sender<Discovery>,
    pub shutdown_tx: Arc<watch::Sender<bool>>,
    pub shutdown_rx: watch::Receiver<bool>,
    pub phase_tx: Arc<watch::Sender<ScanPhase>>,
}

/// Produces the derived tasks for a directory-like discovery: one per
/// wordlist entry, one level deeper, rooted at the discovered directory.
/// Depth-capped tasks are dropped here, never enqueued.
pub fn expand(discovery: &Discovery, wordlist: &[String], max_depth: usize) -> Vec<ProbeTask> {
    if discovery.depth >= max_depth {
        return Vec::new();
    }
    let base = match reqwest::Url::parse(&discovery.url) {
        Ok(url) => target::ensure_dir_url(&url).to_string(),
        Err(_) => return Vec::new(),
    };
    wordlist
        .iter()
        .map(|word| ProbeTask {
            base_url: base.clone(),
            word: word.clone(),
            depth: discovery.depth + 1,
        })
        .collect()
}

/// Runs the scan to quiescence (or until drained by cancellation / a sink
/// failure) and returns the final counters. In-flight HTTP is capped at
/// `threads`: each worker issues at most one request at a time.
pub async fn run_scan(pb: ProgressBar, options: ScanOptions, ctx: ScanContext) -> ScanStats {
    let counters = Arc::new(ScanCounters::default());
    let classifier = Arc::new(Classifier::new(options.accepted_codes.clone()));
    let probed = Arc::new(DedupStore::new());

    let _ = ctx.phase_tx.send(ScanPhase::Seeding);
    pb.inc_length(options.wordlist.len() as u64);

    let (job_tx, mut job_rx) = mpsc::unbounded_channel::<ProbeTask>();

    // per-worker inboxes fed round-robin from the central queue
    let worker_count = options.threads.max(1);
    let mut worker_rxs = Vec::with_capacity(worker_count);
    let mut worker_txs = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let (tx, rx) = mpsc::channel::<ProbeTask>(WORKER_QUEUE_DEPTH);
        worker_txs.push(tx);
        worker_rxs.push(rx);
    }

    let dispatch_handle = task::spawn({
        let mut shutdown_rx = ctx.shutdown_rx.clone();
        async move {
            let mut idx = 0usize;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    job = job_rx.recv() => {
                        let job = match job {
                            Some(job) => job,
                            None => break,
                        };
                        let tx = &worker_txs[idx % worker_txs.len()];
                        if tx.send(job).await.is_err() {
                            break;
                        }
                        idx = idx.wrapping_add(1);
                    }
                }
            }
        }
    });

    let seed_handle = task::spawn({
        let counters = counters.clone();
        let job_tx = job_tx.clone();
        let wordlist = options.wordlist.clone();
        let base_url = options.base_url.to_string();
        let rate = options.rate;
        let shutdown_rx = ctx.shutdown_rx.clone();
        async move {
            let limiter = NonZeroU32::new(rate).map(|r| RateLimiter::direct(Quota::per_second(r)));
            for word in wordlist.iter() {
                if *shutdown_rx.borrow() {
                    break;
                }
                counters.task_enqueued();
                let seeded = job_tx.send(ProbeTask {
                    base_url: base_url.clone(),
                    word: word.clone(),
                    depth: 0,
                });
                if seeded.is_err() {
                    counters.task_settled();
                    break;
                }
                if let Some(limiter) = limiter.as_ref() {
                    limiter.until_ready().await;
                }
            }
            counters.seeding_complete();
        }
    });

    // drive shutdown once the queue is empty and nothing is in flight
    let quiesce_handle = task::spawn({
        let counters = counters.clone();
        let shutdown_tx = ctx.shutdown_tx.clone();
        async move {
            counters.wait_idle().await;
            let _ = shutdown_tx.send(true);
        }
    });

    let drain_phase_handle = task::spawn({
        let mut shutdown_rx = ctx.shutdown_rx.clone();
        let phase_tx = ctx.phase_tx.clone();
        async move {
            if shutdown_rx.changed().await.is_ok() {
                let _ = phase_tx.send(ScanPhase::Draining);
            }
        }
    });

    let workers = FuturesUnordered::new();
    for rx in worker_rxs {
        let worker = WorkerContext {
            pb: pb.clone(),
            transport: ctx.transport.clone(),
            classifier: classifier.clone(),
            probed: probed.clone(),
            recorded: ctx.recorded.clone(),
            counters: counters.clone(),
            discovery_tx: ctx.discovery_tx.clone(),
            job_tx: job_tx.clone(),
            wordlist: options.wordlist.clone(),
            retries: options.retries,
            max_depth: options.max_depth,
        };
        let shutdown_rx = ctx.shutdown_rx.clone();
        workers.push(task::spawn(async move {
            run_prober(worker, rx, shutdown_rx).await
        }));
    }
    drop(job_tx);

    let _ = seed_handle.await;
    if !*ctx.shutdown_rx.borrow() {
        let _ = ctx.phase_tx.send(ScanPhase::Running);
    }

    let _: Vec<_> = workers.collect().await;
    let _ = dispatch_handle.await;
    quiesce_handle.abort();
    drain_phase_handle.abort();

    let _ = ctx.phase_tx.send(ScanPhase::Done);

    ScanStats {
        probed: counters.probed.load(Ordering::Relaxed),
        discovered: counters.discovered.load(Ordering::Relaxed),
        errored: counters.errored.load(Ordering::Relaxed),
        skipped: counters.skipped.load(Ordering::Relaxed),
    }
}

struct WorkerContext {
    pb: ProgressBar,
    transport: Arc<dyn Transport>,
    classifier: Arc<Classifier>,
    probed: Arc<DedupStore>,
    recorded: Arc<DedupStore>,
    counters: Arc<ScanCounters>,
    discovery_tx: mpsc::Sender<Discovery>,
    job_tx: mpsc::UnboundedSender<ProbeTask>,
    wordlist: Arc<Vec<String>>,
    retries: u32,
    max_depth: usize,
}

async fn run_prober(
    ctx: WorkerContext,
    mut rx: mpsc::Receiver<ProbeTask>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let task = tokio::select! {
            _ = shutdown_rx.changed() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };
        probe_one(&ctx, task).await;
    }
}

async fn probe_one(ctx: &WorkerContext, probe_task: ProbeTask) {
    let result = resolve_and_probe(ctx, &probe_task).await;

    match &result.outcome {
        ProbeOutcome::Excluded => {
            ctx.counters.skipped.fetch_add(1, Ordering::Relaxed);
        }
        ProbeOutcome::Timeout | ProbeOutcome::TransportError(_) => {
            ctx.counters.probed.fetch_add(1, Ordering::Relaxed);
            ctx.counters.errored.fetch_add(1, Ordering::Relaxed);
            let detail = match &result.outcome {
                ProbeOutcome::Timeout => "timed out".to_string(),
                ProbeOutcome::TransportError(msg) => msg.clone(),
                _ => String::new(),
            };
            ctx.pb.println(format!(
                "{} {} {}{}{}",
                "request failed ::".bold().red(),
                result.requested_url.bold().white(),
                "(".bold().white(),
                detail.white(),
                ")".bold().white(),
            ));
        }
        ProbeOutcome::Success { .. } => {
            ctx.counters.probed.fetch_add(1, Ordering::Relaxed);
            if let Classification::Positive {
                url,
                status,
                directory,
            } = ctx.classifier.classify(&result)
            {
                // atomic gate: exactly one worker records any given URL
                if ctx.recorded.try_insert(&url) {
                    ctx.counters.discovered.fetch_add(1, Ordering::Relaxed);
                    ctx.pb.println(format!(
                        "{} {} {}{}{}",
                        "found ::".bold().green(),
                        url.bold().white(),
                        "(".bold().white(),
                        status.to_string().bold().cyan(),
                        ")".bold().white(),
                    ));
                    let discovery = Discovery {
                        url,
                        status,
                        depth: probe_task.depth,
                    };
                    if directory {
                        expand_directory(ctx, &discovery);
                    }
                    let _ = ctx.discovery_tx.send(discovery).await;
                }
            }
        }
    }

    ctx.pb.inc(1);
    ctx.counters.task_settled();
}

/// Re-seeds the queue with one task per wordlist entry under the discovered
/// directory. Children are counted as pending before the parent settles.
fn expand_directory(ctx: &WorkerContext, discovery: &Discovery) {
    for derived in expand(discovery, &ctx.wordlist, ctx.max_depth) {
        ctx.counters.task_enqueued();
        if ctx.job_tx.send(derived).is_err() {
            ctx.counters.task_settled();
            return;
        }
        ctx.pb.inc_length(1);
    }
}

async fn resolve_and_probe(ctx: &WorkerContext, probe_task: &ProbeTask) -> ProbeResult {
    let base = match reqwest::Url::parse(&probe_task.base_url) {
        Ok(base) => base,
        Err(_) => {
            return ProbeResult {
                requested_url: probe_task.base_url.clone(),
                outcome: ProbeOutcome::Excluded,
            }
        }
    };
    let candidate = match target::join_word(&base, &probe_task.word) {
        Ok(candidate) => candidate,
        Err(_) => {
            return ProbeResult {
                requested_url: probe_task.base_url.clone(),
                outcome: ProbeOutcome::Excluded,
            }
        }
    };
    let requested_url = candidate.to_string();

    // candidates can collide after recursion re-seeding; never probe twice
    if !ctx.probed.try_insert(&requested_url) {
        return ProbeResult {
            requested_url,
            outcome: ProbeOutcome::Excluded,
        };
    }

    ctx.pb.set_message(format!(
        "{} {}",
        "probing ::".bold().white(),
        requested_url.bold().blue(),
    ));

    let mut attempts = 0u32;
    loop {
        match ctx.transport.fetch(&requested_url).await {
            Ok(resp) => {
                return ProbeResult {
                    requested_url,
                    outcome: ProbeOutcome::Success {
                        status: resp.status,
                        content_length: resp.content_length,
                        location: resp.location,
                    },
                }
            }
            Err(err) => {
                // transport-level failures get the bounded retry budget; a
                // completed exchange is terminal whatever the status code
                if attempts < ctx.retries {
                    attempts += 1;
                    continue;
                }
                let outcome = match err {
                    TransportError::Timeout => ProbeOutcome::Timeout,
                    other => ProbeOutcome::TransportError(other.to_string()),
                };
                return ProbeResult {
                    requested_url,
                    outcome,
                };
            }
        }
    }
}
