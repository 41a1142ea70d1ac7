//! Scan orchestration: shared parallelism budget and the worker pool that
//! fans one host scan out per target.

mod host;
pub mod pacing;

pub use host::*;

use crate::api::AnalyzeTransport;
use crate::config::ScanConfig;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Shared, shrink-only parallelism budget.
///
/// Workers observe it before taking new work; a host that gets rate limited
/// shrinks it (at most once per host) so the whole run backs off. It never
/// drops below one and never grows back.
#[derive(Debug)]
pub struct ParallelBudget {
    limit: AtomicUsize,
}

impl ParallelBudget {
    pub fn new(initial: usize) -> Self {
        Self {
            limit: AtomicUsize::new(initial.max(1)),
        }
    }

    pub fn current(&self) -> usize {
        self.limit.load(Ordering::Acquire)
    }

    /// Remove one slot, keeping a floor of one. Returns false when already
    /// at the floor. Compare-and-swap so concurrent shrinkers cannot pass
    /// the floor between them.
    pub fn shrink(&self) -> bool {
        let mut current = self.limit.load(Ordering::Acquire);
        while current > 1 {
            match self.limit.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(seen) => current = seen,
            }
        }
        false
    }
}

/// Runs one host scan per target under the shared budget.
pub struct ScanPool {
    config: Arc<ScanConfig>,
    transport: Arc<dyn AnalyzeTransport>,
    budget: Arc<ParallelBudget>,
}

impl ScanPool {
    pub fn new(config: ScanConfig, transport: Arc<dyn AnalyzeTransport>) -> Self {
        let budget = Arc::new(ParallelBudget::new(config.max_parallel));
        Self {
            config: Arc::new(config),
            transport,
            budget,
        }
    }

    pub fn budget(&self) -> Arc<ParallelBudget> {
        self.budget.clone()
    }

    /// Scan every hostname, delivering each outcome as soon as its host
    /// terminates. The channel closes once all scans finish.
    pub fn run(&self, hostnames: Vec<String>) -> mpsc::Receiver<ScanOutcome> {
        let worker_count = self.budget.current().min(hostnames.len()).max(1);
        let queue = Arc::new(Mutex::new(VecDeque::from(hostnames)));
        let live_workers = Arc::new(AtomicUsize::new(worker_count));
        let (tx, rx) = mpsc::channel(worker_count);

        tracing::info!("Starting scan pool with {worker_count} workers");

        for _ in 0..worker_count {
            let config = self.config.clone();
            let transport = self.transport.clone();
            let budget = self.budget.clone();
            let queue = queue.clone();
            let live_workers = live_workers.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                loop {
                    // Retire when the budget shrank below the live worker
                    // count. The scan that observed the rate limit keeps
                    // running; only new work is held back.
                    let live = live_workers.load(Ordering::Acquire);
                    if live > budget.current() {
                        if live_workers
                            .compare_exchange(live, live - 1, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            tracing::debug!("Worker retiring; budget is {}", budget.current());
                            return;
                        }
                        continue;
                    }

                    let hostname = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(_) => None,
                    };
                    let Some(hostname) = hostname else {
                        live_workers.fetch_sub(1, Ordering::AcqRel);
                        return;
                    };

                    let outcome = scan_host(&config, &hostname, transport.as_ref(), &budget).await;
                    tracing::info!(
                        "Timer: {} took {}s",
                        outcome.hostname,
                        outcome.runtime.as_secs()
                    );

                    if tx.send(outcome).await.is_err() {
                        // Receiver gone; nothing left to report to.
                        live_workers.fetch_sub(1, Ordering::AcqRel);
                        return;
                    }
                }
            });
        }

        rx
    }
}
