use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use ::time::{format_description::well_known, OffsetDateTime};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ScanSettings;
use crate::error::{Result, ScanError};
use crate::prober::{probe_tcp, probe_udp};
use crate::types::{ProbeResult, ResultTable, ScanReport, ScanRequest, Transport};

/// Scan coordinator: fans one probe task per (port, transport) out to a
/// bounded worker pool, then aggregates what the workers reported.
///
/// - At most `settings.workers` probe tasks run at once.
/// - Results are only read after every task has finished.
/// - The pool is shut down before `run` returns, on every path.
#[derive(Debug, Clone)]
pub struct Scanner {
    request: ScanRequest,
    settings: Arc<ScanSettings>,
}

impl Scanner {
    pub fn new(request: ScanRequest, settings: ScanSettings) -> Self {
        Self {
            request,
            settings: Arc::new(settings),
        }
    }

    /// Run the scan to completion.
    pub async fn run(&self) -> Result<ScanReport> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Variant that stops early, with [`ScanError::Interrupted`], once `cancel` fires.
    pub async fn run_with_cancel(&self, cancel: CancellationToken) -> Result<ScanReport> {
        let started_at = now_rfc3339();
        if self.request.transports().is_empty() {
            warn!("neither TCP nor UDP requested, nothing to scan");
        }
        debug!(
            host = %self.request.target,
            low = self.request.low,
            high = self.request.high,
            tasks = self.request.task_count(),
            workers = self.settings.workers,
            "starting scan"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<ProbeResult>();
        let mut pool = WorkerPool::new(self.settings.workers);

        let outcome = match self.dispatch(&mut pool, &tx, &cancel).await {
            Ok(n) => pool.wait(&cancel).await.map(|()| n),
            Err(e) => Err(e),
        };
        pool.shutdown().await;
        drop(tx);
        let dispatched = outcome?;

        let (udp, tcp) = aggregate(std::iter::from_fn(|| rx.try_recv().ok()));
        debug!(dispatched, udp = udp.len(), tcp = tcp.len(), "scan finished");

        Ok(ScanReport {
            target: self.request.target.to_string(),
            probes_dispatched: dispatched,
            started_at,
            finished_at: now_rfc3339(),
            udp,
            tcp,
        })
    }

    async fn dispatch(
        &self,
        pool: &mut WorkerPool,
        tx: &mpsc::UnboundedSender<ProbeResult>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let target = IpAddr::V4(self.request.target);
        let transports = self.request.transports();
        let mut dispatched = 0u64;

        for port in self.request.ports() {
            for &transport in &transports {
                let tx = tx.clone();
                let settings = self.settings.clone();
                match transport {
                    Transport::Tcp => {
                        pool.submit(cancel, async move {
                            if let Some(r) = probe_tcp(target, port, &settings).await {
                                let _ = tx.send(r);
                            }
                        })
                        .await?
                    }
                    Transport::Udp => {
                        pool.submit(cancel, async move {
                            for r in probe_udp(target, port, &settings).await {
                                let _ = tx.send(r);
                            }
                        })
                        .await?
                    }
                }
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }
}

/// Merge candidates into one table per transport, returned as `(udp, tcp)`.
///
/// An unclassified entry is replaced by a later classified one for the same
/// port; otherwise the first entry for a port wins. Tables keep arrival order.
pub fn aggregate(results: impl IntoIterator<Item = ProbeResult>) -> (ResultTable, ResultTable) {
    let mut udp = ResultTable::new();
    let mut tcp = ResultTable::new();
    for r in results {
        match r.transport {
            Transport::Udp => udp.offer(r),
            Transport::Tcp => tcp.offer(r),
        };
    }
    (udp, tcp)
}

/// Fixed-size pool: a semaphore gating a join set. A permit is held by each
/// task until it completes, so submission waits for a free worker.
struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl WorkerPool {
    fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            tasks: JoinSet::new(),
        }
    }

    async fn submit<F>(&mut self, cancel: &CancellationToken, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Interrupted),
            p = self.permits.clone().acquire_owned() => p.map_err(|_| ScanError::Interrupted)?,
        };
        self.tasks.spawn(async move {
            let _permit = permit;
            task.await;
        });
        Ok(())
    }

    /// Wait until every submitted task has finished.
    async fn wait(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ScanError::Interrupted),
                res = self.tasks.join_next() => match res {
                    None => return Ok(()),
                    Some(Err(e)) if e.is_panic() => warn!("probe task panicked: {e}"),
                    Some(_) => {}
                },
            }
        }
    }

    /// Abort whatever is still running and join it.
    async fn shutdown(mut self) {
        self.permits.close();
        self.tasks.shutdown().await;
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
