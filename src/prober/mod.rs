//! Bounded-concurrency latency prober
//!
//! Fans probe jobs out to a fixed pool of worker tasks and fans the
//! measurements back in.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  mpsc (cap C)  ┌─────────────┐  mpsc   ┌─────────────┐
//! │  Dispatcher │──────────────▶│  C Workers  │───────▶│  Collector  │
//! └─────────────┘                └─────────────┘         └─────────────┘
//!                                  probe → pause
//!                                  (slot held)
//! ```
//!
//! Each worker owns one concurrency slot: it takes a job, probes, and on
//! success sleeps one pacing interval before taking the next job. A failed
//! probe records the sentinel latency and releases the slot immediately.

pub mod probe;

pub use probe::{HttpProbe, MockProbe, Probe, ProbeFailure};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ProberConfig;
use crate::metrics;
use crate::models::{CatalogEntry, Measurement, PlayerCounts};
use crate::utils::error::ProbeError;

// ============================================================================
// Job Types
// ============================================================================

/// Lifecycle of one probe job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
    Completed,
}

/// Message from the dispatcher to a worker
#[derive(Debug, Clone)]
struct ProbeJob {
    job_id: usize,
    endpoint_id: i64,
    url: String,
    player_count: u32,
}

/// Message from a worker to the collector
#[derive(Debug)]
struct ProbeResult {
    job_id: usize,
    state: ProbeState,
    measurement: Measurement,
}

// ============================================================================
// Statistics
// ============================================================================

/// Slot occupancy tracker shared by the workers
#[derive(Debug, Default)]
struct SlotTracker {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlotTracker {
    fn acquire(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Measurements produced by one probe run
#[derive(Debug, Clone, Default)]
pub struct ProbeBatch {
    /// One measurement per selected entry, in no particular order
    pub measurements: Vec<Measurement>,

    /// Highest number of slots held at the same time
    pub peak_in_flight: usize,
}

impl ProbeBatch {
    /// Probes that ended with the sentinel latency
    pub fn failed(&self) -> usize {
        self.measurements.iter().filter(|m| m.is_failure()).count()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

// ============================================================================
// Prober
// ============================================================================

/// Probes catalog entries with at most `concurrency` requests in flight
pub struct BoundedProber {
    probe: Arc<dyn Probe>,
    concurrency: usize,
    pacing: Duration,
}

impl BoundedProber {
    /// Create a prober around any [`Probe`] implementation
    ///
    /// A concurrency of zero is treated as one.
    pub fn new(probe: Arc<dyn Probe>, concurrency: usize, pacing: Duration) -> Self {
        Self {
            probe,
            concurrency: concurrency.max(1),
            pacing,
        }
    }

    /// Create an HTTP prober from configuration
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &ProberConfig) -> Result<Self, ProbeError> {
        let probe = HttpProbe::new(config.request_timeout())?;
        Ok(Self::new(
            Arc::new(probe),
            config.max_concurrent_probes,
            config.pacing_interval(),
        ))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Probe every entry once and return one measurement per entry
    ///
    /// Player counts are looked up by world id and default to `0`. Individual
    /// probe failures become sentinel measurements; this never fails.
    pub async fn probe_all(
        &self,
        entries: Vec<CatalogEntry>,
        player_counts: &PlayerCounts,
    ) -> ProbeBatch {
        if entries.is_empty() {
            return ProbeBatch::default();
        }

        let jobs: Vec<ProbeJob> = entries
            .into_iter()
            .enumerate()
            .map(|(job_id, entry)| ProbeJob {
                job_id,
                endpoint_id: entry.numeric_id,
                player_count: player_counts.get(&entry.numeric_id).copied().unwrap_or(0),
                url: entry.url,
            })
            .collect();

        let total = jobs.len();
        let workers = self.concurrency.min(total);

        tracing::info!(
            total,
            workers,
            pacing_ms = self.pacing.as_millis() as u64,
            "Starting probe batch"
        );

        let (job_tx, job_rx) = mpsc::channel::<ProbeJob>(self.concurrency);
        let (result_tx, mut result_rx) = mpsc::channel::<ProbeResult>(total);
        let tracker = Arc::new(SlotTracker::default());

        let handles = self.spawn_workers(workers, job_rx, result_tx, Arc::clone(&tracker));

        // Kept to fill in jobs that never reported a result
        let mut pending: HashMap<usize, ProbeJob> =
            jobs.iter().map(|job| (job.job_id, job.clone())).collect();

        for job in jobs {
            tracing::trace!(job_id = job.job_id, state = ?ProbeState::Pending, "Dispatching probe");
            if job_tx.send(job).await.is_err() {
                tracing::error!("Probe queue closed - all workers exited");
                break;
            }
        }

        // Close the queue so idle workers shut down
        drop(job_tx);

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Probe worker terminated abnormally");
            }
        }

        let mut measurements = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            pending.remove(&result.job_id);
            tracing::trace!(
                job_id = result.job_id,
                outcome = ?result.state,
                state = ?ProbeState::Completed,
                "Probe collected"
            );
            measurements.push(result.measurement);
        }

        for job in pending.into_values() {
            tracing::warn!(world_id = job.endpoint_id, "Probe lost; recording as failed");
            measurements.push(Measurement::failed(job.endpoint_id, job.player_count));
        }

        let batch = ProbeBatch {
            measurements,
            peak_in_flight: tracker.peak(),
        };

        tracing::info!(
            total = batch.len(),
            failed = batch.failed(),
            peak_in_flight = batch.peak_in_flight,
            "Probe batch completed"
        );

        batch
    }

    /// Spawn worker tasks sharing one job queue
    fn spawn_workers(
        &self,
        workers: usize,
        job_rx: mpsc::Receiver<ProbeJob>,
        result_tx: mpsc::Sender<ProbeResult>,
        tracker: Arc<SlotTracker>,
    ) -> Vec<JoinHandle<()>> {
        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let tracker = Arc::clone(&tracker);
            let probe = Arc::clone(&self.probe);
            let pacing = self.pacing;

            let handle = tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = job_rx.lock().await;
                        rx.recv().await
                    };

                    let Some(job) = job else {
                        break; // Queue closed
                    };

                    tracker.acquire();
                    let result = run_job(worker_id, probe.as_ref(), job, pacing).await;
                    tracker.release();

                    if result_tx.send(result).await.is_err() {
                        tracing::error!(worker_id, "Result channel closed");
                        break;
                    }
                }

                tracing::debug!(worker_id, "Probe worker shutting down");
            });

            handles.push(handle);
        }

        handles
    }
}

/// Probe one job inside a held slot
async fn run_job(worker_id: usize, probe: &dyn Probe, job: ProbeJob, pacing: Duration) -> ProbeResult {
    tracing::info!(
        worker_id,
        world_id = job.endpoint_id,
        state = ?ProbeState::InFlight,
        "Pinging {}...",
        job.url
    );

    let (state, measurement) = match probe.probe(&job.url).await {
        Ok(latency) => {
            metrics::record_probe(Some(latency.as_secs_f64()));
            let measurement = Measurement::succeeded(job.endpoint_id, latency, job.player_count);
            // The pause stays inside the slot to throttle the request rate
            if !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            (ProbeState::Succeeded, measurement)
        }
        Err(e) => {
            metrics::record_probe(None);
            tracing::error!(world_id = job.endpoint_id, url = %job.url, error = %e, "Error pinging {}", job.url);
            (
                ProbeState::Failed,
                Measurement::failed(job.endpoint_id, job.player_count),
            )
        }
    };

    tracing::info!(
        world_id = job.endpoint_id,
        latency_seconds = measurement.latency_seconds,
        players = measurement.player_count,
        state = ?state,
        "Pinged {} with {} seconds and {} players",
        job.url,
        measurement.latency_seconds,
        measurement.player_count
    );

    ProbeResult {
        job_id: job.job_id,
        state,
        measurement,
    }
}
