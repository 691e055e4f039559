use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::sample::RawSample;
use crate::series::{SeriesSet, SeriesTable};
use crate::transport::PulseLink;

/// Cadence of the read-filter-append cycle. The peripheral notifies at its
/// own rate; this only bounds how stale a cancellation or duration check
/// can get.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Why an acquisition run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The transport reported itself gone, or a clean disconnect landed.
    Disconnected,
    /// The configured duration elapsed.
    DurationElapsed,
    /// The cooperative stop flag was raised.
    Stopped,
}

/// One pulled frame with its elapsed-seconds stamp, valid or not. Invalid
/// frames are kept for diagnostics; only valid ones reach the series.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord {
    pub elapsed: f64,
    pub sample: RawSample,
}

/// The finalized product of one streaming run. Immutable once the loop
/// exits; share it by reference with the export sink or inspect it
/// directly.
#[derive(Debug)]
pub struct AcquisitionRun {
    series: SeriesSet,
    raw_log: Vec<RawRecord>,
    stop_reason: StopReason,
}

impl AcquisitionRun {
    pub fn series(&self) -> &SeriesSet {
        &self.series
    }

    pub fn raw_log(&self) -> &[RawRecord] {
        &self.raw_log
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    /// Count of validated samples (equal across all three channels).
    pub fn sample_count(&self) -> usize {
        self.series.len()
    }

    pub fn to_table(&self) -> SeriesTable {
        self.series.to_table()
    }
}

/// A background acquisition in flight. Dropping the handle does not stop
/// the worker; raise the stop flag and join to get the finalized run.
pub struct AcquisitionHandle {
    cancel: CancellationToken,
    worker: JoinHandle<AcquisitionRun>,
}

impl AcquisitionHandle {
    pub(crate) fn spawn<L: PulseLink>(
        link: L,
        duration: Option<Duration>,
        verbose: bool,
    ) -> Self {
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(acquisition_loop(link, duration, cancel.clone(), verbose));
        Self { cancel, worker }
    }

    /// Request a cooperative stop. The worker notices within one poll
    /// cycle; nothing is appended after it does.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// A clone of the worker's stop token, for wiring into signal handlers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    pub async fn join(self) -> Result<AcquisitionRun, AppError> {
        Ok(self.worker.await?)
    }

    pub async fn stop_and_join(self) -> Result<AcquisitionRun, AppError> {
        self.stop();
        self.join().await
    }
}

fn round_elapsed(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

/// The streaming cycle shared by inline and background acquisition: poll
/// the link's latest frame, validate, stamp with seconds since `t0`, and
/// append. Exits on connectivity loss, duration expiry, or cancellation;
/// a transport that dropped mid-run is absorbed with a clean local
/// disconnect and never surfaces as an error.
pub(crate) async fn acquisition_loop<L: PulseLink>(
    link: L,
    duration: Option<Duration>,
    cancel: CancellationToken,
    verbose: bool,
) -> AcquisitionRun {
    let t0 = Instant::now();
    let mut series = SeriesSet::new();
    let mut raw_log = Vec::new();

    info!("Acquisition started");

    let stop_reason = loop {
        if cancel.is_cancelled() {
            break StopReason::Stopped;
        }
        if !link.is_connected().await {
            break StopReason::Disconnected;
        }

        if let Some(raw) = link.latest_sample() {
            let elapsed = round_elapsed(t0.elapsed());
            if let Some(sample) = raw.validated(elapsed) {
                series.append(&sample);
                if verbose {
                    info!(
                        "Pulse: {} bpm, SpO2: {}%",
                        sample.pulse_rate, sample.spo2
                    );
                }
            } else {
                debug!("Dropped invalid frame at {elapsed:.2}s");
            }
            raw_log.push(RawRecord {
                elapsed,
                sample: raw,
            });
        }

        if let Some(limit) = duration {
            if t0.elapsed() > limit {
                info!("Time limit reached after {:.2}s", t0.elapsed().as_secs_f64());
                break StopReason::DurationElapsed;
            }
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    };

    if !link.is_connected().await {
        info!("Peripheral disconnected");
        let _ = link.disconnect().await;
    }

    info!(
        "Acquisition finished: {} valid of {} pulled frames",
        series.len(),
        raw_log.len()
    );

    AcquisitionRun {
        series,
        raw_log,
        stop_reason,
    }
}
