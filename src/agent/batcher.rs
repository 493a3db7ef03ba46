use super::labels::{is_equal_label, label_set_hash};
use super::ProfileStoreWriter;
use crate::profilestorepb::{RawProfileSeries, WriteRawRequest, WriteRawResponse};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tonic::Status;

pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum BatcherError {
    #[error("batcher cancelled")]
    Cancelled,
}

/// Outcome of the most recent flush attempt.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub last_batch_sent_at: Option<DateTime<Utc>>,
    pub last_batch_send_error: Option<Arc<Status>>,
}

impl BatchReport {
    pub fn is_ok(&self) -> bool {
        self.last_batch_send_error.is_none()
    }
}

/// Pending series, one per distinct label set, in arrival order.
#[derive(Debug, Default)]
struct SeriesBuffer {
    series: Vec<RawProfileSeries>,
    // label set hash -> positions in `series`
    index: HashMap<u64, Vec<usize>>,
}

impl SeriesBuffer {
    fn merge(&mut self, incoming: RawProfileSeries) {
        let h = label_set_hash(incoming.labels.as_ref());
        let bucket = self.index.entry(h).or_default();

        let existing = bucket.iter().copied().find(|&i| {
            is_equal_label(self.series[i].labels.as_ref(), incoming.labels.as_ref())
        });

        match existing {
            Some(i) => self.series[i].samples.extend(incoming.samples),
            None => {
                bucket.push(self.series.len());
                self.series.push(RawProfileSeries {
                    labels: incoming.labels,
                    samples: incoming.samples,
                });
            }
        }
    }

    fn take(&mut self) -> Vec<RawProfileSeries> {
        self.index.clear();
        std::mem::take(&mut self.series)
    }

    // Puts back series previously taken out. The buffer must be empty.
    fn restore(&mut self, series: Vec<RawProfileSeries>) {
        self.index.clear();
        for (i, s) in series.iter().enumerate() {
            self.index
                .entry(label_set_hash(s.labels.as_ref()))
                .or_default()
                .push(i);
        }
        self.series = series;
    }
}

/// Batcher buffers profiles written to it and forwards them to the profile
/// store on a fixed interval.
///
/// The buffer lock is held for the whole remote call, so writes block while a
/// batch is in flight and nothing written can slip between send and clear.
pub struct Batcher {
    buffer: Mutex<SeriesBuffer>,
    write_client: Box<dyn ProfileStoreWriter>,
    interval: Duration,
    report: RwLock<BatchReport>,
}

impl Batcher {
    pub fn new(write_client: Box<dyn ProfileStoreWriter>) -> Self {
        Self::with_interval(write_client, DEFAULT_BATCH_INTERVAL)
    }

    pub fn with_interval(write_client: Box<dyn ProfileStoreWriter>, interval: Duration) -> Self {
        Self {
            buffer: Mutex::new(SeriesBuffer::default()),
            write_client,
            interval,
            report: RwLock::new(BatchReport::default()),
        }
    }

    /// Merges incoming series into the buffer. Samples of a series whose label
    /// set is already buffered are appended after the buffered ones.
    pub async fn ingest(&self, series: Vec<RawProfileSeries>) {
        let mut buffer = self.buffer.lock().await;
        let n = series.len();
        for s in series {
            buffer.merge(s);
        }
        log::debug!(
            "Merged {} series, {} pending in batch",
            n,
            buffer.series.len()
        );
    }

    /// Takes everything buffered so far and leaves the buffer empty.
    pub async fn drain(&self) -> Vec<RawProfileSeries> {
        self.buffer.lock().await.take()
    }

    /// Number of distinct series waiting to be sent.
    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.series.len()
    }

    pub fn report(&self) -> BatchReport {
        match self.report.read() {
            Ok(report) => report.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Runs the flush loop until `ctx` is cancelled. The first flush happens
    /// one interval after start. Cancellation does not interrupt a flush in
    /// progress and does not trigger a final one.
    pub async fn run(&self, ctx: CancellationToken) -> Result<(), BatcherError> {
        log::info!("Starting batcher with interval {:?}", self.interval);

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    log::info!("Batcher stopped");
                    return Err(BatcherError::Cancelled);
                }
                _ = ticker.tick() => {}
            }

            self.flush().await.ok();
        }
    }

    /// Sends the buffered series to the profile store and records the outcome.
    /// The buffer is only cleared if the send succeeded.
    pub async fn flush(&self) -> Result<(), Arc<Status>> {
        let result = self.batch_loop().await.map_err(Arc::new);
        self.loop_report(Utc::now(), result.as_ref().err().cloned());
        result
    }

    async fn batch_loop(&self) -> Result<(), Status> {
        let mut buffer = self.buffer.lock().await;

        let request = WriteRawRequest {
            series: buffer.take(),
            ..Default::default()
        };

        if let Err(e) = self.write_client.write_raw(&request).await {
            log::error!(
                "Writeclient failed to send profiles: code={:?} msg={}",
                e.code(),
                e.message()
            );
            // Still locked, so nothing was merged in the meantime.
            buffer.restore(request.series);
            return Err(e);
        }

        log::debug!("Sent batch of {} series", request.series.len());
        Ok(())
    }

    fn loop_report(&self, sent_at: DateTime<Utc>, err: Option<Arc<Status>>) {
        let mut report = match self.report.write() {
            Ok(report) => report,
            Err(poisoned) => poisoned.into_inner(),
        };
        report.last_batch_sent_at = Some(sent_at);
        report.last_batch_send_error = err;
    }
}

#[tonic::async_trait]
impl ProfileStoreWriter for Batcher {
    async fn write_raw(&self, request: &WriteRawRequest) -> Result<WriteRawResponse, Status> {
        self.ingest(request.series.clone()).await;
        Ok(WriteRawResponse {})
    }
}
