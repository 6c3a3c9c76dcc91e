//! Progress reporting.
//!
//! The worker only ever adds to an atomic byte counter and announces file
//! names over a channel. A separate reporter thread turns that into immutable
//! [`ProgressSample`]s on a timer and pushes them to a [`ProgressSink`], so the
//! sink never sees engine internals and never blocks the copy loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{after, bounded, select, tick, Receiver, Sender};
use tracing::{debug, warn};

use crate::model::ProgressSample;

/// Receiver of periodic progress samples.
///
/// Called from the reporter thread, never from the worker.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, sample: ProgressSample);
}

/// Forward samples into a channel, e.g. to a UI event loop.
impl ProgressSink for Sender<ProgressSample> {
    fn on_progress(&self, sample: ProgressSample) {
        // A closed receiver means nobody is watching anymore
        let _ = self.send(sample);
    }
}

/// Sink that drops every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _sample: ProgressSample) {}
}

/// Worker-side half of the progress plumbing.
#[derive(Debug)]
pub struct ProgressCounter {
    bytes_done: Arc<AtomicU64>,
    filenames: Sender<String>,
    // Second receiver on the single-slot channel, used to evict a stale name
    stale: Receiver<String>,
}

impl ProgressCounter {
    /// Create a counter and the receiver the reporter reads file names from.
    pub fn channel() -> (Self, ProgressSource) {
        let bytes_done = Arc::new(AtomicU64::new(0));
        let (filenames, filename_rx) = bounded(1);
        let counter = ProgressCounter {
            bytes_done: Arc::clone(&bytes_done),
            filenames,
            stale: filename_rx.clone(),
        };
        let source = ProgressSource {
            bytes_done,
            filenames: filename_rx,
        };
        (counter, source)
    }

    /// Account for `bytes` more bytes.
    pub fn add(&self, bytes: u64) {
        self.bytes_done.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bytes accounted for so far.
    pub fn bytes_done(&self) -> u64 {
        self.bytes_done.load(Ordering::Relaxed)
    }

    /// Announce the file now being copied.
    ///
    /// Only the latest name is kept, whether or not a reporter is reading.
    pub fn set_filename(&self, name: &str) {
        let _ = self.stale.try_recv();
        let _ = self.filenames.try_send(name.to_string());
    }
}

/// Reporter-side half of the progress plumbing.
#[derive(Debug)]
pub struct ProgressSource {
    bytes_done: Arc<AtomicU64>,
    filenames: Receiver<String>,
}

impl ProgressSource {
    fn sample(&self, current_filename: &mut String, bytes_total: u64) -> ProgressSample {
        if let Some(latest) = self.filenames.try_iter().last() {
            *current_filename = latest;
        }
        ProgressSample {
            current_filename: current_filename.clone(),
            bytes_done: self.bytes_done.load(Ordering::Relaxed),
            bytes_total,
        }
    }
}

/// Timer thread pushing samples to a sink.
///
/// Stopped by [`stop`](Self::stop) or on drop.
pub struct ProgressReporter {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Start the timer. The first sample fires after `initial_delay`, then
    /// every `interval` until stopped.
    pub fn start(
        source: ProgressSource,
        bytes_total: u64,
        sink: Arc<dyn ProgressSink>,
        initial_delay: Duration,
        interval: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let spawned = thread::Builder::new()
            .name("transfer-progress".to_string())
            .spawn(move || report_loop(source, bytes_total, sink, stop_rx, initial_delay, interval));

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "could not start progress reporter; continuing without progress");
                None
            }
        };

        ProgressReporter {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Stop the timer and wait for the thread to exit.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("progress reporter panicked");
            }
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn report_loop(
    source: ProgressSource,
    bytes_total: u64,
    sink: Arc<dyn ProgressSink>,
    stop: Receiver<()>,
    initial_delay: Duration,
    interval: Duration,
) {
    select! {
        recv(stop) -> _ => return,
        recv(after(initial_delay)) -> _ => {}
    }

    debug!("progress reporting started");
    let ticker = tick(interval);
    let mut current_filename = String::new();
    loop {
        sink.on_progress(source.sample(&mut current_filename, bytes_total));
        select! {
            recv(stop) -> _ => return,
            recv(ticker) -> _ => {}
        }
    }
}
