//! Transfer engine.
//!
//! Runs one [`TransferRequest`] to completion:
//! - Estimating the total volume once, before the first byte moves
//! - Resolving top-level conflicts against the request's resolution table
//! - Expanding directories lazily and streaming files block by block
//! - Tracking which items were fully transferred
//! - Deleting transferred sources when moving
//!
//! A fatal error on any source aborts the whole run. Nothing already written
//! is rolled back.

use std::collections::{HashMap, HashSet};
use std::error::Error as _;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::TransferConfig;
use crate::conflict;
use crate::error::{EngineError, Result};
use crate::estimate;
use crate::listener::ListenerHandle;
use crate::media;
use crate::model::{FileEntry, Resolution, TransferRequest, TransferResult};
use crate::paths;
use crate::progress::{ProgressCounter, ProgressReporter, ProgressSink};
use crate::storage::{self, DirHandle, StorageAccessor};

/// Copy/move engine over a storage accessor.
#[derive(Clone)]
pub struct TransferEngine {
    storage: Arc<dyn StorageAccessor>,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(storage: Arc<dyn StorageAccessor>, config: TransferConfig) -> Self {
        TransferEngine { storage, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Run `request` on a dedicated worker thread.
    pub fn spawn(
        &self,
        request: TransferRequest,
        progress: Arc<dyn ProgressSink>,
        listener: ListenerHandle,
    ) -> Result<JoinHandle<TransferResult>> {
        let engine = self.clone();
        thread::Builder::new()
            .name("transfer-worker".to_string())
            .spawn(move || engine.run(request, progress, listener))
            .map_err(|e| EngineError::Unknown {
                message: format!("could not start transfer worker: {}", e),
            })
    }

    /// Run `request` on the calling thread.
    ///
    /// Progress samples are pushed to `progress` from a timer thread while
    /// the run is in flight; exactly one terminal event goes to `listener`.
    /// An invalid config fails the run before anything is touched.
    pub fn run(
        &self,
        request: TransferRequest,
        progress: Arc<dyn ProgressSink>,
        listener: ListenerHandle,
    ) -> TransferResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("transfer", %run_id, mode = %request.mode);
        let _guard = span.enter();

        let started_at = Utc::now();
        info!(
            sources = request.sources.len(),
            destination = %request.destination,
            "transfer started"
        );

        let (counter, source) = ProgressCounter::channel();
        let mut run = TransferRun {
            storage: Arc::clone(&self.storage),
            config: &self.config,
            request: &request,
            counter,
            listener: &listener,
            transferred: Vec::new(),
            top_level_done: 0,
            expected_count: request.sources.len(),
            handles: HashMap::new(),
        };

        let mut sources = request.sources.clone();
        let outcome = self
            .config
            .validate()
            .and_then(|()| {
                estimate::estimate(
                    self.storage.as_ref(),
                    &mut sources,
                    &request.destination,
                    &request.resolutions,
                    request.include_hidden,
                )
            })
            .and_then(|total| {
                debug!(bytes = total.bytes, "size estimate");
                let _reporter = ProgressReporter::start(
                    source,
                    total.bytes,
                    progress,
                    self.config.initial_progress_delay(),
                    self.config.progress_interval(),
                );
                run.execute(&sources)
            });

        let result = TransferResult {
            run_id,
            success: outcome.is_ok(),
            transferred_top_level_count: run.top_level_done,
            expected_count: run.expected_count,
            destination_directory: request.destination.clone(),
            transferred: run.transferred,
            error: outcome.as_ref().err().map(describe),
            started_at,
            finished_at: Utc::now(),
        };

        match &outcome {
            Ok(()) => {
                info!(
                    transferred = result.transferred_top_level_count,
                    expected = result.expected_count,
                    "transfer finished"
                );
                let copy_only = request.is_copy_only();
                let all_transferred = result.all_transferred();
                listener.notify(|l| l.on_copy_succeeded(copy_only, all_transferred, &request.destination));
            }
            Err(e) => {
                let message = describe(e);
                error!(error = %message, "transfer aborted");
                listener.notify(|l| l.on_copy_failed(&message));
            }
        }

        result
    }
}

/// Error text including the underlying cause, if any.
fn describe(err: &EngineError) -> String {
    match err.source() {
        Some(cause) => format!("{}: {}", err, cause),
        None => err.to_string(),
    }
}

/// Mutable state of one run, owned by the worker.
struct TransferRun<'a> {
    storage: Arc<dyn StorageAccessor>,
    config: &'a TransferConfig,
    request: &'a TransferRequest,
    counter: ProgressCounter,
    listener: &'a ListenerHandle,
    transferred: Vec<FileEntry>,
    top_level_done: usize,
    expected_count: usize,
    handles: HashMap<String, Option<DirHandle>>,
}

impl TransferRun<'_> {
    fn execute(&mut self, sources: &[FileEntry]) -> Result<()> {
        for source in sources {
            self.transfer_top_level(source)?;
        }

        if !self.request.is_copy_only() {
            self.delete_transferred();
        }
        Ok(())
    }

    fn transfer_top_level(&mut self, source: &FileEntry) -> Result<()> {
        let target = paths::join(&self.request.destination, &source.name);
        if target != source.path && paths::is_within(&target, &source.path) {
            return Err(EngineError::invalid(target, "destination is inside the source"));
        }

        if self.storage.exists(&target) {
            match conflict::resolve(&target, true, &self.request.resolutions) {
                Resolution::Skip => {
                    debug!(source = %source.path, "destination exists, skipping");
                    self.expected_count -= 1;
                    return Ok(());
                }
                Resolution::Overwrite => {
                    if paths::is_within(&source.path, &target) {
                        return Err(EngineError::invalid(target, "overwriting would delete the source"));
                    }
                    let existing = self.storage.stat(&target)?;
                    debug!(destination = %target, is_dir = existing.is_dir, "overwriting");
                    self.storage.delete_recursive(&existing)?;
                }
                Resolution::NoConflict => {}
            }
        }

        if self.copy(source, &target)? {
            self.top_level_done += 1;
        }
        Ok(())
    }

    /// Returns true once `source` is marked transferred.
    fn copy(&mut self, source: &FileEntry, target: &str) -> Result<bool> {
        if source.is_dir {
            self.copy_directory(source, target)
        } else {
            self.copy_file(source, target)
        }
    }

    fn copy_directory(&mut self, source: &FileEntry, target: &str) -> Result<bool> {
        if let Err(e) = self.storage.create_directory(target) {
            self.warn(format!("Could not create folder {}: {}", target, describe(&e)));
            return Ok(false);
        }

        let mut complete = true;
        for child in self.storage.list_children(&source.path)? {
            let child_target = paths::join(target, &child.name);
            if self.storage.exists(&child_target) {
                debug!(destination = %child_target, "already present, leaving in place");
                complete = false;
                continue;
            }
            if !self.copy(&child, &child_target)? {
                complete = false;
            }
        }

        if complete {
            self.transferred.push(source.clone());
        }
        Ok(complete)
    }

    fn copy_file(&mut self, source: &FileEntry, target: &str) -> Result<bool> {
        let size = match source.size {
            Some(size) => size,
            None => self.storage.resolve_size(source, self.request.include_hidden)?,
        };

        if self.request.media_only && !media::is_image_video_gif(&source.path) {
            debug!(source = %source.path, "not a media file, skipping");
            self.counter.add(size);
            return Ok(false);
        }

        let dir = paths::parent(target).ok_or_else(|| EngineError::invalid(target, "no parent directory"))?;
        if let Err(e) = self.storage.create_directory(dir) {
            self.warn(format!("Could not create folder {}: {}", dir, describe(&e)));
            self.counter.add(size);
            return Ok(false);
        }

        self.counter.set_filename(&source.name);
        let handle = self.parent_handle(dir, target)?;
        let mut input = self.storage.open_read(&source.path)?;
        let mut output = self
            .storage
            .open_write(target, &media::mime_hint(&source.path), handle)?;

        let copied = self.stream(&mut input, &mut output, source, target)?;
        drop(input);
        drop(output);

        if copied != size {
            warn!(source = %source.path, expected = size, copied, "size mismatch, not marking transferred");
            return Ok(false);
        }

        self.transferred.push(source.clone());
        self.after_copy(&source.path, target);
        Ok(true)
    }

    fn stream(
        &self,
        input: &mut impl Read,
        output: &mut impl Write,
        source: &FileEntry,
        target: &str,
    ) -> Result<u64> {
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut copied = 0u64;
        loop {
            let read = match input.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(EngineError::read(source.path.as_str(), e)),
            };
            output
                .write_all(&buffer[..read])
                .map_err(|e| EngineError::write(target, e))?;
            copied += read as u64;
            self.counter.add(read as u64);
        }
        output.flush().map_err(|e| EngineError::write(target, e))?;
        Ok(copied)
    }

    /// Cached parent handle for writes into `dir`.
    fn parent_handle(&mut self, dir: &str, target: &str) -> Result<Option<DirHandle>> {
        if !self.handles.contains_key(dir) && self.storage.needs_directory_handle(target) {
            let handle = self.storage.directory_handle(dir)?;
            self.handles.insert(dir.to_string(), handle);
        }
        Ok(self.handles.get(dir).cloned().flatten())
    }

    /// Index the new file, then optionally carry over its timestamp.
    fn after_copy(&self, source: &str, target: &str) {
        let keep_last_modified = self.config.keep_last_modified;
        let accessor = Arc::clone(&self.storage);
        let source = source.to_string();
        let destination = target.to_string();

        self.storage.notify_indexed(
            target,
            Box::new(move || {
                if !keep_last_modified {
                    return;
                }
                if let Err(e) = storage::copy_modified(accessor.as_ref(), &source, &destination) {
                    debug!(destination = %destination, error = %e, "could not keep last modified time");
                }
            }),
        );
    }

    fn delete_transferred(&self) {
        let dirs: HashSet<&str> = self
            .transferred
            .iter()
            .filter(|entry| entry.is_dir)
            .map(|entry| entry.path.as_str())
            .collect();

        for entry in &self.transferred {
            if covered_by(&entry.path, &dirs) {
                continue;
            }
            debug!(source = %entry.path, "deleting moved source");
            if let Err(e) = self.storage.delete_recursive(entry) {
                self.warn(format!("Could not delete {}: {}", entry.path, describe(&e)));
            }
        }
    }

    fn warn(&self, message: String) {
        warn!("{}", message);
        self.listener.notify(|l| l.on_warning(&message));
    }
}

/// True if some ancestor of `path` is in `dirs`.
fn covered_by(path: &str, dirs: &HashSet<&str>) -> bool {
    let mut current = paths::parent(path);
    while let Some(dir) = current {
        if dirs.contains(dir) {
            return true;
        }
        current = paths::parent(dir);
    }
    false
}
