//! # Ferry Engine - Bulk Copy/Move Library
//!
//! A headless engine that copies or moves a batch of files and directory
//! trees into one destination directory, across local paths and virtual
//! document-tree storage. Designed as the foundation for any host UI.
//!
//! ## Overview
//!
//! The engine provides:
//! - One-shot size estimation before the first byte moves
//! - Per-path conflict resolution (skip or overwrite) decided up front
//! - Lazy directory expansion and block-wise streaming
//! - Move semantics that only delete fully transferred sources
//! - Throttled progress samples and a weak completion listener
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ferry_engine::{
//!     CompletionListener, FileEntry, ListenerHandle, LocalStorage, Mode, NoProgress,
//!     TransferConfig, TransferEngine, TransferRequest,
//! };
//!
//! struct Printer;
//!
//! impl CompletionListener for Printer {
//!     fn on_copy_succeeded(&self, _copy_only: bool, all_transferred: bool, destination: &str) {
//!         println!("done -> {} (complete: {})", destination, all_transferred);
//!     }
//!
//!     fn on_copy_failed(&self, message: &str) {
//!         eprintln!("failed: {}", message);
//!     }
//! }
//!
//! let engine = TransferEngine::new(Arc::new(LocalStorage::new()), TransferConfig::default());
//! let request = TransferRequest::new(
//!     vec![FileEntry::directory("/home/me/photos")],
//!     "/mnt/backup",
//!     Mode::Copy,
//! );
//!
//! let listener: Arc<dyn CompletionListener> = Arc::new(Printer);
//! let result = engine.run(request, Arc::new(NoProgress), ListenerHandle::from_arc(&listener));
//! println!("{} of {} transferred", result.transferred_top_level_count, result.expected_count);
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (FileEntry, TransferRequest, TransferResult)
//! - **error**: Error types and handling
//! - **storage**: The storage accessor seam, with local, in-memory and routing implementations
//! - **conflict**: Conflict resolution lookup
//! - **estimate**: Size estimation
//! - **engine**: The transfer engine
//! - **progress**: Progress sampling and sinks
//! - **listener**: Completion listener and weak handle
//! - **config**: Engine configuration

pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod listener;
pub mod local;
pub mod media;
pub mod memory;
pub mod model;
pub mod paths;
pub mod progress;
pub mod routing;
pub mod storage;

// Re-export main types
pub use config::TransferConfig;
pub use engine::TransferEngine;
pub use error::EngineError;
pub use estimate::SizeEstimate;
pub use listener::{CompletionListener, ListenerHandle};
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use model::{
    ConflictAction, ConflictResolutionTable, FileEntry, Mode, ProgressSample, Resolution, TransferRequest,
    TransferResult,
};
pub use progress::{NoProgress, ProgressSink};
pub use routing::RoutingStorage;
pub use storage::{DirHandle, StorageAccessor};
