#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod classifier;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod disk;
pub mod engine;
pub mod error;
pub mod guard;
pub mod locator;
pub mod media;
pub mod naming;
pub mod transfer;

pub use classifier::{classify, classify_path, detect, detect_path};
pub use cleanup::{CleanupReport, purge_source};
pub use cli::{Cli, Commands, KindArg, Overrides, default_config_path};
pub use config::{ConfigError, CopyConfig, EngineConfig};
pub use disk::{DiskOperations, RealDisk};
pub use engine::{MoveEngine, MovePlan};
pub use error::{MoveError, Result};
pub use guard::validate_within;
pub use media::{Classification, LibraryRoots, MediaKind, MoveOptions, MoveOutcome, MoveRequest};
pub use naming::{MovieLayout, MovieNaming, TvNaming, sanitize_filename};
pub use transfer::{
    CopyTool, FileTransfer, ProgressEvent, ProgressSink, SubtitleTransfer, TransferOrchestrator,
    TransferState, Verification,
};
