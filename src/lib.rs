//! # stagecopy - Safe single-file copies with staged backups
//!
//! Small local files are written next to the target and renamed into place.
//! Large files and anything on a network share go through the staged path:
//! the existing target is renamed to a backup, the new content is copied and
//! verified, and the backup is renamed back if anything fails.

// Module declarations
pub mod commands;
pub mod config;
pub mod engine;
pub mod executor;
pub mod platform;
pub mod scanner;
pub mod session;
pub mod types;
pub mod ui;

// Re-export commonly used types
pub use config::Config;
pub use engine::{CopyEngine, EngineSettings};
pub use session::{end_copy_operation, start_copy_operation, OperationSession, SessionSummary};
pub use types::{CopyError, CopyErrorKind, CopyResult, CopyStrategy, DriveClass};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
