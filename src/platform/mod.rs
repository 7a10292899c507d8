//! OS capabilities consumed by the copy engine
//!
//! The engine never talks to the platform directly. Drive classification,
//! timestamp access and mutating filesystem calls sit behind small traits so
//! each OS gets its own implementation and tests can inject failures.

pub mod drive;
pub mod fs;
pub mod timestamps;

pub use drive::{DriveClassifier, MountEntry, MountTable, NativeDriveClassifier};
pub use fs::{FileOps, StdFileOps};
pub use timestamps::{FileTimestamps, NativeTimestamps, Timestamp, TimestampAccessor};
