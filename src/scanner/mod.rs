//! Source enumeration

mod walker;

pub use walker::{enumerate_files, FileList, ProgressCallback};
