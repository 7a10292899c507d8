//! Core type definitions for stagecopy

mod error;
mod result;
mod strategy;

pub use error::{CopyError, CopyErrorKind};
pub use result::CopyResult;
pub use strategy::{CopyStrategy, DriveClass};
