//! Copy strategies and drive classes

use serde::Serialize;
use std::fmt;

/// How a single file is moved from source to target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CopyStrategy {
    /// Whole-file copy through a temporary sibling, for small local files
    Direct,

    /// Rename-based backup of the existing target, copy, verify, rollback on failure
    Staged,
}

impl CopyStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            CopyStrategy::Direct => "Direct",
            CopyStrategy::Staged => "Staged",
        }
    }
}

impl fmt::Display for CopyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Volume class a path lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DriveClass {
    LocalFixed,
    LocalRemovable,
    /// Network filesystem reached through a local mount or drive letter
    NetworkMapped,
    /// `\\server\share` or `//server/share`
    NetworkUNC,
    Relative,
    Unknown,
}

impl DriveClass {
    /// Whether the path lives on a network volume
    pub fn is_network(self) -> bool {
        matches!(self, DriveClass::NetworkMapped | DriveClass::NetworkUNC)
    }
}

impl fmt::Display for DriveClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriveClass::LocalFixed => "local-fixed",
            DriveClass::LocalRemovable => "local-removable",
            DriveClass::NetworkMapped => "network-mapped",
            DriveClass::NetworkUNC => "network-unc",
            DriveClass::Relative => "relative",
            DriveClass::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
