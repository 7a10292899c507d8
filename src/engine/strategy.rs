//! Strategy selection

use crate::types::{CopyStrategy, DriveClass};

/// Default size at which copies switch to the staged strategy (10 MiB)
pub const DEFAULT_STRATEGY_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Pick a strategy from drive classes and file size
///
/// Rules, in order: a network volume on either side means `Staged`; a file
/// at or above `threshold` means `Staged`; everything else is `Direct`.
pub fn select_strategy(
    source_class: DriveClass,
    target_class: DriveClass,
    file_size: u64,
    threshold: u64,
) -> CopyStrategy {
    let network = source_class.is_network() || target_class.is_network();
    if network || file_size >= threshold {
        CopyStrategy::Staged
    } else {
        CopyStrategy::Direct
    }
}
