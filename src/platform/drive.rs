//! Drive classification
//!
//! Decides whether a path lives on a local or a network volume. Relative
//! paths are reported as such rather than resolved against the working
//! directory.

use crate::types::DriveClass;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Classify the volume a path lives on
pub trait DriveClassifier: Send + Sync {
    fn classify(&self, path: &Path) -> DriveClass;
}

/// Filesystem types reached over the network
const NETWORK_FS_TYPES: &[&str] = &[
    "nfs",
    "nfs4",
    "cifs",
    "smb3",
    "smbfs",
    "ncpfs",
    "afs",
    "9p",
    "ceph",
    "glusterfs",
    "lustre",
    "davfs",
    "fuse.sshfs",
    "fuse.rclone",
    "fuse.davfs2",
];

/// Per-OS classifier
///
/// On Linux the mount table is read once at construction; a table that
/// cannot be read makes every absolute path `Unknown`.
#[derive(Debug, Clone)]
pub struct NativeDriveClassifier {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    mounts: Option<MountTable>,
}

impl NativeDriveClassifier {
    pub fn new() -> Self {
        #[cfg(target_os = "linux")]
        let mounts = match MountTable::load() {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::warn!(error = %e, "could not read mount table; drive classes will be unknown");
                None
            }
        };
        #[cfg(not(target_os = "linux"))]
        let mounts = None;

        Self { mounts }
    }

    /// Classifier over an explicit mount table
    pub fn with_mount_table(table: MountTable) -> Self {
        Self {
            mounts: Some(table),
        }
    }
}

impl Default for NativeDriveClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClassifier for NativeDriveClassifier {
    fn classify(&self, path: &Path) -> DriveClass {
        if is_unc_like(path) {
            return DriveClass::NetworkUNC;
        }
        if !path.is_absolute() {
            return DriveClass::Relative;
        }
        self.classify_absolute(path)
    }
}

impl NativeDriveClassifier {
    #[cfg(target_os = "linux")]
    fn classify_absolute(&self, path: &Path) -> DriveClass {
        match &self.mounts {
            Some(table) => classify_mounted(path, table, device_is_removable),
            None => DriveClass::Unknown,
        }
    }

    #[cfg(target_os = "macos")]
    fn classify_absolute(&self, path: &Path) -> DriveClass {
        if path.starts_with("/Volumes") {
            DriveClass::LocalRemovable
        } else {
            DriveClass::LocalFixed
        }
    }

    #[cfg(windows)]
    fn classify_absolute(&self, path: &Path) -> DriveClass {
        use std::path::{Component, Prefix};

        match path.components().next() {
            Some(Component::Prefix(prefix)) => match prefix.kind() {
                Prefix::UNC(..) | Prefix::VerbatimUNC(..) => DriveClass::NetworkUNC,
                Prefix::Disk(letter) | Prefix::VerbatimDisk(letter) => windows::drive_type(letter),
                _ => DriveClass::Unknown,
            },
            _ => DriveClass::Relative,
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    fn classify_absolute(&self, _path: &Path) -> DriveClass {
        DriveClass::Unknown
    }
}

/// `\\server\share` on any platform, `//server/share` where it names a share
fn is_unc_like(path: &Path) -> bool {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix(r"\\") {
        return is_share_name(rest);
    }
    match text.strip_prefix("//") {
        Some(rest) => is_share_name(rest) && !is_local_root_entry(rest),
        None => false,
    }
}

fn is_share_name(rest: &str) -> bool {
    // `\\?\C:\...` is a verbatim local path, not a share
    !rest.is_empty() && !rest.starts_with(['?', '.', '/', '\\'])
}

/// Outside Windows the kernel reads `//home/u` as `/home/u`
#[cfg(not(windows))]
fn is_local_root_entry(rest: &str) -> bool {
    let first = rest.split(['/', '\\']).next().unwrap_or(rest);
    Path::new("/").join(first).exists()
}

#[cfg(windows)]
fn is_local_root_entry(_rest: &str) -> bool {
    false
}

/// Classify an absolute path against a mount table
pub fn classify_mounted(
    path: &Path,
    table: &MountTable,
    is_removable: impl Fn(&str) -> bool,
) -> DriveClass {
    let Some(entry) = table.find(path) else {
        return DriveClass::Unknown;
    };

    if entry.is_network() {
        DriveClass::NetworkMapped
    } else if is_removable(&entry.device) {
        DriveClass::LocalRemovable
    } else {
        DriveClass::LocalFixed
    }
}

/// Read the sysfs `removable` flag for a `/dev/...` block device or its
/// parent disk.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn device_is_removable(device: &str) -> bool {
    let Some(name) = device.strip_prefix("/dev/") else {
        return false;
    };
    let block = Path::new("/sys/class/block").join(name);
    [block.join("removable"), block.join("../removable")]
        .iter()
        .filter_map(|flag| fs::read_to_string(flag).ok())
        .any(|value| value.trim() == "1")
}

/// One line of `/proc/mounts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

impl MountEntry {
    pub fn is_network(&self) -> bool {
        NETWORK_FS_TYPES.contains(&self.fs_type.as_str()) || self.device.starts_with("//")
    }
}

/// Parsed mount table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    /// Parse `/proc/mounts` format: `device mount_point fs_type options dump pass`
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device = fields.next()?;
                let mount_point = fields.next()?;
                let fs_type = fields.next()?;
                Some(MountEntry {
                    device: unescape_mount_field(device),
                    mount_point: PathBuf::from(unescape_mount_field(mount_point)),
                    fs_type: fs_type.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn load() -> io::Result<Self> {
        fs::read_to_string("/proc/self/mounts").map(|text| Self::parse(&text))
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// Entry with the longest mount point containing `path`. Later entries
    /// win ties, matching mount stacking order.
    pub fn find(&self, path: &Path) -> Option<&MountEntry> {
        self.entries
            .iter()
            .filter(|entry| path.starts_with(&entry.mount_point))
            .fold(None, |best: Option<&MountEntry>, entry| match best {
                Some(current)
                    if current.mount_point.components().count()
                        > entry.mount_point.components().count() =>
                {
                    Some(current)
                }
                _ => Some(entry),
            })
    }
}

/// Undo the octal escapes (`\040` for space, ...) the kernel writes
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let escaped = bytes
                .get(i + 1..i + 4)
                .filter(|digits| digits.iter().all(|b| (b'0'..=b'7').contains(b)))
                .and_then(|digits| std::str::from_utf8(digits).ok())
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = escaped {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(windows)]
mod windows {
    use crate::types::DriveClass;
    use windows_sys::Win32::Storage::FileSystem::GetDriveTypeW;

    // GetDriveTypeW return codes
    const DRIVE_REMOVABLE: u32 = 2;
    const DRIVE_FIXED: u32 = 3;
    const DRIVE_REMOTE: u32 = 4;
    const DRIVE_CDROM: u32 = 5;
    const DRIVE_RAMDISK: u32 = 6;

    pub(super) fn drive_type(letter: u8) -> DriveClass {
        let root: Vec<u16> = format!("{}:\\", letter as char)
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();
        let kind = unsafe { GetDriveTypeW(root.as_ptr()) };
        match kind {
            DRIVE_REMOVABLE | DRIVE_CDROM => DriveClass::LocalRemovable,
            DRIVE_FIXED | DRIVE_RAMDISK => DriveClass::LocalFixed,
            DRIVE_REMOTE => DriveClass::NetworkMapped,
            _ => DriveClass::Unknown,
        }
    }
}
