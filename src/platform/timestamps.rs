//! Creation/modification time access with sub-second precision

use crate::types::CopyError;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// A point in time accepted by [`TimestampAccessor::set_timestamps`]
///
/// Timezone-aware values convert directly. Naive values are interpreted in
/// the local timezone; a local time that does not exist (DST gap) is
/// rejected, an ambiguous one resolves to the earlier instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(SystemTime);

impl Timestamp {
    pub fn as_system_time(self) -> SystemTime {
        self.0
    }

    pub fn from_naive_local(naive: NaiveDateTime) -> Result<Self, CopyError> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(Self::from)
            .ok_or_else(|| {
                CopyError::Validation(format!("{} does not exist in the local timezone", naive))
            })
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self(time)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp {
    fn from(time: DateTime<Tz>) -> Self {
        Self(SystemTime::from(time))
    }
}

impl TryFrom<NaiveDateTime> for Timestamp {
    type Error = CopyError;

    fn try_from(naive: NaiveDateTime) -> Result<Self, Self::Error> {
        Self::from_naive_local(naive)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(time: Timestamp) -> Self {
        time.0
    }
}

/// Creation and modification time of a file
///
/// `created` is `None` where the platform cannot write creation times, so a
/// copy's timestamps compare equal to its source's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimestamps {
    pub created: Option<SystemTime>,
    pub modified: SystemTime,
}

/// Read and write file timestamps
pub trait TimestampAccessor: Send + Sync {
    fn get_timestamps(&self, path: &Path) -> io::Result<FileTimestamps>;

    fn set_timestamps(
        &self,
        path: &Path,
        created: Option<Timestamp>,
        modified: Timestamp,
    ) -> io::Result<()>;

    /// Apply a previously read snapshot
    fn restore_timestamps(&self, path: &Path, times: &FileTimestamps) -> io::Result<()> {
        self.set_timestamps(
            path,
            times.created.map(Timestamp::from),
            Timestamp::from(times.modified),
        )
    }

    fn copy_timestamps(&self, source: &Path, target: &Path) -> io::Result<()> {
        let times = self.get_timestamps(source)?;
        self.restore_timestamps(target, &times)
    }
}

/// Native implementation: `filetime` for mtime, std `FileTimesExt` for
/// creation time where the OS allows writing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTimestamps;

impl NativeTimestamps {
    pub const fn supports_creation_time() -> bool {
        cfg!(any(windows, target_os = "macos"))
    }
}

impl TimestampAccessor for NativeTimestamps {
    fn get_timestamps(&self, path: &Path) -> io::Result<FileTimestamps> {
        let metadata = fs::metadata(path)?;
        let created = if Self::supports_creation_time() {
            metadata.created().ok()
        } else {
            None
        };
        Ok(FileTimestamps {
            created,
            modified: metadata.modified()?,
        })
    }

    fn set_timestamps(
        &self,
        path: &Path,
        created: Option<Timestamp>,
        modified: Timestamp,
    ) -> io::Result<()> {
        filetime::set_file_mtime(path, FileTime::from_system_time(modified.into()))?;
        if let Some(created) = created {
            set_creation_time(path, created.into())?;
        }
        Ok(())
    }
}

#[cfg(windows)]
fn set_creation_time(path: &Path, created: SystemTime) -> io::Result<()> {
    use std::os::windows::fs::FileTimesExt;

    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_times(fs::FileTimes::new().set_created(created))
}

#[cfg(target_os = "macos")]
fn set_creation_time(path: &Path, created: SystemTime) -> io::Result<()> {
    use std::os::macos::fs::FileTimesExt;

    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_times(fs::FileTimes::new().set_created(created))
}

#[cfg(not(any(windows, target_os = "macos")))]
fn set_creation_time(path: &Path, _created: SystemTime) -> io::Result<()> {
    tracing::trace!(path = %path.display(), "creation time is not writable on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    #[test]
    fn test_set_and_get_keeps_sub_second_precision() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("f.txt");
        fs::write(&path, b"x").expect("write file");

        let when = UNIX_EPOCH + Duration::new(1_600_000_000, 123_456_789);
        NativeTimestamps
            .set_timestamps(&path, None, Timestamp::from(when))
            .expect("set timestamps");

        let times = NativeTimestamps.get_timestamps(&path).expect("get timestamps");
        let delta = times
            .modified
            .duration_since(UNIX_EPOCH + Duration::from_secs(1_600_000_000))
            .expect("modified after whole second");
        assert!(
            delta >= Duration::from_millis(100),
            "sub-second part was truncated: {:?}",
            delta
        );
    }

    #[test]
    fn test_copy_timestamps_round_trip() {
        let dir = TempDir::new().expect("create temp dir");
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, b"a").expect("write src");
        fs::write(&dst, b"b").expect("write dst");

        let when = UNIX_EPOCH + Duration::new(1_500_000_000, 987_654_321);
        filetime::set_file_mtime(&src, FileTime::from_system_time(when)).expect("pin src mtime");

        NativeTimestamps
            .copy_timestamps(&src, &dst)
            .expect("copy timestamps");

        assert_eq!(
            NativeTimestamps.get_timestamps(&src).expect("src times"),
            NativeTimestamps.get_timestamps(&dst).expect("dst times")
        );
    }

    #[test]
    fn test_aware_and_naive_inputs_agree_in_local_timezone() {
        let naive = NaiveDate::from_ymd_opt(2021, 3, 14)
            .and_then(|d| d.and_hms_milli_opt(15, 9, 26, 535))
            .expect("valid date");
        let aware = Local
            .from_local_datetime(&naive)
            .earliest()
            .expect("unambiguous local time");

        let from_naive = Timestamp::try_from(naive).expect("naive converts");
        assert_eq!(from_naive, Timestamp::from(aware));
        assert_eq!(
            Timestamp::from(aware.with_timezone(&Utc)),
            from_naive,
            "same instant regardless of attached zone"
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().expect("create temp dir");
        let result = NativeTimestamps.get_timestamps(&dir.path().join("missing"));
        assert!(result.is_err());
    }

    #[test]
    fn test_creation_time_reported_only_when_writable() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("f.txt");
        fs::write(&path, b"x").expect("write file");

        let times = NativeTimestamps.get_timestamps(&path).expect("get timestamps");
        if !NativeTimestamps::supports_creation_time() {
            assert!(times.created.is_none());
        }
    }
}
