//! # Output Path Allocation
//!
//! Every generated artifact gets a unique, human-sortable name:
//!
//! ```text
//! outputs/2025-03-14/High_Level_Bridge/2025-03-14_High_Level_Bridge_003_142501.json
//!         ^date      ^folder                                     ^serial ^HHMMSS
//! ```
//!
//! Serials start at 1 for each (date, folder) and only increase. Allocation
//! for one key is serialized in-process by a per-key mutex and across
//! processes by an fs2 lock in the folder; each slot is reserved by creating
//! its file exclusively. After a restart the allocator rescans the folder and
//! continues after the highest serial found. A key whose serials have run
//! out refuses further allocations. [`OutputPathAllocator::list`] reads the
//! existing tree back as slots.
//!
//! ```rust,no_run
//! use slab_core::output::OutputPathAllocator;
//!
//! let allocator = OutputPathAllocator::new("outputs");
//! let slot = allocator.allocate("High Level Bridge", "json").unwrap();
//! println!("{}", slot.path.display());
//! ```

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{DesignError, DesignResult};
use crate::file_io::DirLock;

/// Counter key: one serial sequence per date and folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub folder: String,
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.date.format("%Y-%m-%d"), self.folder)
    }
}

/// A reserved output location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    pub date: NaiveDate,
    pub folder: String,
    pub serial: u32,
    /// Wall-clock time of allocation, shown as HH:MM:SS
    pub timestamp: NaiveTime,
    pub extension: String,
    pub path: PathBuf,
}

impl OutputSlot {
    pub fn file_name(&self) -> String {
        file_name(self.date, &self.folder, self.serial, self.timestamp, &self.extension)
    }

    pub fn timestamp_display(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Reduce a bridge type to a folder name: alphanumerics and `._- ` are
/// kept, whitespace runs become `_`.
pub fn folder_name(bridge_type: &str) -> String {
    let kept: String = bridge_type
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-') || c.is_whitespace())
        .collect();
    let folder = kept.split_whitespace().collect::<Vec<_>>().join("_");
    let folder = folder.trim_matches('.').to_string();
    if folder.is_empty() {
        "Unspecified".to_string()
    } else {
        folder
    }
}

/// `{YYYY-MM-DD}_{folder}_{serial:03}_{HHMMSS}.{ext}`
pub fn file_name(date: NaiveDate, folder: &str, serial: u32, time: NaiveTime, extension: &str) -> String {
    format!(
        "{}_{}_{:03}_{}.{}",
        date.format("%Y-%m-%d"),
        folder,
        serial,
        time.format("%H%M%S"),
        extension
    )
}

/// Hands out collision-free artifact paths under a root directory.
#[derive(Debug)]
pub struct OutputPathAllocator {
    root: PathBuf,
    counters: DashMap<SlotKey, Arc<Mutex<u32>>>,
}

impl OutputPathAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputPathAllocator {
            root: root.into(),
            counters: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a (date, folder) pair.
    pub fn dir_for(&self, date: NaiveDate, folder: &str) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string()).join(folder)
    }

    /// Allocate using the local date and time.
    pub fn allocate(&self, bridge_type: &str, extension: &str) -> DesignResult<OutputSlot> {
        let now = Local::now();
        self.allocate_at(now.date_naive(), now.time(), bridge_type, extension)
    }

    /// Allocate for an explicit date and time.
    pub fn allocate_at(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        bridge_type: &str,
        extension: &str,
    ) -> DesignResult<OutputSlot> {
        let folder = folder_name(bridge_type);
        let extension = extension.trim_start_matches('.');
        let time = time.with_nanosecond(0).unwrap_or(time);
        let key = SlotKey {
            date,
            folder: folder.clone(),
        };

        // Clone the Arc out so the map shard is not held while we wait.
        let counter = self
            .counters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .value()
            .clone();
        let mut last_issued = counter.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let dir = self.dir_for(date, &folder);
        fs::create_dir_all(&dir)
            .map_err(|e| DesignError::file_error("create directory", dir.display().to_string(), e.to_string()))?;
        let _dir_lock = DirLock::acquire(&dir)?;

        let on_disk = scan_max_serial(&dir, date, &folder)?;
        let serial = on_disk
            .max(*last_issued)
            .checked_add(1)
            .ok_or_else(|| DesignError::AllocationConflict {
                key: key.to_string(),
                serial: u32::MAX,
            })?;
        let path = dir.join(file_name(date, &folder, serial, time, extension));

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DesignError::AllocationConflict {
                    key: key.to_string(),
                    serial,
                })
            }
            Err(e) => return Err(DesignError::file_error("reserve", path.display().to_string(), e.to_string())),
        }
        *last_issued = serial;

        tracing::info!(key = %key, serial, path = %path.display(), "Allocated output slot");
        Ok(OutputSlot {
            date,
            folder,
            serial,
            timestamp: time,
            extension: extension.to_string(),
            path,
        })
    }

    /// Artifacts already written for one date and bridge type, by serial.
    pub fn list_for(&self, date: NaiveDate, bridge_type: &str) -> DesignResult<Vec<OutputSlot>> {
        let folder = folder_name(bridge_type);
        let dir = self.dir_for(date, &folder);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        scan_slots(&dir, date, &folder)
    }

    /// Every artifact under the root, ordered by date, folder and serial.
    /// Directories that are not `YYYY-MM-DD` dates are skipped.
    pub fn list(&self) -> DesignResult<Vec<OutputSlot>> {
        let mut slots = Vec::new();
        for (name, date_dir) in subdirectories(&self.root)? {
            let Ok(date) = NaiveDate::parse_from_str(&name, "%Y-%m-%d") else { continue };
            for (folder, dir) in subdirectories(&date_dir)? {
                slots.extend(scan_slots(&dir, date, &folder)?);
            }
        }
        tracing::debug!(root = %self.root.display(), count = slots.len(), "Listed output slots");
        Ok(slots)
    }

    /// Last serial issued by this allocator for a key, if any.
    pub fn last_issued(&self, date: NaiveDate, bridge_type: &str) -> Option<u32> {
        let key = SlotKey {
            date,
            folder: folder_name(bridge_type),
        };
        self.counters
            .get(&key)
            .map(|counter| *counter.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

/// Matches `{date}_{folder}_{NNN}_{HHMMSS}.{ext}` with serial, time and
/// extension captured.
fn slot_pattern(date: NaiveDate, folder: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"^{}_{}_(?P<serial>\d{{3,}})_(?P<time>(?:[01]\d|2[0-3])[0-5]\d[0-5]\d)\.(?P<ext>[A-Za-z0-9]+)$",
        date.format("%Y-%m-%d"),
        regex::escape(folder)
    ))
}

/// Artifacts already in `dir`, ordered by serial. Unrelated files are skipped.
fn scan_slots(dir: &Path, date: NaiveDate, folder: &str) -> DesignResult<Vec<OutputSlot>> {
    let scan_error = |e: String| DesignError::file_error("scan", dir.display().to_string(), e);
    let re = slot_pattern(date, folder).map_err(|e| scan_error(e.to_string()))?;
    let entries = fs::read_dir(dir).map_err(|e| scan_error(e.to_string()))?;

    let mut slots = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(caps) = re.captures(name) else { continue };
        let Ok(serial) = caps["serial"].parse::<u32>() else { continue };
        let Ok(timestamp) = NaiveTime::parse_from_str(&caps["time"], "%H%M%S") else { continue };
        slots.push(OutputSlot {
            date,
            folder: folder.to_string(),
            serial,
            timestamp,
            extension: caps["ext"].to_string(),
            path: entry.path(),
        });
    }
    slots.sort_by(|a, b| (a.serial, &a.extension).cmp(&(b.serial, &b.extension)));
    Ok(slots)
}

/// Highest serial in `dir`, 0 when empty.
fn scan_max_serial(dir: &Path, date: NaiveDate, folder: &str) -> DesignResult<u32> {
    Ok(scan_slots(dir, date, folder)?
        .iter()
        .map(|slot| slot.serial)
        .max()
        .unwrap_or(0))
}

/// Subdirectories of `dir` by name. A missing directory has none.
fn subdirectories(dir: &Path) -> DesignResult<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DesignError::file_error("list", dir.display().to_string(), e.to_string())),
    };
    let mut dirs: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| Some((entry.file_name().to_str()?.to_string(), entry.path())))
        .collect();
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::thread;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 5).unwrap()
    }

    #[test]
    fn test_folder_name() {
        assert_eq!(folder_name("High Level Bridge"), "High_Level_Bridge");
        assert_eq!(folder_name("  Box   Culvert/Type-2 "), "Box_CulvertType-2");
        assert_eq!(folder_name("../.."), "Unspecified");
        assert_eq!(folder_name(""), "Unspecified");
    }

    #[test]
    fn test_file_name_format() {
        let time = NaiveTime::from_hms_opt(14, 25, 1).unwrap();
        assert_eq!(
            file_name(date(14), "High_Level_Bridge", 3, time, "json"),
            "2025-03-14_High_Level_Bridge_003_142501.json"
        );
    }

    #[test]
    fn test_culvert_serials_reset_per_day() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputPathAllocator::new(root.path());

        let first = allocator.allocate_at(date(14), noon(), "Culvert", "json").unwrap();
        let second = allocator.allocate_at(date(14), noon(), "Culvert", "json").unwrap();
        let next_day = allocator.allocate_at(date(15), noon(), "Culvert", "json").unwrap();

        assert_eq!((first.serial, second.serial, next_day.serial), (1, 2, 1));
        assert_ne!(first.path.parent(), next_day.path.parent());
        assert_eq!(allocator.last_issued(date(14), "Culvert"), Some(2));
        assert!(second.path.exists());
        assert_eq!(second.timestamp_display(), "12:00:05");
        assert_eq!(second.file_name(), "2025-03-14_Culvert_002_120005.json");
    }

    #[test]
    fn test_concurrent_allocations_are_contiguous() {
        let root = tempfile::tempdir().unwrap();
        let allocator = Arc::new(OutputPathAllocator::new(root.path()));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || allocator.allocate_at(date(14), noon(), "Culvert", "json").unwrap())
            })
            .collect();
        let serials: BTreeSet<u32> = handles.into_iter().map(|h| h.join().unwrap().serial).collect();

        assert_eq!(serials, (1..=100).collect::<BTreeSet<u32>>());
    }

    #[test]
    fn test_resume_after_restart() {
        let root = tempfile::tempdir().unwrap();
        {
            let allocator = OutputPathAllocator::new(root.path());
            for _ in 0..3 {
                allocator.allocate_at(date(14), noon(), "Culvert", "pdf").unwrap();
            }
        }
        let restarted = OutputPathAllocator::new(root.path());
        let slot = restarted.allocate_at(date(14), noon(), "Culvert", "json").unwrap();
        assert_eq!(slot.serial, 4);
    }

    #[test]
    fn test_unrelated_files_ignored() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputPathAllocator::new(root.path());
        let dir = allocator.dir_for(date(14), "Culvert");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("notes_999.txt"), "x").unwrap();
        fs::write(dir.join("2025-03-14_Culvert_Box_007_120000.json"), "x").unwrap();

        let slot = allocator.allocate_at(date(14), noon(), "Culvert", "json").unwrap();
        assert_eq!(slot.serial, 1);
    }

    #[test]
    fn test_subsecond_time_truncated() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputPathAllocator::new(root.path());
        let time = NaiveTime::from_hms_milli_opt(9, 30, 0, 750).unwrap();
        let slot = allocator.allocate_at(date(1), time, "Culvert", ".json").unwrap();
        assert_eq!(slot.timestamp.nanosecond(), 0);
        assert!(slot.file_name().ends_with("_093000.json"));
    }

    #[test]
    fn test_concurrent_allocations_continue_after_existing() {
        let root = tempfile::tempdir().unwrap();
        let allocator = Arc::new(OutputPathAllocator::new(root.path()));
        let dir = allocator.dir_for(date(14), "Culvert");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("2025-03-14_Culvert_007_120000.json"), "{}").unwrap();

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || allocator.allocate_at(date(14), noon(), "Culvert", "json").unwrap())
            })
            .collect();
        let serials: BTreeSet<u32> = handles.into_iter().map(|h| h.join().unwrap().serial).collect();

        assert_eq!(serials, (8..=107).collect::<BTreeSet<u32>>());
        assert_eq!(allocator.last_issued(date(14), "Culvert"), Some(107));
    }

    #[test]
    fn test_exhausted_serials_rejected() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputPathAllocator::new(root.path());
        let dir = allocator.dir_for(date(14), "Culvert");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file_name(date(14), "Culvert", u32::MAX, noon(), "json")), "{}").unwrap();

        let err = allocator.allocate_at(date(14), noon(), "Culvert", "json").unwrap_err();
        assert_eq!(err.error_code(), "ALLOCATION_CONFLICT");
        assert!(err.to_string().contains("2025-03-14/Culvert"), "{err}");

        // Other keys are unaffected.
        let other = allocator.allocate_at(date(15), noon(), "Culvert", "json").unwrap();
        assert_eq!(other.serial, 1);
    }

    #[test]
    fn test_list_existing_outputs() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputPathAllocator::new(root.path());
        assert!(allocator.list().unwrap().is_empty());

        let late = NaiveTime::from_hms_opt(16, 45, 30).unwrap();
        allocator.allocate_at(date(15), noon(), "Culvert", "json").unwrap();
        allocator.allocate_at(date(14), noon(), "High Level Bridge", "json").unwrap();
        allocator.allocate_at(date(14), noon(), "Culvert", "json").unwrap();
        allocator.allocate_at(date(14), late, "Culvert", "pdf").unwrap();

        fs::create_dir_all(root.path().join("archive").join("Culvert")).unwrap();
        fs::write(allocator.dir_for(date(14), "Culvert").join("notes.txt"), "x").unwrap();

        let listed: Vec<(String, u32, String)> = allocator
            .list()
            .unwrap()
            .into_iter()
            .map(|s| (format!("{}/{}", s.date, s.folder), s.serial, s.extension))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("2025-03-14/Culvert".to_string(), 1, "json".to_string()),
                ("2025-03-14/Culvert".to_string(), 2, "pdf".to_string()),
                ("2025-03-14/High_Level_Bridge".to_string(), 1, "json".to_string()),
                ("2025-03-15/Culvert".to_string(), 1, "json".to_string()),
            ]
        );

        let day = allocator.list_for(date(14), "Culvert").unwrap();
        assert_eq!(day.len(), 2);
        assert_eq!(day[1].timestamp, late);
        assert_eq!(day[1].path, allocator.dir_for(date(14), "Culvert").join(day[1].file_name()));
        assert!(allocator.list_for(date(20), "Culvert").unwrap().is_empty());
    }

    #[test]
    fn test_list_missing_root_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let allocator = OutputPathAllocator::new(root.path().join("never-created"));
        assert!(allocator.list().unwrap().is_empty());
    }
}
