//! Source enumeration and sync diffing
//!
//! Planning walks the source tree once, before any destination write, so the
//! total byte count is known up front. For sync it also indexes the
//! destination tree to find identical files and extraneous entries.

use ferrocopy_config::OperationPolicy;
use ferrocopy_types::{CopyMode, DeviceInfo, Error, Result};
use filetime::FileTime;
use std::collections::{HashMap, HashSet};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// What a planned entry is on the source side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Directory,
    File { size: u64 },
    Symlink,
    Special,
}

#[derive(Debug, Clone)]
pub(crate) struct PlanEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: EntryKind,
    /// Sync only: destination already holds this file
    pub identical: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub source_is_dir: bool,
    /// Destination directory for a tree, destination file for a single file
    pub target: PathBuf,
    /// Parents always precede their children
    pub entries: Vec<PlanEntry>,
    /// Bytes of files that will be transferred
    pub total_bytes: u64,
    /// Sync only: destination entries with no source counterpart, outermost only
    pub extraneous: Vec<PathBuf>,
    /// Entries the walk could not read
    pub walk_errors: Vec<(Error, PathBuf)>,
}

impl Plan {
    pub fn files(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::File { .. }))
    }

    pub fn directories(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Directory)
    }

    /// Fail when the destination reports less free space than the plan needs.
    /// Compressed output size is unknown, and a zero capacity means the
    /// device could not be queried; both skip the check.
    pub fn check_space(&self, destination: &DeviceInfo, compress: bool) -> Result<()> {
        if compress || destination.total_space == 0 {
            return Ok(());
        }
        if self.total_bytes > destination.available_space {
            return Err(Error::InsufficientSpace {
                path: self.target.clone(),
                required: self.total_bytes,
                available: destination.available_space,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct DestinationEntry {
    is_dir: bool,
    len: u64,
    modified: FileTime,
}

/// Blocking: enumerate `source` and, for sync, diff it against `destination`.
pub(crate) fn build(
    source: &Path,
    destination: &Path,
    mode: CopyMode,
    compress: bool,
    policy: &OperationPolicy,
) -> Result<Plan> {
    let metadata = source_metadata(source, policy.follow_symlinks)
        .map_err(|e| Error::from_io(&e, source))?;

    if !metadata.is_dir() {
        return Ok(single_entry_plan(source, destination, &metadata, mode, compress));
    }

    let index = if mode == CopyMode::Sync {
        index_destination(destination)
    } else {
        HashMap::new()
    };

    let mut plan = Plan {
        source_is_dir: true,
        target: destination.to_path_buf(),
        ..Plan::default()
    };
    let mut seen = HashSet::new();
    let mut leaves = HashSet::new();

    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(policy.follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(source).to_path_buf();
                let error = match e.io_error() {
                    Some(io_error) => Error::from_io(io_error, &path),
                    None => Error::generic(e.to_string()),
                };
                plan.walk_errors.push((error, path));
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let relative = relative.to_path_buf();
        let file_type = entry.file_type();

        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            match entry.metadata() {
                Ok(metadata) => EntryKind::File {
                    size: metadata.len(),
                },
                Err(e) => {
                    let error = e
                        .io_error()
                        .map_or_else(|| Error::generic(e.to_string()), |io| Error::from_io(io, entry.path()));
                    plan.walk_errors.push((error, entry.path().to_path_buf()));
                    continue;
                }
            }
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Special
        };

        let identical = match kind {
            EntryKind::File { size } => index.get(&relative).is_some_and(|existing| {
                entry
                    .metadata()
                    .is_ok_and(|m| is_identical(size, FileTime::from_last_modification_time(&m), existing, compress))
            }),
            _ => false,
        };
        if let EntryKind::File { size } = kind {
            if !identical {
                plan.total_bytes += size;
            }
        }

        plan.entries.push(PlanEntry {
            source: entry.path().to_path_buf(),
            destination: destination.join(&relative),
            kind,
            identical,
        });
        if matches!(kind, EntryKind::File { .. }) {
            leaves.insert(relative.clone());
        }
        seen.insert(relative);
    }

    if mode == CopyMode::Sync {
        plan.extraneous = outermost_extraneous(&index, &seen, &leaves)
            .into_iter()
            .map(|relative| destination.join(relative))
            .collect();
    }

    debug!(
        "Planned {}: {} entries, {} bytes, {} extraneous",
        source.display(),
        plan.entries.len(),
        plan.total_bytes,
        plan.extraneous.len()
    );
    Ok(plan)
}

fn source_metadata(source: &Path, follow_symlinks: bool) -> io::Result<Metadata> {
    if follow_symlinks {
        fs::metadata(source)
    } else {
        fs::symlink_metadata(source)
    }
}

fn single_entry_plan(
    source: &Path,
    destination: &Path,
    metadata: &Metadata,
    mode: CopyMode,
    compress: bool,
) -> Plan {
    let target = match (destination.is_dir(), source.file_name()) {
        (true, Some(name)) => destination.join(name),
        _ => destination.to_path_buf(),
    };

    let file_type = metadata.file_type();
    let kind = if file_type.is_file() {
        EntryKind::File {
            size: metadata.len(),
        }
    } else if file_type.is_symlink() {
        EntryKind::Symlink
    } else {
        EntryKind::Special
    };

    let identical = match kind {
        EntryKind::File { size } if mode == CopyMode::Sync => fs::metadata(&target)
            .ok()
            .filter(Metadata::is_file)
            .is_some_and(|existing| {
                let existing = DestinationEntry {
                    is_dir: false,
                    len: existing.len(),
                    modified: FileTime::from_last_modification_time(&existing),
                };
                is_identical(
                    size,
                    FileTime::from_last_modification_time(metadata),
                    &existing,
                    compress,
                )
            }),
        _ => false,
    };
    let total_bytes = match kind {
        EntryKind::File { size } if !identical => size,
        _ => 0,
    };

    Plan {
        source_is_dir: false,
        target: target.clone(),
        entries: vec![PlanEntry {
            source: source.to_path_buf(),
            destination: target,
            kind,
            identical,
        }],
        total_bytes,
        ..Plan::default()
    }
}

/// Compressed destinations differ in size from their source, so only the
/// modification time is compared for them.
fn is_identical(size: u64, modified: FileTime, existing: &DestinationEntry, compress: bool) -> bool {
    !existing.is_dir && (compress || existing.len == size) && existing.modified == modified
}

fn index_destination(destination: &Path) -> HashMap<PathBuf, DestinationEntry> {
    let mut index = HashMap::new();
    if !destination.is_dir() {
        return index;
    }
    for entry in WalkDir::new(destination).min_depth(1).follow_links(false) {
        let Ok(entry) = entry else {
            continue;
        };
        let (Ok(relative), Ok(metadata)) = (entry.path().strip_prefix(destination), entry.metadata()) else {
            continue;
        };
        index.insert(
            relative.to_path_buf(),
            DestinationEntry {
                is_dir: metadata.is_dir(),
                len: metadata.len(),
                modified: FileTime::from_last_modification_time(&metadata),
            },
        );
    }
    index
}

/// `leaves` are source files. Destination entries below one of them go away
/// when the file replaces the directory there, so they are not listed.
fn outermost_extraneous(
    index: &HashMap<PathBuf, DestinationEntry>,
    seen: &HashSet<PathBuf>,
    leaves: &HashSet<PathBuf>,
) -> Vec<PathBuf> {
    let extraneous: HashSet<&PathBuf> = index.keys().filter(|p| !seen.contains(*p)).collect();
    let mut outermost: Vec<PathBuf> = extraneous
        .iter()
        .filter(|path| {
            !path.ancestors().skip(1).any(|ancestor| {
                let ancestor = ancestor.to_path_buf();
                extraneous.contains(&ancestor) || leaves.contains(&ancestor)
            })
        })
        .map(|path| (*path).clone())
        .collect();
    outermost.sort();
    outermost
}
