//! Unix-specific device probing
//!
//! On Linux the mount containing a path is resolved from `/proc/mounts`, the
//! filesystem type picks out network and RAM-backed mounts, and block devices
//! are classified through `/sys/class/block/<dev>/queue/rotational`.
//! Capacity comes from `statvfs` everywhere.

use ferrocopy_types::{DeviceInfo, DeviceType};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One line of the mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Source device or pseudo-device name
    pub device: String,
    /// Mount point
    pub mount_point: PathBuf,
    /// Filesystem type
    pub fs_type: String,
}

/// Check if a filesystem type is network-based
pub fn is_network_filesystem(fs_type: &str) -> bool {
    matches!(
        fs_type,
        "nfs"
            | "nfs4"
            | "cifs"
            | "smb"
            | "smb3"
            | "smbfs"
            | "ncpfs"
            | "afs"
            | "9p"
            | "sshfs"
            | "fuse.sshfs"
            | "davfs"
            | "fuse.davfs2"
            | "ceph"
            | "glusterfs"
            | "fuse.glusterfs"
            | "lustre"
    )
}

/// Check if a filesystem type is RAM-based
pub fn is_ram_filesystem(fs_type: &str) -> bool {
    matches!(fs_type, "tmpfs" | "ramfs" | "devtmpfs")
}

/// Decode the octal escapes (`\040` for space) used in the mount table.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse `/proc/mounts` formatted content
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?;
            let mount_point = parts.next()?;
            let fs_type = parts.next()?;
            Some(MountEntry {
                device: unescape_mount_field(device),
                mount_point: PathBuf::from(unescape_mount_field(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Longest mount point containing `path`. Later entries win ties, matching
/// how stacked mounts shadow earlier ones.
pub fn find_mount<'a>(mounts: &'a [MountEntry], path: &Path) -> Option<&'a MountEntry> {
    let mut best: Option<&MountEntry> = None;
    for entry in mounts {
        if !path.starts_with(&entry.mount_point) {
            continue;
        }
        let depth = entry.mount_point.components().count();
        let best_depth = best.map_or(0, |b| b.mount_point.components().count());
        if best.is_none() || depth >= best_depth {
            best = Some(entry);
        }
    }
    best
}

/// Classify a mount by filesystem type alone.
pub fn classify_filesystem(fs_type: &str) -> Option<DeviceType> {
    if is_network_filesystem(fs_type) {
        Some(DeviceType::Network)
    } else if is_ram_filesystem(fs_type) {
        Some(DeviceType::RamDisk)
    } else {
        None
    }
}

#[cfg(target_os = "linux")]
async fn block_device_type(device: &str) -> DeviceType {
    if !device.starts_with("/dev/") {
        return DeviceType::Unknown;
    }

    // /dev/mapper/* and /dev/disk/by-* are symlinks to the kernel name
    let resolved = tokio::fs::canonicalize(device)
        .await
        .unwrap_or_else(|_| PathBuf::from(device));
    let Some(name) = resolved.file_name().and_then(|n| n.to_str()) else {
        return DeviceType::Unknown;
    };

    // A partition's sysfs node lives under its parent disk
    let class_dir = PathBuf::from("/sys/class/block").join(name);
    let disk_name = if tokio::fs::metadata(class_dir.join("partition")).await.is_ok() {
        tokio::fs::canonicalize(&class_dir)
            .await
            .ok()
            .and_then(|p| {
                p.parent()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| name.to_string())
    } else {
        name.to_string()
    };

    let rotational = PathBuf::from("/sys/block")
        .join(&disk_name)
        .join("queue/rotational");
    match tokio::fs::read_to_string(&rotational).await {
        Ok(content) if content.trim() == "1" => DeviceType::HDD,
        Ok(content) if content.trim() == "0" => DeviceType::SSD,
        Ok(_) => DeviceType::Unknown,
        Err(e) => {
            debug!("No rotational hint for {}: {}", disk_name, e);
            if disk_name.starts_with("nvme") {
                DeviceType::SSD
            } else {
                DeviceType::Unknown
            }
        }
    }
}

fn capacity(path: &Path) -> Option<(u64, u64, u64)> {
    let stats = nix::sys::statvfs::statvfs(path).ok()?;
    let fragment = u64::from(stats.fragment_size());
    let block_size = if fragment > 0 {
        fragment
    } else {
        u64::from(stats.block_size())
    };
    let total = u64::from(stats.blocks()).saturating_mul(block_size);
    let available = u64::from(stats.blocks_available()).saturating_mul(block_size);
    Some((total, available, block_size))
}

/// Probe the device containing an existing `path`. Never fails; anything
/// that cannot be read falls back to `Unknown` or zero.
pub(crate) async fn probe(path: &Path) -> DeviceInfo {
    let resolved = tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf());

    let mut info = mount_info(&resolved).await;
    if let Some((total, available, block_size)) = capacity(&resolved) {
        info = info.with_capacity(total, available, block_size);
    }
    debug!(
        "Profiled {}: {} on {} ({})",
        path.display(),
        info.device_type,
        info.mount_point.display(),
        info.filesystem
    );
    info
}

#[cfg(target_os = "linux")]
async fn mount_info(path: &Path) -> DeviceInfo {
    let content = match tokio::fs::read_to_string("/proc/mounts").await {
        Ok(content) => content,
        Err(e) => {
            debug!("Cannot read /proc/mounts: {}", e);
            return DeviceInfo::unknown(path.to_path_buf());
        }
    };
    let mounts = parse_mounts(&content);
    let Some(mount) = find_mount(&mounts, path) else {
        return DeviceInfo::unknown(path.to_path_buf());
    };

    let device_type = match classify_filesystem(&mount.fs_type) {
        Some(device_type) => device_type,
        None => block_device_type(&mount.device).await,
    };
    DeviceInfo::new(device_type, mount.fs_type.clone(), mount.mount_point.clone())
}

#[cfg(not(target_os = "linux"))]
async fn mount_info(path: &Path) -> DeviceInfo {
    DeviceInfo::unknown(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTS: &str = "\
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
tmpfs /tmp tmpfs rw,nosuid 0 0
server:/export /mnt/share nfs4 rw,relatime 0 0
/dev/sdb1 /mnt/my\\040disk xfs rw 0 0
/dev/sdc1 /mnt/share/local ext4 rw 0 0
";

    #[test]
    fn test_parse_mounts() {
        let mounts = parse_mounts(MOUNTS);
        assert_eq!(mounts.len(), 5);
        assert_eq!(mounts[0].device, "/dev/nvme0n1p2");
        assert_eq!(mounts[3].mount_point, PathBuf::from("/mnt/my disk"));
        assert_eq!(mounts[2].fs_type, "nfs4");
    }

    #[test]
    fn test_find_mount_longest_prefix() {
        let mounts = parse_mounts(MOUNTS);
        let hit = |p: &str| find_mount(&mounts, Path::new(p)).map(|m| m.mount_point.clone());

        assert_eq!(hit("/home/user/file"), Some(PathBuf::from("/")));
        assert_eq!(hit("/tmp/x"), Some(PathBuf::from("/tmp")));
        assert_eq!(hit("/mnt/share/a"), Some(PathBuf::from("/mnt/share")));
        assert_eq!(hit("/mnt/share/local/a"), Some(PathBuf::from("/mnt/share/local")));
        // component-wise, not string prefix
        assert_eq!(hit("/tmpfoo"), Some(PathBuf::from("/")));
    }

    #[test]
    fn test_filesystem_classification() {
        assert_eq!(classify_filesystem("nfs"), Some(DeviceType::Network));
        assert_eq!(classify_filesystem("cifs"), Some(DeviceType::Network));
        assert_eq!(classify_filesystem("tmpfs"), Some(DeviceType::RamDisk));
        assert_eq!(classify_filesystem("ext4"), None);
        assert!(!is_network_filesystem("ext4"));
        assert!(!is_ram_filesystem("xfs"));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_mount_field("a\\040b"), "a b");
        assert_eq!(unescape_mount_field("plain"), "plain");
        assert_eq!(unescape_mount_field("trailing\\"), "trailing\\");
    }

    #[tokio::test]
    async fn test_probe_current_dir() {
        let current_dir = std::env::current_dir().unwrap();
        let info = probe(&current_dir).await;
        assert!(info.read_speed_mbps > 0.0);
        assert!(info.available_space <= info.total_space);
    }
}
