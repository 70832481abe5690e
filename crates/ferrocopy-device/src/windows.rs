//! Windows-specific device probing
//!
//! The volume root is resolved with `GetVolumePathNameW`; the drive type
//! identifies remote and RAM disks, `GetVolumeInformationW` names the
//! filesystem and `GetDiskFreeSpaceExW` supplies capacity.

use ferrocopy_types::{DeviceInfo, DeviceType};
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use tracing::debug;
use winapi::shared::minwindef::{DWORD, FALSE, MAX_PATH};
use winapi::shared::ntdef::ULARGE_INTEGER;
use winapi::um::fileapi::{
    GetDiskFreeSpaceExW, GetDriveTypeW, GetVolumeInformationW, GetVolumePathNameW,
};
use winapi::um::winbase::{DRIVE_RAMDISK, DRIVE_REMOTE};

fn to_wide(value: &OsStr) -> Vec<u16> {
    value.encode_wide().chain(std::iter::once(0)).collect()
}

fn from_wide(buffer: &[u16]) -> String {
    let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..end])
}

fn volume_root(path: &Path) -> Option<Vec<u16>> {
    let wide_path = to_wide(path.as_os_str());
    let mut root = vec![0u16; MAX_PATH + 1];
    let ok = unsafe { GetVolumePathNameW(wide_path.as_ptr(), root.as_mut_ptr(), root.len() as DWORD) };
    if ok == FALSE {
        return None;
    }
    let end = root.iter().position(|&c| c == 0).unwrap_or(root.len());
    root.truncate(end);
    root.push(0);
    Some(root)
}

fn classify_drive(drive_type: u32) -> DeviceType {
    match drive_type {
        DRIVE_REMOTE => DeviceType::Network,
        DRIVE_RAMDISK => DeviceType::RamDisk,
        _ => DeviceType::Unknown,
    }
}

fn filesystem_name(root: &[u16]) -> String {
    let mut fs_name = vec![0u16; MAX_PATH + 1];
    let ok = unsafe {
        GetVolumeInformationW(
            root.as_ptr(),
            ptr::null_mut(),
            0,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            fs_name.as_mut_ptr(),
            fs_name.len() as DWORD,
        )
    };
    if ok == FALSE {
        "unknown".to_string()
    } else {
        from_wide(&fs_name)
    }
}

fn capacity(root: &[u16]) -> Option<(u64, u64)> {
    let mut available: ULARGE_INTEGER = unsafe { std::mem::zeroed() };
    let mut total: ULARGE_INTEGER = unsafe { std::mem::zeroed() };
    let ok = unsafe { GetDiskFreeSpaceExW(root.as_ptr(), &mut available, &mut total, ptr::null_mut()) };
    if ok == FALSE {
        return None;
    }
    Some(unsafe { (*total.QuadPart(), *available.QuadPart()) })
}

/// Probe the volume containing an existing `path`. Never fails.
pub(crate) async fn probe(path: &Path) -> DeviceInfo {
    let Some(root) = volume_root(path) else {
        debug!("No volume root for {}", path.display());
        return DeviceInfo::unknown(path.to_path_buf());
    };

    let drive_type = unsafe { GetDriveTypeW(root.as_ptr()) };
    let mount_point = PathBuf::from(from_wide(&root));
    let mut info = DeviceInfo::new(classify_drive(drive_type), filesystem_name(&root), mount_point);
    if let Some((total, available)) = capacity(&root) {
        info = info.with_capacity(total, available, 0);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_classification() {
        assert_eq!(classify_drive(DRIVE_REMOTE), DeviceType::Network);
        assert_eq!(classify_drive(DRIVE_RAMDISK), DeviceType::RamDisk);
        assert_eq!(classify_drive(3), DeviceType::Unknown);
    }

    #[tokio::test]
    async fn test_probe_current_dir() {
        let info = probe(&std::env::current_dir().unwrap()).await;
        assert!(info.available_space <= info.total_space);
    }
}
