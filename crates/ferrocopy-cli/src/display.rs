//! Display utilities for the ferrocopy CLI

use console::style;
use ferrocopy_config::TuningTable;
use ferrocopy_engine::OperationReport;
use ferrocopy_types::{CopyMode, CopyStats, DeviceInfo, DeviceType, OperationPhase};
use std::path::Path;
use std::time::Duration;

/// Announce an operation before it starts
pub fn display_operation_header(mode: CopyMode, source: &Path, destination: &Path) {
    let (icon, verb) = match mode {
        CopyMode::Copy => ("→", "Copying"),
        CopyMode::Move => ("⇒", "Moving"),
        CopyMode::Sync => ("⟲", "Synchronizing"),
    };
    println!(
        "{} {} {} to {}",
        style(icon).green().bold(),
        verb,
        style(source.display()).cyan(),
        style(destination.display()).cyan()
    );
}

/// Display device information in a formatted way
pub fn display_device_info(label: &str, info: &DeviceInfo, tuning: &TuningTable) {
    println!();
    println!(
        "{} {}",
        style(device_type_icon(info.device_type)).blue().bold(),
        style(label).bold().underlined()
    );
    println!("  Type: {}", style(info.device_type).cyan());
    println!("  Filesystem: {}", style(&info.filesystem).cyan());
    println!("  Mount point: {}", style(info.mount_point.display()).cyan());
    println!(
        "  Space: {} free of {}",
        style(format_bytes(info.available_space)).cyan(),
        style(format_bytes(info.total_space)).cyan()
    );
    println!(
        "  Read Speed: {} MB/s (theoretical)",
        style(format!("{:.0}", info.read_speed_mbps)).green()
    );
    println!(
        "  Write Speed: {} MB/s (theoretical)",
        style(format!("{:.0}", info.write_speed_mbps)).green()
    );
    let entry = tuning.get(info.device_type);
    println!(
        "  Buffer: {}",
        style(format_bytes(entry.buffer_size.get() as u64)).yellow()
    );
}

/// Display the final report of an operation
pub fn display_report(report: &OperationReport) {
    display_copy_stats(&report.stats);
    match report.phase {
        OperationPhase::Completed if report.stats.errors == 0 => display_success("Completed"),
        OperationPhase::Completed => display_warning(&format!(
            "Completed with {} errors",
            report.stats.errors
        )),
        phase => {
            let reason = report
                .error
                .as_ref()
                .map_or_else(String::new, |e| format!(": {}", e));
            display_error(&format!("{}{}", phase, reason));
        }
    }
}

/// Display copy statistics
pub fn display_copy_stats(stats: &CopyStats) {
    println!();
    println!("{}", style("Copy Statistics:").bold().underlined());
    println!("  Files copied: {}", style(stats.files_copied).green());
    println!(
        "  Directories created: {}",
        style(stats.directories_created).green()
    );
    println!(
        "  Bytes copied: {}",
        style(format_bytes(stats.bytes_copied)).green()
    );
    println!("  Files skipped: {}", style(stats.files_skipped).yellow());
    println!(
        "  Errors: {}",
        if stats.errors > 0 {
            style(stats.errors).red()
        } else {
            style(stats.errors).green()
        }
    );
    println!(
        "  Duration: {}",
        style(format_duration(stats.duration)).blue()
    );
    println!(
        "  Transfer rate: {} MB/s",
        style(format!("{:.2}", stats.transfer_rate_mbps())).blue().bold()
    );

    let efficiency = stats.efficiency_percent;
    let efficiency_text = format!("{:.1}", efficiency);
    let efficiency_style = if efficiency >= 80.0 {
        style(efficiency_text).green().bold()
    } else if efficiency >= 60.0 {
        style(efficiency_text).yellow().bold()
    } else {
        style(efficiency_text).red().bold()
    };
    println!("  Efficiency: {}%", efficiency_style);
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display a warning message with proper formatting
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display an error message with proper formatting
pub fn display_error(message: &str) {
    println!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Display device type with appropriate icon
pub const fn device_type_icon(device_type: DeviceType) -> &'static str {
    match device_type {
        DeviceType::SSD => "💾",
        DeviceType::HDD => "💿",
        DeviceType::Network => "🌐",
        DeviceType::RamDisk => "⚡",
        DeviceType::Unknown => "❓",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0.00 B")]
    #[case(1023, "1023.00 B")]
    #[case(1024, "1.00 KB")]
    #[case(10 * 1024 * 1024, "10.00 MB")]
    #[case(3 * 1024 * 1024 * 1024 * 1024, "3.00 TB")]
    fn test_format_bytes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[rstest]
    #[case(Duration::from_millis(1500), "1.50s")]
    #[case(Duration::from_secs(125), "2m 5s")]
    #[case(Duration::from_secs(3725), "1h 2m 5s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }
}
