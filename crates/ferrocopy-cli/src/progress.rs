//! Progress bar fed by engine events

use crate::display::format_bytes;
use console::style;
use ferrocopy_engine::{EngineEvent, EventReceiver};
use ferrocopy_types::{ErrorRecord, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal progress display for one operation
pub struct ProgressDisplay {
    progress_bar: Option<ProgressBar>,
}

impl ProgressDisplay {
    /// Create a display; quiet mode draws nothing but still reports errors
    pub fn new(quiet: bool) -> Self {
        let progress_bar = (!quiet).then(|| {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            {
                pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
            }
            pb.set_message("Planning...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        Self { progress_bar }
    }

    /// Consume events until the operation completes
    pub async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::Progress(progress) => self.update(&progress),
                EngineEvent::Error(record) => self.display_error(&record),
                EngineEvent::Completed(_) => break,
            }
        }
        if let Some(pb) = &self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn update(&self, progress: &ProgressEvent) {
        let Some(pb) = &self.progress_bar else {
            return;
        };
        pb.set_length(progress.total_bytes);
        pb.set_position(progress.bytes_copied);
        pb.set_message(file_label(progress));
    }

    fn display_error(&self, record: &ErrorRecord) {
        let line = format!("{} {}", style("⚠").yellow().bold(), style(record).yellow());
        match &self.progress_bar {
            Some(pb) => pb.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }
}

fn file_label(progress: &ProgressEvent) -> String {
    let name = progress
        .current_file
        .file_name()
        .map_or_else(|| progress.current_file.to_string_lossy(), |n| n.to_string_lossy());
    format!("{} ({:.0}%, {})", name, progress.percent, format_bytes(progress.bytes_copied))
}
