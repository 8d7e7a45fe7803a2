//! Shared progress bar helpers.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Byte-based bar for one table's upload phase.
///
/// The length is the chunker's size estimate, so the bar can overshoot
/// slightly; `finish` snaps it to the real total.
pub fn upload_bar(table: &str, estimated_bytes: u64) -> ProgressBar {
    let pb = ProgressBar::new(estimated_bytes.max(1));
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {prefix:>8} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
    ) {
        pb.set_style(
            style
                .progress_chars("█▓▒░  ")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
    }
    pb.set_prefix(table.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Complete `pb` at `total_bytes` with a closing message
pub fn finish(pb: &ProgressBar, total_bytes: u64, message: &str) {
    pb.set_length(total_bytes.max(1));
    pb.set_position(total_bytes);
    pb.finish_with_message(message.to_string());
}
