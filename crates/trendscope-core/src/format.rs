use std::path::PathBuf;

use crate::types::{Report, TranscriptSegment, VideoRecord};

/// Format one segment as `start - end: text` with two-decimal timestamps
pub fn format_segment_line(segment: &TranscriptSegment) -> String {
    format!(
        "{:.2} - {:.2}: {}",
        segment.start_time, segment.end_time, segment.text
    )
}

/// Format every segment of a video, one line each, newline-terminated
pub fn format_transcript(video: &VideoRecord) -> String {
    let mut output = String::new();
    for segment in &video.segments {
        output.push_str(&format_segment_line(segment));
        output.push('\n');
    }
    output
}

/// Join transcript paths into the single string handed to the analysis stage
pub fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_report_readable(report: &Report) -> String {
    let mut output = String::new();
    output.push_str("# Trend Report\n\n");
    output.push_str(report.text.trim());
    output.push('\n');
    output
}
