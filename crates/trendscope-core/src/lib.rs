//! Trendscope Core Library
//!
//! Triggers remote channel-scraping jobs, waits for them to finish, writes one
//! transcript file per scraped video, and turns those files into a trend report
//! with a two-stage language-model pipeline.

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod llm;
pub mod pipeline;
pub mod poller;
pub mod transcripts;
pub mod types;
pub mod workflow;

// Re-export commonly used items at crate root
pub use client::{JobService, OutputFormat, ScrapeClient};
pub use config::{AgentConfig, PromptConfig, StageConfig, TaskConfig};
pub use error::{Result, TrendscopeError};
pub use format::{format_report_readable, format_segment_line, format_transcript};
pub use llm::{ChatModel, LanguageModel};
pub use pipeline::{ReportPipeline, StageEvent};
pub use poller::{PollPolicy, wait_for_job};
pub use transcripts::{
    dedupe_by_shortcode, materialize_transcripts, materialize_transcripts_with, read_transcripts,
    transcript_path, write_transcript,
};
pub use types::{
    JobHandle, JobState, JobStatus, OrderBy, Report, ScrapeRequest, Stage, Target,
    TranscriptSegment, VideoRecord,
};
pub use workflow::{Run, RunEvent, RunOutcome};
