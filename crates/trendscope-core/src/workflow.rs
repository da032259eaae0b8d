use std::path::{Path, PathBuf};

use tracing::Instrument;
use uuid::Uuid;

use crate::{
    client::{JobService, OutputFormat},
    config::PromptConfig,
    error::Result,
    llm::LanguageModel,
    pipeline::{ReportPipeline, StageEvent},
    poller::{PollPolicy, wait_for_job},
    transcripts::{DEFAULT_TRANSCRIPT_DIR, dedupe_by_shortcode, materialize_transcripts_with},
    types::{JobHandle, JobStatus, Report, ScrapeRequest, Stage, VideoRecord},
};

/// Progress notifications emitted while a run executes.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Triggered { handle: JobHandle },
    Polled { attempt: u32, status: JobStatus },
    Fetched { videos: usize },
    TranscriptWritten { path: PathBuf },
    StageStarted(Stage),
    StageFinished(Stage),
}

#[derive(Debug)]
pub struct RunOutcome {
    pub handle: JobHandle,
    pub videos: Vec<VideoRecord>,
    pub transcripts: Vec<PathBuf>,
    pub report: Report,
}

/// Everything one scrape-to-report run needs, passed in rather than held globally.
pub struct Run<'a, S: ?Sized, M: ?Sized> {
    id: Uuid,
    service: &'a S,
    model: &'a M,
    prompts: &'a PromptConfig,
    policy: PollPolicy,
    output_dir: PathBuf,
    format: OutputFormat,
}

impl<'a, S, M> Run<'a, S, M>
where
    S: JobService + ?Sized,
    M: LanguageModel + ?Sized,
{
    pub fn new(service: &'a S, model: &'a M, prompts: &'a PromptConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            service,
            model,
            prompts,
            policy: PollPolicy::default(),
            output_dir: PathBuf::from(DEFAULT_TRANSCRIPT_DIR),
            format: OutputFormat::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Trigger, wait, fetch, write transcripts, then run both report stages.
    ///
    /// Videos repeating an earlier shortcode are dropped after the fetch.
    ///
    /// The first error ends the run; nothing after it executes.
    pub async fn execute<F>(&self, request: &ScrapeRequest, observer: F) -> Result<RunOutcome>
    where
        F: FnMut(RunEvent),
    {
        let span = tracing::info_span!("run", run_id = %self.id);
        self.execute_inner(request, observer).instrument(span).await
    }

    async fn execute_inner<F>(&self, request: &ScrapeRequest, mut observer: F) -> Result<RunOutcome>
    where
        F: FnMut(RunEvent),
    {
        request.validate()?;

        let handle = self.service.trigger(request).await?;
        observer(RunEvent::Triggered {
            handle: handle.clone(),
        });

        wait_for_job(self.service, &handle, &self.policy, |attempt, status| {
            observer(RunEvent::Polled {
                attempt,
                status: status.clone(),
            })
        })
        .await?;

        let videos = dedupe_by_shortcode(self.service.fetch(&handle, self.format).await?);
        observer(RunEvent::Fetched {
            videos: videos.len(),
        });

        let transcripts = materialize_transcripts_with(&self.output_dir, &videos, |path| {
            observer(RunEvent::TranscriptWritten {
                path: path.to_path_buf(),
            })
        })
        .await?;
        tracing::info!(count = transcripts.len(), dir = %self.output_dir.display(), "Transcripts written");

        let report = ReportPipeline::new(self.model, self.prompts)
            .run_observed(&transcripts, |event| {
                observer(match event {
                    StageEvent::Started(stage) => RunEvent::StageStarted(stage),
                    StageEvent::Finished(stage) => RunEvent::StageFinished(stage),
                })
            })
            .await?;

        Ok(RunOutcome {
            handle,
            videos,
            transcripts,
            report,
        })
    }
}
